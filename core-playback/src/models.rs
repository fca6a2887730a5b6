//! Domain models shared by the player, scheduler and command layers.

use bridge_traits::playback::{EngineRepeatMode, MediaItem};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Sentinel for "no current index".
pub const INDEX_UNSET: i64 = -1;

/// A playable track. Immutable once mapped from the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Track {
    pub id: String,
    pub title: String,
    pub artist: String,
    pub duration_ms: u64,
    /// Also the disk cache key for this track's bytes.
    pub stream_url: String,
    pub artwork_url: String,
    pub album_id: Option<String>,
}

impl Track {
    pub fn to_media_item(&self) -> MediaItem {
        MediaItem::new(self.id.clone(), self.stream_url.clone())
    }
}

impl From<&Track> for MediaItem {
    fn from(track: &Track) -> Self {
        track.to_media_item()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Album {
    pub id: String,
    pub title: String,
    pub artist: String,
    pub artwork_url: Option<String>,
    pub release_date: Option<String>,
    #[serde(default)]
    pub tracks: Vec<Track>,
}

/// Ordered tracks plus the current index.
///
/// `current_index` is either [`INDEX_UNSET`] or within `[0, len)`; the
/// mutators below keep it that way.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayList {
    tracks: Vec<Track>,
    current_index: i64,
}

impl Default for PlayList {
    fn default() -> Self {
        Self {
            tracks: Vec::new(),
            current_index: INDEX_UNSET,
        }
    }
}

impl PlayList {
    pub fn new(tracks: Vec<Track>) -> Self {
        Self {
            tracks,
            current_index: INDEX_UNSET,
        }
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn current_index(&self) -> i64 {
        self.current_index
    }

    pub fn current(&self) -> Option<&Track> {
        usize::try_from(self.current_index)
            .ok()
            .and_then(|i| self.tracks.get(i))
    }

    pub fn get(&self, index: usize) -> Option<&Track> {
        self.tracks.get(index)
    }

    pub fn position_of(&self, track_id: &str) -> Option<usize> {
        self.tracks.iter().position(|t| t.id == track_id)
    }

    /// Replace the tracks. An unset index becomes 0 for a non-empty list; a
    /// set index is clamped into the new bounds.
    pub fn replace(&mut self, tracks: Vec<Track>) {
        self.tracks = tracks;
        if self.tracks.is_empty() {
            self.current_index = INDEX_UNSET;
        } else if self.current_index == INDEX_UNSET {
            self.current_index = 0;
        } else {
            self.current_index = self.current_index.min(self.tracks.len() as i64 - 1);
        }
    }

    /// Set the current index. Out-of-range values are rejected and leave the
    /// list unchanged.
    pub fn set_current_index(&mut self, index: i64) -> bool {
        if index == INDEX_UNSET || (index >= 0 && (index as usize) < self.tracks.len()) {
            self.current_index = index;
            true
        } else {
            false
        }
    }

    pub fn clear(&mut self) {
        self.tracks.clear();
        self.current_index = INDEX_UNSET;
    }

    pub fn media_items(&self) -> Vec<MediaItem> {
        self.tracks.iter().map(MediaItem::from).collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RepeatMode {
    #[default]
    None,
    All,
    One,
}

impl From<RepeatMode> for EngineRepeatMode {
    fn from(mode: RepeatMode) -> Self {
        match mode {
            RepeatMode::None => EngineRepeatMode::Off,
            RepeatMode::All => EngineRepeatMode::All,
            RepeatMode::One => EngineRepeatMode::One,
        }
    }
}

impl From<EngineRepeatMode> for RepeatMode {
    fn from(mode: EngineRepeatMode) -> Self {
        match mode {
            EngineRepeatMode::Off => RepeatMode::None,
            EngineRepeatMode::All => RepeatMode::All,
            EngineRepeatMode::One => RepeatMode::One,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ShuffleMode {
    #[default]
    Off,
    On,
}

impl ShuffleMode {
    pub fn is_on(self) -> bool {
        self == ShuffleMode::On
    }
}

impl From<bool> for ShuffleMode {
    fn from(enabled: bool) -> Self {
        if enabled {
            ShuffleMode::On
        } else {
            ShuffleMode::Off
        }
    }
}

/// Player state as observed by the UI.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PlaybackState {
    #[default]
    Idle,
    Buffering,
    Playing,
    Paused,
    Error(String),
}

impl PlaybackState {
    pub fn name(&self) -> &'static str {
        match self {
            PlaybackState::Idle => "idle",
            PlaybackState::Buffering => "buffering",
            PlaybackState::Playing => "playing",
            PlaybackState::Paused => "paused",
            PlaybackState::Error(_) => "error",
        }
    }
}

impl fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlaybackState::Error(message) => write!(f, "error: {}", message),
            other => f.write_str(other.name()),
        }
    }
}

/// One-shot playback failure delivered to error subscribers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerError {
    pub message: String,
    pub track_id: Option<String>,
}

#[cfg(test)]
pub(crate) fn track(id: &str) -> Track {
    Track {
        id: id.to_string(),
        title: format!("Title {}", id),
        artist: "Artist".to_string(),
        duration_ms: 180_000,
        stream_url: format!("https://cdn.example.com/{}.mp3", id),
        artwork_url: format!("https://cdn.example.com/{}.jpg", id),
        album_id: Some("album-1".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_replace_sets_unset_index_to_zero() {
        let mut list = PlayList::default();
        assert_eq!(list.current_index(), INDEX_UNSET);

        list.replace(vec![track("a"), track("b")]);
        assert_eq!(list.current_index(), 0);
        assert_eq!(list.current().map(|t| t.id.as_str()), Some("a"));
    }

    #[test]
    fn test_replace_keeps_set_index_in_bounds() {
        let mut list = PlayList::new(vec![track("a"), track("b"), track("c")]);
        assert!(list.set_current_index(2));

        list.replace(vec![track("x")]);
        assert_eq!(list.current_index(), 0);

        list.replace(Vec::new());
        assert_eq!(list.current_index(), INDEX_UNSET);
    }

    #[test]
    fn test_set_current_index_rejects_out_of_range() {
        let mut list = PlayList::new(vec![track("a")]);
        assert!(!list.set_current_index(1));
        assert!(!list.set_current_index(-2));
        assert_eq!(list.current_index(), INDEX_UNSET);
        assert!(list.set_current_index(0));
    }

    #[test]
    fn test_media_items_use_stream_url() {
        let list = PlayList::new(vec![track("a")]);
        let items = list.media_items();
        assert_eq!(items[0].media_id, "a");
        assert_eq!(items[0].uri, "https://cdn.example.com/a.mp3");
    }

    #[test]
    fn test_mode_conversions() {
        assert_eq!(EngineRepeatMode::from(RepeatMode::One), EngineRepeatMode::One);
        assert_eq!(RepeatMode::from(EngineRepeatMode::Off), RepeatMode::None);
        assert!(ShuffleMode::from(true).is_on());
        assert_eq!(
            serde_json::to_string(&RepeatMode::All).unwrap(),
            "\"ALL\""
        );
    }
}
