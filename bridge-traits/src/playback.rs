//! Playback bridge traits.
//!
//! The platform media player (ExoPlayer behind a media session on Android,
//! AVPlayer on iOS, a native engine on desktop) is driven through
//! [`MediaEngine`]. The core never decodes audio itself: it hands the engine
//! a play-list of [`MediaItem`]s, a [`MediaByteSource`] that serves bytes
//! through the disk cache, and observes the engine through an
//! [`EngineEventStream`].

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use crate::error::Result;

/// One entry of the engine's play-list.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MediaItem {
    /// Stable identifier (the track id).
    pub media_id: String,
    /// Stream URL; also the disk cache key.
    pub uri: String,
}

impl MediaItem {
    pub fn new(media_id: impl Into<String>, uri: impl Into<String>) -> Self {
        Self {
            media_id: media_id.into(),
            uri: uri.into(),
        }
    }
}

/// Coarse engine state, mirroring the usual idle / buffering / ready / ended
/// player lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EngineState {
    Idle,
    Buffering,
    Ready,
    Ended,
}

/// Engine-level repeat mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EngineRepeatMode {
    Off,
    One,
    All,
}

/// Buffer targets applied to the engine's load control.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferTargets {
    pub min_buffer: Duration,
    pub max_buffer: Duration,
    pub buffer_for_playback: Duration,
    pub buffer_for_playback_after_rebuffer: Duration,
    pub back_buffer: Duration,
    /// Keep the back buffer across seeks instead of dropping it.
    pub retain_back_buffer_from_keyframe: bool,
}

/// Events emitted by the engine, in the order the engine produced them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    IsPlayingChanged(bool),
    StateChanged(EngineState),
    /// The current play-list item changed. `None` when the list is empty.
    MediaItemTransition { index: Option<usize> },
    RepeatModeChanged(EngineRepeatMode),
    ShuffleModeChanged(bool),
    /// Unrecoverable playback failure (network or decode).
    Error {
        message: String,
        media_id: Option<String>,
    },
}

/// Ordered stream of engine events.
#[async_trait]
pub trait EngineEventStream: Send {
    /// Next event, or `None` once the engine has been released.
    async fn next(&mut self) -> Option<EngineEvent>;
}

/// Byte source the engine reads media through.
///
/// The core supplies a caching implementation so that prefetched ranges are
/// served from disk and network reads are written through to the cache.
#[async_trait]
pub trait MediaByteSource: Send + Sync {
    /// Read up to `length` bytes of `uri` starting at `offset`. A shorter
    /// result means the end of the resource was reached.
    async fn read_at(&self, uri: &str, offset: u64, length: u64) -> Result<Bytes>;
}

/// Preparation depth for a play-list item that is not fetched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PrepareStage {
    /// Create the underlying source object only.
    SourcePrepared,
    /// Prepare the source and run track selection.
    TracksSelected,
}

/// Hook for preparing media sources ahead of playback without fetching bytes.
#[async_trait]
pub trait SourcePreparer: Send + Sync {
    async fn prepare(&self, item: &MediaItem, stage: PrepareStage) -> Result<()>;

    /// Drop any prepared state for `item`.
    async fn discard(&self, item: &MediaItem) -> Result<()> {
        let _ = item;
        Ok(())
    }
}

/// Platform media player.
///
/// Transport calls are fire-and-forget: they return once the engine accepted
/// the command and report resulting state changes asynchronously through
/// [`events`](MediaEngine::events).
#[async_trait]
pub trait MediaEngine: Send + Sync {
    /// Route all media reads through `source`.
    fn attach_byte_source(&self, source: Arc<dyn MediaByteSource>);

    /// Apply buffer targets. Called once before the first item is set.
    fn configure_buffering(&self, targets: BufferTargets);

    /// Subscribe to engine events.
    fn events(&self) -> Box<dyn EngineEventStream>;

    async fn set_media_items(&self, items: Vec<MediaItem>) -> Result<()>;
    async fn set_media_item(&self, item: MediaItem) -> Result<()>;
    async fn clear_media_items(&self) -> Result<()>;
    async fn prepare(&self) -> Result<()>;
    async fn play(&self) -> Result<()>;
    async fn pause(&self) -> Result<()>;
    async fn stop(&self) -> Result<()>;

    /// Seek within the current item.
    async fn seek_to(&self, position_ms: u64) -> Result<()>;

    /// Switch to the item at `index` and seek to `position_ms`, keeping the
    /// play-list intact.
    async fn seek_to_item(&self, index: usize, position_ms: u64) -> Result<()>;

    async fn set_repeat_mode(&self, mode: EngineRepeatMode) -> Result<()>;
    async fn set_shuffle_enabled(&self, enabled: bool) -> Result<()>;

    fn current_position_ms(&self) -> u64;
    fn duration_ms(&self) -> Option<u64>;
    fn is_playing(&self) -> bool;
    fn state(&self) -> EngineState;

    /// Release native resources. The event stream ends afterwards.
    async fn release(&self) -> Result<()>;
}
