//! # Playback Engine Adapter
//!
//! Wraps the platform [`MediaEngine`] behind observable state. Engine events
//! are consumed by one listener task, in order, and folded into `watch`
//! channels; UI code subscribes to those instead of polling the engine.
//! While the engine reports playing, a second task samples the position at
//! the configured interval.
//!
//! Transport methods forward to the engine and return once it accepted the
//! command. Resulting state changes arrive through the event stream.

use std::sync::{Arc, Weak};

use bridge_traits::error::BridgeError;
use bridge_traits::playback::{EngineEvent, EngineState, MediaByteSource, MediaEngine, MediaItem};
use core_runtime::events::{CoreEvent, EventBus, PlaybackEvent};
use parking_lot::{Mutex, RwLock};
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument};

use crate::error::{PlaybackError, Result};
use crate::models::{
    PlayList, PlaybackState, PlayerError, RepeatMode, ShuffleMode, Track, INDEX_UNSET,
};
use crate::player::config::{PlayerConfig, PREVIOUS_TRACK_THRESHOLD_MS};

const ERROR_CHANNEL_CAPACITY: usize = 16;

#[derive(Debug, Clone, Copy)]
struct EngineStatus {
    state: EngineState,
    playing: bool,
}

fn engine_failure(operation: &'static str) -> impl FnOnce(BridgeError) -> PlaybackError {
    move |e| PlaybackError::PlaybackFailed(format!("{}: {}", operation, e))
}

pub struct PlaybackEngineAdapter {
    engine: Arc<dyn MediaEngine>,
    config: PlayerConfig,
    event_bus: Option<Arc<EventBus>>,
    playlist: RwLock<PlayList>,
    engine_status: Mutex<EngineStatus>,
    state_tx: watch::Sender<PlaybackState>,
    track_tx: watch::Sender<Option<Track>>,
    index_tx: watch::Sender<i64>,
    position_tx: watch::Sender<u64>,
    duration_tx: watch::Sender<u64>,
    repeat_tx: watch::Sender<RepeatMode>,
    shuffle_tx: watch::Sender<ShuffleMode>,
    playing_tx: watch::Sender<bool>,
    errors_tx: broadcast::Sender<PlayerError>,
    shutdown: CancellationToken,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl PlaybackEngineAdapter {
    /// Attach `byte_source` and the buffer targets to `engine`, then start
    /// the event listener and position poller. Must be called from within a
    /// Tokio runtime.
    pub fn new(
        engine: Arc<dyn MediaEngine>,
        byte_source: Arc<dyn MediaByteSource>,
        config: PlayerConfig,
        event_bus: Option<Arc<EventBus>>,
    ) -> Arc<Self> {
        engine.attach_byte_source(byte_source);
        engine.configure_buffering(config.buffering.to_targets());

        let (errors_tx, _) = broadcast::channel(ERROR_CHANNEL_CAPACITY);
        let adapter = Arc::new(Self {
            engine,
            config,
            event_bus,
            playlist: RwLock::new(PlayList::default()),
            engine_status: Mutex::new(EngineStatus {
                state: EngineState::Idle,
                playing: false,
            }),
            state_tx: watch::Sender::new(PlaybackState::Idle),
            track_tx: watch::Sender::new(None),
            index_tx: watch::Sender::new(INDEX_UNSET),
            position_tx: watch::Sender::new(0),
            duration_tx: watch::Sender::new(0),
            repeat_tx: watch::Sender::new(RepeatMode::None),
            shuffle_tx: watch::Sender::new(ShuffleMode::Off),
            playing_tx: watch::Sender::new(false),
            errors_tx,
            shutdown: CancellationToken::new(),
            tasks: Mutex::new(Vec::new()),
        });

        let listener = adapter.spawn_event_listener();
        let poller = adapter.spawn_position_poller();
        adapter.tasks.lock().extend([listener, poller]);
        adapter
    }

    fn spawn_event_listener(self: &Arc<Self>) -> JoinHandle<()> {
        let weak: Weak<Self> = Arc::downgrade(self);
        let mut events = self.engine.events();
        let shutdown = self.shutdown.clone();

        tokio::spawn(async move {
            loop {
                let event = tokio::select! {
                    biased;
                    _ = shutdown.cancelled() => break,
                    event = events.next() => event,
                };
                let Some(event) = event else {
                    debug!("Engine event stream ended");
                    break;
                };
                let Some(adapter) = weak.upgrade() else {
                    break;
                };
                adapter.handle_engine_event(event);
            }
        })
    }

    fn spawn_position_poller(self: &Arc<Self>) -> JoinHandle<()> {
        let weak: Weak<Self> = Arc::downgrade(self);
        let mut playing = self.playing_tx.subscribe();
        let shutdown = self.shutdown.clone();
        let period = self.config.position_poll_interval;

        tokio::spawn(async move {
            loop {
                loop {
                    let is_playing = *playing.borrow_and_update();
                    if is_playing {
                        break;
                    }
                    tokio::select! {
                        biased;
                        _ = shutdown.cancelled() => return,
                        changed = playing.changed() => if changed.is_err() { return },
                    }
                }

                let mut ticker = tokio::time::interval(period);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
                loop {
                    tokio::select! {
                        biased;
                        _ = shutdown.cancelled() => return,
                        changed = playing.changed() => {
                            if changed.is_err() {
                                return;
                            }
                            let is_playing = *playing.borrow_and_update();
                            if !is_playing {
                                break;
                            }
                        }
                        _ = ticker.tick() => match weak.upgrade() {
                            Some(adapter) => adapter.sample_position(),
                            None => return,
                        },
                    }
                }

                // One last sample so a paused UI shows where playback stopped.
                match weak.upgrade() {
                    Some(adapter) => adapter.sample_position(),
                    None => return,
                }
            }
        })
    }

    fn sample_position(&self) {
        self.position_tx
            .send_replace(self.engine.current_position_ms());
    }

    // ------------------------------------------------------------------------
    // Engine events
    // ------------------------------------------------------------------------

    fn handle_engine_event(&self, event: EngineEvent) {
        match event {
            EngineEvent::IsPlayingChanged(playing) => {
                let engine_state = {
                    let mut status = self.engine_status.lock();
                    status.playing = playing;
                    status.state
                };
                self.playing_tx.send_replace(playing);
                if playing {
                    self.set_state(PlaybackState::Playing);
                } else if !matches!(engine_state, EngineState::Idle | EngineState::Ended) {
                    self.set_state(PlaybackState::Paused);
                }
            }
            EngineEvent::StateChanged(state) => {
                let playing = {
                    let mut status = self.engine_status.lock();
                    status.state = state;
                    status.playing
                };
                match state {
                    EngineState::Buffering => self.set_state(PlaybackState::Buffering),
                    EngineState::Ready => {
                        if let Some(duration) = self.engine.duration_ms() {
                            self.duration_tx.send_replace(duration);
                        }
                        self.set_state(if playing {
                            PlaybackState::Playing
                        } else {
                            PlaybackState::Paused
                        });
                    }
                    EngineState::Idle | EngineState::Ended => self.set_state(PlaybackState::Idle),
                }
            }
            EngineEvent::MediaItemTransition { index } => {
                let (track, current) = {
                    let mut playlist = self.playlist.write();
                    if let Some(index) = index {
                        playlist.set_current_index(index as i64);
                    }
                    (playlist.current().cloned(), playlist.current_index())
                };
                self.position_tx.send_replace(0);
                self.publish_track(track, current);
            }
            EngineEvent::RepeatModeChanged(mode) => {
                self.repeat_tx.send_replace(mode.into());
            }
            EngineEvent::ShuffleModeChanged(enabled) => {
                self.shuffle_tx.send_replace(enabled.into());
            }
            EngineEvent::Error { message, media_id } => {
                let track_id = media_id.or_else(|| self.playlist.read().current().map(|t| t.id.clone()));
                error!(track_id = ?track_id, error = %message, "Playback error");

                self.engine_status.lock().playing = false;
                self.playing_tx.send_replace(false);
                let _ = self.errors_tx.send(PlayerError {
                    message: message.clone(),
                    track_id: track_id.clone(),
                });
                self.emit(PlaybackEvent::Error {
                    track_id,
                    message: message.clone(),
                    recoverable: false,
                });
                self.set_state(PlaybackState::Error(message));
                self.set_state(PlaybackState::Idle);
            }
        }
    }

    fn set_state(&self, state: PlaybackState) {
        let name = state.name();
        let changed = self.state_tx.send_if_modified(|current| {
            if *current == state {
                false
            } else {
                *current = state;
                true
            }
        });
        if changed {
            debug!(state = name, "Playback state changed");
            self.emit(PlaybackEvent::StateChanged {
                state: name.to_string(),
            });
        }
    }

    fn publish_track(&self, track: Option<Track>, index: i64) {
        let track_id = track.as_ref().map(|t| t.id.clone());
        self.index_tx.send_replace(index);
        self.track_tx.send_replace(track);
        self.emit(PlaybackEvent::TrackChanged { track_id, index });
    }

    fn emit(&self, event: PlaybackEvent) {
        if let Some(bus) = &self.event_bus {
            let _ = bus.emit(CoreEvent::Playback(event));
        }
    }

    // ------------------------------------------------------------------------
    // Transport
    // ------------------------------------------------------------------------

    /// Replace the play-list. An unset index becomes 0.
    #[instrument(skip(self, tracks), fields(len = tracks.len()))]
    pub async fn set_playlist(&self, tracks: Vec<Track>) -> Result<()> {
        let (items, index, track) = {
            let mut playlist = self.playlist.write();
            playlist.replace(tracks);
            (
                playlist.media_items(),
                playlist.current_index(),
                playlist.current().cloned(),
            )
        };

        self.engine
            .set_media_items(items)
            .await
            .map_err(engine_failure("set_media_items"))?;
        if index > 0 {
            self.engine
                .seek_to_item(index as usize, 0)
                .await
                .map_err(engine_failure("seek_to_item"))?;
        }
        self.engine
            .prepare()
            .await
            .map_err(engine_failure("prepare"))?;

        self.publish_track(track, index);
        info!(index, "Play-list set");
        Ok(())
    }

    /// Play `track`: jump to it if it is in the play-list, otherwise make it
    /// the only item.
    #[instrument(skip(self, track), fields(track_id = %track.id))]
    pub async fn play(&self, track: Track) -> Result<()> {
        let existing = self.playlist.read().position_of(&track.id);
        match existing {
            Some(index) => {
                self.engine
                    .seek_to_item(index, 0)
                    .await
                    .map_err(engine_failure("seek_to_item"))?;
                self.playlist.write().set_current_index(index as i64);
            }
            None => {
                self.engine
                    .set_media_item(track.to_media_item())
                    .await
                    .map_err(engine_failure("set_media_item"))?;
                self.engine
                    .prepare()
                    .await
                    .map_err(engine_failure("prepare"))?;
                self.playlist.write().replace(vec![track]);
            }
        }

        self.engine.play().await.map_err(engine_failure("play"))?;
        self.position_tx.send_replace(0);
        self.publish_current();
        Ok(())
    }

    /// Jump to `index` of the play-list and start playing.
    #[instrument(skip(self))]
    pub async fn play_at(&self, index: usize) -> Result<()> {
        let len = self.playlist.read().len();
        if index >= len {
            return Err(PlaybackError::IndexOutOfRange {
                index: index as i64,
                len,
            });
        }

        self.engine
            .seek_to_item(index, 0)
            .await
            .map_err(engine_failure("seek_to_item"))?;
        self.engine.play().await.map_err(engine_failure("play"))?;

        self.playlist.write().set_current_index(index as i64);
        self.position_tx.send_replace(0);
        self.publish_current();
        Ok(())
    }

    pub async fn pause(&self) -> Result<()> {
        self.engine.pause().await.map_err(engine_failure("pause"))
    }

    pub async fn resume(&self) -> Result<()> {
        self.engine.play().await.map_err(engine_failure("play"))
    }

    /// Stop playback and clear the play-list.
    #[instrument(skip(self))]
    pub async fn stop(&self) -> Result<()> {
        self.engine.stop().await.map_err(engine_failure("stop"))?;
        self.engine
            .clear_media_items()
            .await
            .map_err(engine_failure("clear_media_items"))?;

        self.playlist.write().clear();
        self.engine_status.lock().playing = false;
        self.playing_tx.send_replace(false);
        self.position_tx.send_replace(0);
        self.duration_tx.send_replace(0);
        self.publish_track(None, INDEX_UNSET);
        self.set_state(PlaybackState::Idle);
        Ok(())
    }

    pub async fn seek_to(&self, position_ms: u64) -> Result<()> {
        self.engine
            .seek_to(position_ms)
            .await
            .map_err(engine_failure("seek_to"))?;
        self.position_tx.send_replace(position_ms);
        Ok(())
    }

    /// Go to the next track. No-op on the last track; looping under repeat
    /// is left to the engine.
    pub async fn skip_to_next(&self) -> Result<()> {
        match self.neighbour_index(1) {
            Some(next) => self.play_at(next).await,
            None => {
                debug!("No next track");
                Ok(())
            }
        }
    }

    /// Go to the previous track when within the first five seconds (inclusive)
    /// and one exists; otherwise restart the current track.
    pub async fn skip_to_previous(&self) -> Result<()> {
        let position = self.engine.current_position_ms();
        match self.neighbour_index(-1) {
            Some(previous) if position <= PREVIOUS_TRACK_THRESHOLD_MS => self.play_at(previous).await,
            _ => self.seek_to(0).await,
        }
    }

    fn neighbour_index(&self, step: i64) -> Option<usize> {
        let (current, len) = {
            let playlist = self.playlist.read();
            (playlist.current_index(), playlist.len() as i64)
        };
        if current == INDEX_UNSET || len == 0 {
            return None;
        }
        let target = current + step;
        (0..len).contains(&target).then_some(target as usize)
    }

    pub async fn set_repeat_mode(&self, mode: RepeatMode) -> Result<()> {
        self.engine
            .set_repeat_mode(mode.into())
            .await
            .map_err(engine_failure("set_repeat_mode"))?;
        self.repeat_tx.send_replace(mode);
        Ok(())
    }

    pub async fn set_shuffle_mode(&self, mode: ShuffleMode) -> Result<()> {
        self.engine
            .set_shuffle_enabled(mode.is_on())
            .await
            .map_err(engine_failure("set_shuffle_enabled"))?;
        self.shuffle_tx.send_replace(mode);
        Ok(())
    }

    /// Pause when the audio route is about to become noisy (headphones
    /// unplugged).
    pub async fn on_audio_becoming_noisy(&self) -> Result<()> {
        let playing = *self.playing_tx.borrow() || self.engine.is_playing();
        if playing {
            info!("Audio becoming noisy, pausing");
            self.pause().await?;
        }
        Ok(())
    }

    fn publish_current(&self) {
        let (track, index) = {
            let playlist = self.playlist.read();
            (playlist.current().cloned(), playlist.current_index())
        };
        self.publish_track(track, index);
    }

    /// Stop the background tasks and release the engine.
    #[instrument(skip(self))]
    pub async fn release(&self) -> Result<()> {
        self.shutdown.cancel();
        let tasks: Vec<_> = self.tasks.lock().drain(..).collect();
        for task in tasks {
            let _ = task.await;
        }
        self.engine
            .release()
            .await
            .map_err(engine_failure("release"))?;
        info!("Playback engine released");
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Observation
    // ------------------------------------------------------------------------

    pub fn playlist(&self) -> PlayList {
        self.playlist.read().clone()
    }

    pub fn media_items(&self) -> Vec<MediaItem> {
        self.playlist.read().media_items()
    }

    pub fn current_index(&self) -> i64 {
        self.playlist.read().current_index()
    }

    pub fn current_track(&self) -> Option<Track> {
        self.playlist.read().current().cloned()
    }

    pub fn playback_state(&self) -> PlaybackState {
        self.state_tx.borrow().clone()
    }

    pub fn position_ms(&self) -> u64 {
        *self.position_tx.borrow()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<PlaybackState> {
        self.state_tx.subscribe()
    }

    pub fn subscribe_track(&self) -> watch::Receiver<Option<Track>> {
        self.track_tx.subscribe()
    }

    pub fn subscribe_index(&self) -> watch::Receiver<i64> {
        self.index_tx.subscribe()
    }

    pub fn subscribe_position(&self) -> watch::Receiver<u64> {
        self.position_tx.subscribe()
    }

    pub fn subscribe_duration(&self) -> watch::Receiver<u64> {
        self.duration_tx.subscribe()
    }

    pub fn subscribe_repeat_mode(&self) -> watch::Receiver<RepeatMode> {
        self.repeat_tx.subscribe()
    }

    pub fn subscribe_shuffle_mode(&self) -> watch::Receiver<ShuffleMode> {
        self.shuffle_tx.subscribe()
    }

    pub fn subscribe_errors(&self) -> broadcast::Receiver<PlayerError> {
        self.errors_tx.subscribe()
    }
}

impl Drop for PlaybackEngineAdapter {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}
