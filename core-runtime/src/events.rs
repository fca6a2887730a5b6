//! # Event Bus System
//!
//! Typed, broadcast-based notifications for the preload pipeline built on
//! `tokio::sync::broadcast`.
//!
//! ## Overview
//!
//! Components publish what happened (a preload finished, the cache was
//! trimmed, the player changed track) without knowing who listens. Hosts
//! subscribe to drive UI, metrics or diagnostics.
//!
//! ```text
//! ┌────────────────┐   emit    ┌───────────┐
//! │ PrefetchSched. ├──────────>│           │   subscribe   ┌────────────┐
//! └────────────────┘           │ EventBus  ├──────────────>│ Subscriber │
//! ┌────────────────┐   emit    │ (broadcast│               └────────────┘
//! │ DiskCache      ├──────────>│  channel) │   subscribe   ┌────────────┐
//! └────────────────┘           │           ├──────────────>│ Subscriber │
//! ┌────────────────┐   emit    │           │               └────────────┘
//! │ EngineAdapter  ├──────────>│           │
//! └────────────────┘           └───────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use core_runtime::events::{CoreEvent, EventBus, EventStream, PreloadEvent};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let bus = EventBus::new(64);
//! let mut preload_only =
//!     EventStream::new(bus.subscribe()).filter(|e| matches!(e, CoreEvent::Preload(_)));
//!
//! bus.emit(CoreEvent::Preload(PreloadEvent::Reset)).ok();
//! assert_eq!(preload_only.recv().await.unwrap(), CoreEvent::Preload(PreloadEvent::Reset));
//! # }
//! ```
//!
//! ## Error Handling
//!
//! - **`RecvError::Lagged(n)`**: the subscriber fell behind and missed `n`
//!   events. Non-fatal.
//! - **`RecvError::Closed`**: every sender was dropped; treat as shutdown.
//!
//! Emitting with no subscribers returns `Err`; publishers ignore it.

use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::broadcast;

pub use tokio::sync::broadcast::error::{RecvError, SendError};
pub use tokio::sync::broadcast::Receiver;

/// Default buffer size for the event bus channel.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 100;

// ============================================================================
// Core Event Types
// ============================================================================

/// Top-level event enum encompassing all event categories.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "payload")]
pub enum CoreEvent {
    /// Player state and track changes
    Playback(PlaybackEvent),
    /// Prefetch job lifecycle
    Preload(PreloadEvent),
    /// Disk cache occupancy changes
    Cache(CacheEvent),
}

impl CoreEvent {
    /// Returns a human-readable description of the event.
    pub fn description(&self) -> &str {
        match self {
            CoreEvent::Playback(e) => e.description(),
            CoreEvent::Preload(e) => e.description(),
            CoreEvent::Cache(e) => e.description(),
        }
    }

    /// Returns the severity level of the event.
    pub fn severity(&self) -> EventSeverity {
        match self {
            CoreEvent::Playback(PlaybackEvent::Error { .. }) => EventSeverity::Error,
            CoreEvent::Preload(PreloadEvent::Failed { .. }) => EventSeverity::Warning,
            CoreEvent::Preload(PreloadEvent::Completed { .. }) => EventSeverity::Info,
            CoreEvent::Cache(CacheEvent::Trimmed { .. }) => EventSeverity::Info,
            CoreEvent::Cache(CacheEvent::Cleared { .. }) => EventSeverity::Info,
            _ => EventSeverity::Debug,
        }
    }
}

/// Event severity levels for filtering and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventSeverity {
    Debug,
    Info,
    Warning,
    Error,
}

// ============================================================================
// Playback Events
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum PlaybackEvent {
    /// Player state changed (`idle`, `buffering`, `playing`, `paused`, `error`).
    StateChanged { state: String },
    /// The current play-list item changed.
    TrackChanged {
        track_id: Option<String>,
        index: i64,
    },
    /// Unrecoverable playback failure for the current item.
    Error {
        track_id: Option<String>,
        message: String,
        recoverable: bool,
    },
}

impl PlaybackEvent {
    pub fn description(&self) -> &str {
        match self {
            PlaybackEvent::StateChanged { .. } => "Playback state changed",
            PlaybackEvent::TrackChanged { .. } => "Current track changed",
            PlaybackEvent::Error { .. } => "Playback error",
        }
    }
}

// ============================================================================
// Preload Events
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum PreloadEvent {
    /// A job was created for a neighbour of the current index.
    Scheduled {
        track_id: String,
        index: usize,
        distance: usize,
        tier: String,
    },
    /// A job reached its target.
    Completed { track_id: String, bytes: u64 },
    /// A job failed; playback will fetch live when it reaches the track.
    Failed { track_id: String, message: String },
    /// A job was superseded or explicitly cancelled.
    Cancelled { track_id: String },
    /// All jobs were dropped and the current index cleared.
    Reset,
}

impl PreloadEvent {
    pub fn description(&self) -> &str {
        match self {
            PreloadEvent::Scheduled { .. } => "Preload scheduled",
            PreloadEvent::Completed { .. } => "Preload completed",
            PreloadEvent::Failed { .. } => "Preload failed",
            PreloadEvent::Cancelled { .. } => "Preload cancelled",
            PreloadEvent::Reset => "Preload reset",
        }
    }
}

// ============================================================================
// Cache Events
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum CacheEvent {
    /// One entry was removed to respect the budget.
    Evicted { key: String, bytes: u64 },
    /// The cache was shrunk in response to storage pressure.
    Trimmed { before_bytes: u64, after_bytes: u64 },
    /// Every entry was removed.
    Cleared { freed_bytes: u64 },
}

impl CacheEvent {
    pub fn description(&self) -> &str {
        match self {
            CacheEvent::Evicted { .. } => "Cache entry evicted",
            CacheEvent::Trimmed { .. } => "Cache trimmed",
            CacheEvent::Cleared { .. } => "Cache cleared",
        }
    }
}

// ============================================================================
// Event Bus
// ============================================================================

/// Central broadcast channel. Cheap to clone; clones share the channel.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<CoreEvent>,
}

impl EventBus {
    /// Creates a new event bus.
    ///
    /// A subscriber that falls more than `capacity` events behind receives
    /// `RecvError::Lagged`.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publishes an event to all subscribers.
    ///
    /// Returns the number of subscribers that received the event, or an
    /// error if nobody is listening.
    pub fn emit(&self, event: CoreEvent) -> Result<usize, SendError<CoreEvent>> {
        self.sender.send(event)
    }

    /// Creates a new subscriber. Past events are not replayed.
    pub fn subscribe(&self) -> Receiver<CoreEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER_SIZE)
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

// ============================================================================
// Event Stream Wrapper
// ============================================================================

type EventFilter = Box<dyn Fn(&CoreEvent) -> bool + Send + Sync>;

/// A wrapper around `broadcast::Receiver` with optional filtering.
pub struct EventStream {
    receiver: Receiver<CoreEvent>,
    filter: Option<EventFilter>,
}

impl EventStream {
    pub fn new(receiver: Receiver<CoreEvent>) -> Self {
        Self {
            receiver,
            filter: None,
        }
    }

    /// Only events matching `predicate` are returned by `recv`/`try_recv`.
    pub fn filter<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&CoreEvent) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Box::new(predicate));
        self
    }

    fn accepts(&self, event: &CoreEvent) -> bool {
        self.filter.as_ref().map_or(true, |filter| filter(event))
    }

    /// Receives the next event that passes the filter.
    pub async fn recv(&mut self) -> Result<CoreEvent, RecvError> {
        loop {
            let event = self.receiver.recv().await?;
            if self.accepts(&event) {
                return Ok(event);
            }
        }
    }

    /// Attempts to receive an event without waiting.
    ///
    /// Returns `None` if no matching event is currently buffered.
    pub fn try_recv(&mut self) -> Option<Result<CoreEvent, RecvError>> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => {
                    if self.accepts(&event) {
                        return Some(Ok(event));
                    }
                }
                Err(broadcast::error::TryRecvError::Empty) => return None,
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    return Some(Err(RecvError::Lagged(n)))
                }
                Err(broadcast::error::TryRecvError::Closed) => return Some(Err(RecvError::Closed)),
            }
        }
    }
}

impl fmt::Debug for EventStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventStream")
            .field("has_filter", &self.filter.is_some())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn completed(track_id: &str) -> CoreEvent {
        CoreEvent::Preload(PreloadEvent::Completed {
            track_id: track_id.to_string(),
            bytes: 1_200_000,
        })
    }

    #[tokio::test]
    async fn test_event_bus_subscription() {
        let bus = EventBus::new(10);
        assert_eq!(bus.subscriber_count(), 0);
        let _sub1 = bus.subscribe();
        let _sub2 = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 2);
    }

    #[tokio::test]
    async fn test_event_emission_no_subscribers() {
        let bus = EventBus::new(10);
        assert!(bus.emit(CoreEvent::Preload(PreloadEvent::Reset)).is_err());
    }

    #[tokio::test]
    async fn test_multiple_subscribers_receive_same_event() {
        let bus = EventBus::new(10);
        let mut sub1 = bus.subscribe();
        let mut sub2 = bus.subscribe();

        let event = completed("t1");
        assert_eq!(bus.emit(event.clone()).unwrap(), 2);

        assert_eq!(sub1.recv().await.unwrap(), event);
        assert_eq!(sub2.recv().await.unwrap(), event);
    }

    #[tokio::test]
    async fn test_event_stream_with_filter() {
        let bus = EventBus::new(10);
        let mut stream =
            EventStream::new(bus.subscribe()).filter(|e| matches!(e, CoreEvent::Cache(_)));

        bus.emit(completed("t1")).ok();
        let trimmed = CoreEvent::Cache(CacheEvent::Trimmed {
            before_bytes: 400,
            after_bytes: 200,
        });
        bus.emit(trimmed.clone()).ok();

        assert_eq!(stream.recv().await.unwrap(), trimmed);
    }

    #[tokio::test]
    async fn test_lagged_subscriber() {
        let bus = EventBus::new(2);
        let mut sub = bus.subscribe();

        for i in 0..5 {
            bus.emit(completed(&format!("t{}", i))).ok();
        }

        assert!(matches!(sub.recv().await, Err(RecvError::Lagged(_))));
    }

    #[test]
    fn test_event_severity() {
        let error = CoreEvent::Playback(PlaybackEvent::Error {
            track_id: Some("t1".to_string()),
            message: "decoder failed".to_string(),
            recoverable: false,
        });
        assert_eq!(error.severity(), EventSeverity::Error);

        let failed = CoreEvent::Preload(PreloadEvent::Failed {
            track_id: "t2".to_string(),
            message: "HTTP 503".to_string(),
        });
        assert_eq!(failed.severity(), EventSeverity::Warning);

        assert_eq!(completed("t3").severity(), EventSeverity::Info);
        assert_eq!(
            CoreEvent::Preload(PreloadEvent::Cancelled {
                track_id: "t4".to_string()
            })
            .severity(),
            EventSeverity::Debug
        );
    }

    #[test]
    fn test_event_serialization() {
        let event = CoreEvent::Preload(PreloadEvent::Scheduled {
            track_id: "t6".to_string(),
            index: 6,
            distance: 1,
            tier: "partial".to_string(),
        });

        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"type\":\"Preload\""));
        assert!(json.contains("\"event\":\"scheduled\""));

        let back: CoreEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back, event);
    }

    #[tokio::test]
    async fn test_try_recv() {
        let bus = EventBus::new(10);
        let mut stream = EventStream::new(bus.subscribe());
        assert!(stream.try_recv().is_none());

        bus.emit(completed("t1")).ok();
        assert_eq!(stream.try_recv().unwrap().unwrap(), completed("t1"));
    }
}
