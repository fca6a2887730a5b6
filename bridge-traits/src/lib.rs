//! # Host Bridge Traits
//!
//! Platform abstraction traits that each host must implement for the preload
//! and playback-caching pipeline.
//!
//! ## Overview
//!
//! This crate defines the contract between the core and the platform. Each
//! trait represents a capability the core requires but that is implemented
//! differently per platform (Android media session service, desktop, tests).
//!
//! ## Traits
//!
//! ### Networking & I/O
//! - [`HttpClient`](http::HttpClient) - Range-capable HTTP with streaming bodies
//! - [`FileSystemAccess`](storage::FileSystemAccess) - Cache directory file I/O
//! - [`StorageTelemetry`](storage::StorageTelemetry) - Free-space query that sizes the cache
//!
//! ### Playback
//! - [`MediaEngine`](playback::MediaEngine) - The platform player and its event stream
//! - [`MediaByteSource`](playback::MediaByteSource) - Byte reads the engine routes through the cache
//! - [`SourcePreparer`](playback::SourcePreparer) - Prepare-without-fetch hook for distant neighbours
//!
//! ### Platform Integration
//! - [`SystemSignalSource`](system::SystemSignalSource) - Memory pressure and audio-route signals
//!
//! ### Utilities
//! - [`Clock`](time::Clock) - Time source for deterministic testing
//! - [`LoggerSink`](time::LoggerSink) - Forward structured logs to host logging
//!
//! ## Error Handling
//!
//! All bridge traits use [`BridgeError`](error::BridgeError). Platform
//! implementations should convert native errors into it with an actionable
//! message; the core decides whether a failure is contained (prefetch) or
//! surfaced (transport commands).
//!
//! ## Thread Safety
//!
//! All bridge traits require `Send + Sync` so they can be shared across tokio
//! tasks behind an `Arc`.

pub mod error;
pub mod http;
pub mod playback;
pub mod storage;
pub mod system;
pub mod time;

pub use error::BridgeError;

// Re-export commonly used types
pub use http::{ByteRange, HttpClient, HttpMethod, HttpRequest, HttpResponse, HttpStream};
pub use playback::{
    BufferTargets, EngineEvent, EngineEventStream, EngineRepeatMode, EngineState, MediaByteSource,
    MediaEngine, MediaItem, PrepareStage, SourcePreparer,
};
pub use storage::{FileMetadata, FileSystemAccess, StorageTelemetry};
pub use system::{MemoryPressure, SystemSignal, SystemSignalSource, SystemSignalStream};
pub use time::{Clock, LogEntry, LogLevel, LoggerSink, ManualClock, SystemClock};
