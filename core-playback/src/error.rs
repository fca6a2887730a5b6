//! # Playback Error Types
//!
//! Error types for the cache, prefetch, player and command layers.

use bridge_traits::BridgeError;
use thiserror::Error;

use crate::catalog::CatalogError;

/// Errors that can occur in the preload and playback-caching pipeline.
#[derive(Error, Debug)]
pub enum PlaybackError {
    // ========================================================================
    // Cache Errors
    // ========================================================================
    /// Disk cache operation failed.
    #[error("Cache error: {0}")]
    CacheError(String),

    /// A persisted cache manifest could not be decoded.
    #[error("Corrupt cache entry: {0}")]
    CorruptEntry(String),

    // ========================================================================
    // Source Errors
    // ========================================================================
    /// Network read failed mid-stream or could not be opened.
    #[error("Streaming failed: {0}")]
    StreamingFailed(String),

    /// Server answered with a status the data source cannot use.
    #[error("HTTP {status} while fetching {url}")]
    HttpStatus { status: u16, url: String },

    /// Operation was cancelled cooperatively.
    #[error("Operation cancelled")]
    Cancelled,

    // ========================================================================
    // Preload Errors
    // ========================================================================
    /// A prefetch job failed; contained at the job boundary.
    #[error("Preload failed for {track_id}: {message}")]
    PreloadFailed { track_id: String, message: String },

    /// The component was released and no longer accepts work.
    #[error("Component released")]
    Released,

    // ========================================================================
    // Playback Control Errors
    // ========================================================================
    /// Engine rejected a transport command.
    #[error("Playback operation failed: {0}")]
    PlaybackFailed(String),

    /// Play-list index outside `[0, len)`.
    #[error("Index {index} out of range for play-list of {len} tracks")]
    IndexOutOfRange { index: i64, len: usize },

    // ========================================================================
    // Command Channel Errors
    // ========================================================================
    /// The command server stopped.
    #[error("Command channel closed")]
    ChannelClosed,

    /// Command payload could not be decoded.
    #[error("Invalid command payload: {0}")]
    InvalidCommand(String),

    // ========================================================================
    // Generic Errors
    // ========================================================================
    /// Catalog lookup failed; surfaced unchanged.
    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error("Bridge error: {0}")]
    Bridge(#[from] BridgeError),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl PlaybackError {
    /// Returns `true` if this error is transient and the operation can be retried.
    pub fn is_transient(&self) -> bool {
        match self {
            PlaybackError::StreamingFailed(_) => true,
            PlaybackError::HttpStatus { status, .. } => *status >= 500 || *status == 429,
            PlaybackError::Catalog(CatalogError::Network(_)) => true,
            _ => false,
        }
    }

    /// Returns `true` if this error is due to network issues.
    pub fn is_network_error(&self) -> bool {
        matches!(
            self,
            PlaybackError::StreamingFailed(_)
                | PlaybackError::HttpStatus { .. }
                | PlaybackError::Catalog(CatalogError::Network(_))
        )
    }

    /// Returns `true` if this error came from the disk cache.
    pub fn is_cache_error(&self) -> bool {
        matches!(
            self,
            PlaybackError::CacheError(_) | PlaybackError::CorruptEntry(_) | PlaybackError::IoError(_)
        )
    }
}

/// Result type for playback operations.
pub type Result<T> = std::result::Result<T, PlaybackError>;
