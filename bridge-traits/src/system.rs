//! OS signal abstractions.
//!
//! Hosts forward the handful of system notifications the pipeline reacts to:
//! memory pressure (trim the disk cache) and audio output route removal
//! (pause playback before sound comes out of the speaker).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Severity attached to a memory-pressure notification.
///
/// The pipeline currently treats every level the same way; the level is kept
/// for logging and for hosts that want to filter before forwarding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum MemoryPressure {
    Moderate,
    Low,
    Critical,
}

/// A system notification relevant to playback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SystemSignal {
    /// Low-memory / trim-memory notification.
    TrimMemory(MemoryPressure),
    /// Headphones unplugged or Bluetooth sink disconnected.
    AudioBecomingNoisy,
}

/// Source of system signals.
///
/// # Example
///
/// ```ignore
/// use bridge_traits::system::{SystemSignal, SystemSignalSource};
///
/// async fn watch(source: &dyn SystemSignalSource) -> Result<()> {
///     let mut stream = source.subscribe().await?;
///     while let Some(signal) = stream.next().await {
///         println!("signal: {:?}", signal);
///     }
///     Ok(())
/// }
/// ```
#[async_trait]
pub trait SystemSignalSource: Send + Sync {
    async fn subscribe(&self) -> Result<Box<dyn SystemSignalStream>>;
}

/// Stream of system signals.
#[async_trait]
pub trait SystemSignalStream: Send {
    /// Wait for the next signal. Returns `None` when the source shuts down.
    async fn next(&mut self) -> Option<SystemSignal>;
}
