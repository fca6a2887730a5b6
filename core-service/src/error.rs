use bridge_traits::BridgeError;
use core_playback::{CatalogError, PlaybackError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Core initialization failed: {0}")]
    InitializationFailed(String),

    #[error("Runtime error: {0}")]
    Runtime(#[from] core_runtime::Error),

    #[error("Bridge error: {0}")]
    Bridge(#[from] BridgeError),

    #[error("Playback error: {0}")]
    Playback(#[from] PlaybackError),

    /// Catalog failures pass through unchanged so the UI can show them.
    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Service is shut down")]
    ShutDown,
}

pub type Result<T> = std::result::Result<T, CoreError>;
