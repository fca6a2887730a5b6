//! # Player
//!
//! [`PlaybackEngineAdapter`] owns the play-list, drives the platform engine,
//! and republishes engine state as `watch` channels.
//!
//! ```ignore
//! let adapter = PlaybackEngineAdapter::new(engine, data_source, PlayerConfig::default(), None);
//! adapter.set_playlist(album.tracks.clone()).await?;
//! adapter.play_at(3).await?;
//!
//! let mut state = adapter.subscribe_state();
//! while state.changed().await.is_ok() {
//!     println!("{}", *state.borrow());
//! }
//! ```

pub mod adapter;
pub mod config;

pub use adapter::PlaybackEngineAdapter;
pub use config::{BufferingConfig, PlayerConfig, PREVIOUS_TRACK_THRESHOLD_MS};
