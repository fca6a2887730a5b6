//! Core service façade.
//!
//! Wires host-provided bridges (HTTP, file system, storage telemetry, media
//! engine, system signals) into the preload pipeline. Desktop apps enable the
//! `desktop-shims` feature so that [`CoreConfig`] fills in the bridges from
//! `bridge-desktop`; mobile hosts inject their own.
//!
//! ```ignore
//! use core_runtime::logging::{init_logging, LoggingConfig};
//! use core_service::{CoreConfig, PlaybackService};
//!
//! init_logging(LoggingConfig::default())?;
//! let config = CoreConfig::builder().cache_dir("/data/cache").build()?;
//! let service = PlaybackService::start(config, engine, catalog).await?;
//!
//! service.play_album("album-1", Some("track-4")).await?;
//! let controller = service.command_client();
//! controller.play_preloaded("track-5").await?;
//!
//! service.shutdown().await?;
//! ```

pub mod error;
pub mod service;

pub use core_runtime::CoreConfig;
pub use error::{CoreError, Result};
pub use service::PlaybackService;
