//! # Core Runtime Module
//!
//! Foundational runtime infrastructure for the preload pipeline:
//! - Logging and tracing setup with host forwarding
//! - Configuration builder with desktop defaults
//! - Event bus for playback, preload and cache notifications
//!
//! ## Overview
//!
//! Every other core crate depends on this one for its logging conventions,
//! its configuration types and the broadcast channel used to publish what
//! the pipeline is doing.

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use config::{CacheBudgetSettings, CoreConfig, CoreConfigBuilder, PreloadSettings};
pub use error::{Error, Result};
pub use events::{CacheEvent, CoreEvent, EventBus, EventStream, PlaybackEvent, PreloadEvent};
