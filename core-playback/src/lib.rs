//! # Preload & Playback-Caching Pipeline
//!
//! Decides which neighbours of the current track to fetch ahead of time,
//! keeps their bytes in a bounded disk cache, and serves playback reads
//! through that cache.
//!
//! ## Overview
//!
//! This crate handles:
//! - Cache budget sizing from free storage
//! - Byte-range disk cache with LRU eviction and low-storage trimming
//! - A caching data source used by both the engine and prefetch jobs
//! - Distance-tiered prefetch scheduling with cooperative cancellation
//! - An adapter that drives the platform player and republishes its state
//! - A command channel for controllers in another process
//!
//! ## Components
//!
//! ```text
//!   CommandClient ──> CommandServer ──> PreloadCommandHandler
//!                                          │            │
//!                                          ▼            ▼
//!                              PrefetchScheduler   PlaybackEngineAdapter
//!                                          │            │ (byte source)
//!                                          ▼            ▼
//!                                       CachingDataSource ──> HttpClient
//!                                                │
//!                                                ▼
//!                        CacheTrimController ─> DiskCache <─ CacheBudgetPolicy
//! ```

pub mod cache;
pub mod catalog;
pub mod command;
pub mod error;
pub mod models;
pub mod player;
pub mod preload;

#[cfg(test)]
mod test_support;

pub use cache::{
    compute_budget, CacheBudgetPolicy, CacheStats, CacheTrimController, CachingDataSource,
    DataSourceConfig, DiskCache, DiskCacheConfig, TrimOutcome,
};
pub use catalog::{CatalogError, CatalogRepository, CatalogResult};
pub use command::{
    command_channel, CommandArgs, CommandClient, CommandEnvelope, CommandReply, CommandServer,
    PreloadCommand, PreloadCommandHandler,
};
pub use error::{PlaybackError, Result};
pub use models::{
    Album, PlayList, PlaybackState, PlayerError, RepeatMode, ShuffleMode, Track, INDEX_UNSET,
};
pub use player::{BufferingConfig, PlaybackEngineAdapter, PlayerConfig};
pub use preload::{JobState, PrefetchScheduler, PreloadConfig, PreloadStatus, PreloadTier};
