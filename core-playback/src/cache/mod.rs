//! # Media Cache Module
//!
//! Byte-range disk cache for streamed tracks, plus the data source that reads
//! through it.
//!
//! ## Overview
//!
//! - Persistent storage using the `FileSystemAccess` trait
//! - LRU eviction against a budget derived from free storage
//! - Partial entries: any set of byte ranges of a resource can be cached
//! - Trimming to half size under memory pressure when storage runs low
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────────────────────────────┐
//! │     CachingDataSource                  │
//! │  - read()          (engine reads)      │
//! │  - cache_range()   (prefetch fills)    │
//! └────────┬───────────────────────────────┘
//!          │
//!          ├──> DiskCache (segments + manifests on FileSystemAccess)
//!          └──> HttpClient (Range requests)
//!
//! CacheTrimController ──> DiskCache::trim_to()
//! CacheBudgetPolicy   ──> StorageTelemetry
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use core_playback::cache::{CacheBudgetPolicy, CachingDataSource, DiskCache, DiskCacheConfig};
//!
//! # async fn example(config: &core_runtime::CoreConfig) -> core_playback::Result<()> {
//! let budget = CacheBudgetPolicy::from(config.cache_budget)
//!     .resolve(config.storage_telemetry.as_ref())
//!     .await;
//! let cache = DiskCache::open(
//!     config.file_system.clone(),
//!     config.clock.clone(),
//!     &config.cache_dir,
//!     &DiskCacheConfig::new(budget),
//!     None,
//! )
//! .await?;
//! # Ok(())
//! # }
//! ```

pub mod budget;
pub mod config;
pub mod data_source;
pub mod range;
pub mod stats;
pub mod store;
pub mod trim;

pub use budget::{compute_budget, CacheBudgetPolicy};
pub use config::{DataSourceConfig, DiskCacheConfig, DEFAULT_CHUNK_SIZE};
pub use data_source::CachingDataSource;
pub use range::SegmentMap;
pub use stats::CacheStats;
pub use store::DiskCache;
pub use trim::{CacheTrimController, TrimOutcome};
