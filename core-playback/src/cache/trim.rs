//! Cache trimming under memory and storage pressure.

use std::sync::Arc;

use bridge_traits::storage::StorageTelemetry;
use bridge_traits::system::MemoryPressure;
use core_runtime::config::DEFAULT_LOW_STORAGE_THRESHOLD_BYTES;
use core_runtime::events::{CacheEvent, CoreEvent, EventBus};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::cache::store::DiskCache;
use crate::error::Result;

/// What a memory-pressure signal did to the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum TrimOutcome {
    /// Enough free storage, or nothing cached.
    Skipped { available_bytes: u64 },
    Trimmed { before_bytes: u64, after_bytes: u64 },
    /// Free space could not be read; the cache was left alone.
    TelemetryUnavailable,
}

/// Halves the cache when the host signals memory pressure while the device
/// is low on storage.
pub struct CacheTrimController {
    cache: Arc<DiskCache>,
    telemetry: Arc<dyn StorageTelemetry>,
    threshold_bytes: u64,
    event_bus: Option<Arc<EventBus>>,
}

impl CacheTrimController {
    pub fn new(cache: Arc<DiskCache>, telemetry: Arc<dyn StorageTelemetry>) -> Self {
        Self {
            cache,
            telemetry,
            threshold_bytes: DEFAULT_LOW_STORAGE_THRESHOLD_BYTES,
            event_bus: None,
        }
    }

    pub fn with_threshold(mut self, bytes: u64) -> Self {
        self.threshold_bytes = bytes;
        self
    }

    pub fn with_event_bus(mut self, bus: Arc<EventBus>) -> Self {
        self.event_bus = Some(bus);
        self
    }

    pub fn threshold_bytes(&self) -> u64 {
        self.threshold_bytes
    }

    #[instrument(skip(self))]
    pub async fn on_memory_pressure(&self, level: MemoryPressure) -> Result<TrimOutcome> {
        let available = match self.telemetry.available_bytes().await {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(error = %e, "Free-space query failed, skipping cache trim");
                return Ok(TrimOutcome::TelemetryUnavailable);
            }
        };

        let before = self.cache.total_bytes();
        if available >= self.threshold_bytes || before == 0 {
            debug!(available_bytes = available, cache_bytes = before, "No cache trim needed");
            return Ok(TrimOutcome::Skipped {
                available_bytes: available,
            });
        }

        self.cache.trim_to(before / 2).await?;
        let after = self.cache.total_bytes();
        info!(
            available_bytes = available,
            before_bytes = before,
            after_bytes = after,
            "Trimmed cache under storage pressure"
        );

        if let Some(bus) = &self.event_bus {
            let _ = bus.emit(CoreEvent::Cache(CacheEvent::Trimmed {
                before_bytes: before,
                after_bytes: after,
            }));
        }

        Ok(TrimOutcome::Trimmed {
            before_bytes: before,
            after_bytes: after,
        })
    }
}
