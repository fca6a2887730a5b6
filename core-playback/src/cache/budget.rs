//! Disk cache budget derived from free storage.

use bridge_traits::storage::StorageTelemetry;
use core_runtime::config::CacheBudgetSettings;
use tracing::{debug, warn};

/// Budget policy: `clamp(free * percentage, min, max)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CacheBudgetPolicy {
    pub percentage: f64,
    pub min_bytes: u64,
    pub max_bytes: u64,
}

impl Default for CacheBudgetPolicy {
    fn default() -> Self {
        CacheBudgetSettings::default().into()
    }
}

impl From<CacheBudgetSettings> for CacheBudgetPolicy {
    fn from(settings: CacheBudgetSettings) -> Self {
        Self {
            percentage: settings.percentage,
            min_bytes: settings.min_bytes,
            max_bytes: settings.max_bytes,
        }
    }
}

impl CacheBudgetPolicy {
    /// Budget for `free_bytes` of available storage. Unknown free space
    /// yields the minimum.
    pub fn compute(&self, free_bytes: Option<u64>) -> u64 {
        match free_bytes {
            Some(free) => {
                let scaled = (free as f64 * self.percentage) as u64;
                scaled.clamp(self.min_bytes, self.max_bytes)
            }
            None => self.min_bytes,
        }
    }

    /// Query telemetry once and compute the budget. A telemetry failure is
    /// logged and falls back to the minimum.
    pub async fn resolve(&self, telemetry: &dyn StorageTelemetry) -> u64 {
        let free = match telemetry.available_bytes().await {
            Ok(free) => Some(free),
            Err(e) => {
                warn!(error = %e, "Free-space query failed, using minimum cache budget");
                None
            }
        };
        let budget = self.compute(free);
        debug!(free_bytes = ?free, budget_bytes = budget, "Resolved cache budget");
        budget
    }
}

/// Budget for `free_bytes` under the default policy.
pub fn compute_budget(free_bytes: u64) -> u64 {
    CacheBudgetPolicy::default().compute(Some(free_bytes))
}
