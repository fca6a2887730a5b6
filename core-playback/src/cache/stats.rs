//! Cache statistics and monitoring

use serde::{Deserialize, Serialize};

/// Snapshot of the disk cache.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CacheStats {
    /// Number of cached resources
    pub entries: usize,

    /// Bytes held across all entries
    pub total_bytes: u64,

    /// Current byte budget
    pub budget_bytes: u64,

    /// Reads fully served from disk
    pub hits: u64,

    /// Reads that needed the network
    pub misses: u64,

    /// Entries removed to respect the budget or a trim
    pub evictions: u64,

    /// Timestamp when stats were calculated (unix millis)
    pub calculated_at: i64,
}

impl CacheStats {
    /// Usage as a percentage of the budget.
    pub fn usage_percentage(&self) -> f64 {
        if self.budget_bytes == 0 {
            return 0.0;
        }

        (self.total_bytes as f64 / self.budget_bytes as f64) * 100.0
    }

    /// Returns true if the cache is near capacity (>90%).
    pub fn is_near_capacity(&self) -> bool {
        self.usage_percentage() > 90.0
    }

    /// Bytes above the budget.
    pub fn space_needed(&self) -> u64 {
        self.total_bytes.saturating_sub(self.budget_bytes)
    }

    /// Hit rate percentage over all reads.
    pub fn hit_rate(&self) -> f64 {
        let reads = self.hits + self.misses;
        if reads == 0 {
            return 0.0;
        }

        (self.hits as f64 / reads as f64) * 100.0
    }

    pub fn total_megabytes(&self) -> f64 {
        self.total_bytes as f64 / (1024.0 * 1024.0)
    }
}
