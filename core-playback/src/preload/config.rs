//! Prefetch scheduler configuration

use core_runtime::config::PreloadSettings;

/// Configuration for the adjacent-track prefetch scheduler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreloadConfig {
    /// Bytes fetched for a partial prefetch (default: 30 s at 320 kbps).
    pub partial_bytes: u64,

    /// Fetch the whole next track instead of a partial prefix.
    pub full_next_track: bool,

    /// Byte fetches allowed to run at once (default: 2).
    pub max_concurrent_fetches: usize,
}

impl Default for PreloadConfig {
    fn default() -> Self {
        Self::from_settings(&PreloadSettings::default())
    }
}

impl PreloadConfig {
    pub fn from_settings(settings: &PreloadSettings) -> Self {
        Self {
            partial_bytes: settings.partial_bytes(),
            full_next_track: settings.full_next_track,
            max_concurrent_fetches: 2,
        }
    }

    pub fn with_partial_bytes(mut self, bytes: u64) -> Self {
        self.partial_bytes = bytes;
        self
    }

    pub fn with_full_next_track(mut self, enabled: bool) -> Self {
        self.full_next_track = enabled;
        self
    }

    pub fn with_max_concurrent_fetches(mut self, count: usize) -> Self {
        self.max_concurrent_fetches = count;
        self
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.partial_bytes == 0 {
            return Err("partial_bytes must be greater than 0".to_string());
        }

        if self.max_concurrent_fetches == 0 {
            return Err("max_concurrent_fetches must be at least 1".to_string());
        }

        Ok(())
    }
}
