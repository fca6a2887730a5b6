//! Cache configuration

use std::time::Duration;

use core_runtime::config::{CoreConfig, DEFAULT_HTTP_TIMEOUT};

/// Read size for network fills (128 KiB).
pub const DEFAULT_CHUNK_SIZE: usize = 128 * 1024;

/// Configuration for the on-disk media cache.
#[derive(Debug, Clone)]
pub struct DiskCacheConfig {
    /// Byte budget; least-recently-used entries are evicted above it.
    pub budget_bytes: u64,

    /// Directory name under the cache root (default: "media").
    pub directory_name: String,
}

impl Default for DiskCacheConfig {
    fn default() -> Self {
        Self {
            budget_bytes: 50 * 1024 * 1024,
            directory_name: "media".to_string(),
        }
    }
}

impl DiskCacheConfig {
    pub fn new(budget_bytes: u64) -> Self {
        Self {
            budget_bytes,
            ..Self::default()
        }
    }

    pub fn with_directory_name(mut self, name: impl Into<String>) -> Self {
        self.directory_name = name.into();
        self
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.budget_bytes == 0 {
            return Err("budget_bytes must be greater than 0".to_string());
        }

        if self.directory_name.is_empty() {
            return Err("directory_name cannot be empty".to_string());
        }

        Ok(())
    }
}

/// Configuration for the cache-backed network data source.
#[derive(Debug, Clone)]
pub struct DataSourceConfig {
    /// Bytes read from the network per cache write.
    pub chunk_size: usize,

    /// Connect and read timeout for upstream requests.
    pub timeout: Duration,

    /// Serve from the network when the cache cannot be read or written.
    pub ignore_cache_on_error: bool,
}

impl Default for DataSourceConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            timeout: DEFAULT_HTTP_TIMEOUT,
            ignore_cache_on_error: true,
        }
    }
}

impl DataSourceConfig {
    pub fn from_core(config: &CoreConfig) -> Self {
        Self {
            timeout: config.http_timeout,
            ..Self::default()
        }
    }

    pub fn with_chunk_size(mut self, bytes: usize) -> Self {
        self.chunk_size = bytes;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_ignore_cache_on_error(mut self, enabled: bool) -> Self {
        self.ignore_cache_on_error = enabled;
        self
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.chunk_size == 0 {
            return Err("chunk_size must be greater than 0".to_string());
        }

        if self.timeout.is_zero() {
            return Err("timeout must be greater than 0".to_string());
        }

        Ok(())
    }
}
