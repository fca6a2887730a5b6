//! # Core Configuration Module
//!
//! Configuration for the preload and playback-caching pipeline.
//!
//! ## Overview
//!
//! A builder assembles a [`CoreConfig`] holding the host bridges and the
//! pipeline's tunables. `build()` is fail-fast: missing capabilities and
//! out-of-range values are reported before anything is constructed.
//!
//! ## Required Dependencies
//!
//! - cache directory
//! - `HttpClient`, `FileSystemAccess`, `StorageTelemetry`. With the
//!   `desktop-shims` feature, desktop implementations are injected when
//!   they are not provided; without it a missing bridge is a
//!   [`Error::CapabilityMissing`].
//!
//! ## Optional Dependencies
//!
//! - `SystemSignalSource` - memory pressure / audio-route notifications
//! - `SourcePreparer` - prepare-without-fetch hook used for distant neighbours
//! - `Clock` - defaults to the system clock
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::{CoreConfig, PreloadSettings};
//! use std::sync::Arc;
//!
//! let config = CoreConfig::builder()
//!     .cache_dir("/data/user/0/app/cache/media")
//!     .http_client(Arc::new(MyHttpClient))
//!     .file_system(Arc::new(MyFileSystem))
//!     .storage_telemetry(Arc::new(MyStatFs))
//!     .preload(PreloadSettings::default().with_full_next_track(true))
//!     .build()?;
//! ```

use crate::error::{Error, Result};
use bridge_traits::{
    playback::SourcePreparer,
    storage::{FileSystemAccess, StorageTelemetry},
    system::SystemSignalSource,
    time::{Clock, SystemClock},
    HttpClient,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

const MIB: u64 = 1024 * 1024;
const GIB: u64 = 1024 * MIB;

/// Default trim threshold: trimming only happens below 1 GiB of free space.
pub const DEFAULT_LOW_STORAGE_THRESHOLD_BYTES: u64 = GIB;

/// Default position poll interval while playing.
pub const DEFAULT_POSITION_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Default connect and read timeout for media fetches.
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(15);

// ============================================================================
// Settings
// ============================================================================

/// Parameters of the storage budget policy.
///
/// `budget = clamp(free_space * percentage, min_bytes, max_bytes)`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CacheBudgetSettings {
    pub percentage: f64,
    pub min_bytes: u64,
    pub max_bytes: u64,
}

impl Default for CacheBudgetSettings {
    fn default() -> Self {
        Self {
            percentage: 0.03,
            min_bytes: 50 * MIB,
            max_bytes: 500 * MIB,
        }
    }
}

impl CacheBudgetSettings {
    pub fn validate(&self) -> std::result::Result<(), String> {
        if !(self.percentage > 0.0 && self.percentage <= 1.0) {
            return Err(format!(
                "budget percentage must be in (0, 1], got {}",
                self.percentage
            ));
        }
        if self.min_bytes == 0 {
            return Err("minimum cache budget must be greater than 0".to_string());
        }
        if self.min_bytes > self.max_bytes {
            return Err(format!(
                "minimum cache budget ({}) exceeds maximum ({})",
                self.min_bytes, self.max_bytes
            ));
        }
        Ok(())
    }
}

/// Adjacent-track preload tunables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PreloadSettings {
    /// Playback duration covered by a partial prefetch.
    pub window: Duration,
    /// Bitrate used to turn `window` into a byte count.
    pub assumed_bitrate_kbps: u32,
    /// Fetch the whole next track instead of the partial window.
    pub full_next_track: bool,
}

impl Default for PreloadSettings {
    fn default() -> Self {
        Self {
            window: Duration::from_secs(30),
            assumed_bitrate_kbps: 320,
            full_next_track: false,
        }
    }
}

impl PreloadSettings {
    pub fn with_window(mut self, window: Duration) -> Self {
        self.window = window;
        self
    }

    pub fn with_assumed_bitrate_kbps(mut self, kbps: u32) -> Self {
        self.assumed_bitrate_kbps = kbps;
        self
    }

    pub fn with_full_next_track(mut self, enabled: bool) -> Self {
        self.full_next_track = enabled;
        self
    }

    /// Byte estimate for a partial prefetch: `seconds * kbps * 1000 / 8`.
    pub fn partial_bytes(&self) -> u64 {
        self.window.as_secs() * u64::from(self.assumed_bitrate_kbps) * 1000 / 8
    }

    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.window.is_zero() {
            return Err("preload window must be greater than 0".to_string());
        }
        if self.assumed_bitrate_kbps == 0 {
            return Err("assumed bitrate must be greater than 0".to_string());
        }
        Ok(())
    }
}

// ============================================================================
// CoreConfig
// ============================================================================

/// Fully resolved pipeline configuration.
#[derive(Clone)]
pub struct CoreConfig {
    /// Root directory of the disk cache
    pub cache_dir: PathBuf,
    pub http_client: Arc<dyn HttpClient>,
    pub file_system: Arc<dyn FileSystemAccess>,
    pub storage_telemetry: Arc<dyn StorageTelemetry>,
    pub system_signals: Option<Arc<dyn SystemSignalSource>>,
    pub source_preparer: Option<Arc<dyn SourcePreparer>>,
    pub clock: Arc<dyn Clock>,
    pub cache_budget: CacheBudgetSettings,
    pub preload: PreloadSettings,
    /// Free-space level below which a memory-pressure signal trims the cache
    pub low_storage_trim_threshold_bytes: u64,
    pub position_poll_interval: Duration,
    pub http_timeout: Duration,
    pub event_buffer_size: usize,
}

impl std::fmt::Debug for CoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoreConfig")
            .field("cache_dir", &self.cache_dir)
            .field("system_signals", &self.system_signals.is_some())
            .field("source_preparer", &self.source_preparer.is_some())
            .field("cache_budget", &self.cache_budget)
            .field("preload", &self.preload)
            .field(
                "low_storage_trim_threshold_bytes",
                &self.low_storage_trim_threshold_bytes,
            )
            .field("position_poll_interval", &self.position_poll_interval)
            .field("http_timeout", &self.http_timeout)
            .finish()
    }
}

impl CoreConfig {
    pub fn builder() -> CoreConfigBuilder {
        CoreConfigBuilder::default()
    }

    /// Validates the configuration and returns an error if invalid.
    pub fn validate(&self) -> Result<()> {
        if self.cache_dir.as_os_str().is_empty() {
            return Err(Error::Config("Cache directory cannot be empty".to_string()));
        }

        self.cache_budget.validate().map_err(Error::Config)?;
        self.preload.validate().map_err(Error::Config)?;

        if self.position_poll_interval.is_zero() {
            return Err(Error::Config(
                "Position poll interval must be greater than 0".to_string(),
            ));
        }

        if self.http_timeout.is_zero() {
            return Err(Error::Config("HTTP timeout must be greater than 0".to_string()));
        }

        if self.event_buffer_size == 0 {
            return Err(Error::Config(
                "Event buffer size must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

// ============================================================================
// Desktop defaults
// ============================================================================

#[cfg(not(feature = "desktop-shims"))]
fn missing(capability: &str, purpose: &str) -> Error {
    Error::CapabilityMissing {
        capability: capability.to_string(),
        message: format!(
            "{} implementation is required for {}. \
             Desktop: enable the 'desktop-shims' feature to use the default. \
             Mobile: inject the platform-native implementation.",
            capability, purpose
        ),
    }
}

#[cfg(feature = "desktop-shims")]
fn provide_default_http_client(timeout: Duration) -> Result<Arc<dyn HttpClient>> {
    let client = bridge_desktop::ReqwestHttpClient::with_timeout(timeout)
        .map_err(|e| Error::Internal(format!("Failed to create default HttpClient: {}", e)))?;
    Ok(Arc::new(client))
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_http_client(_timeout: Duration) -> Result<Arc<dyn HttpClient>> {
    Err(missing("HttpClient", "fetching media ranges"))
}

#[cfg(feature = "desktop-shims")]
fn provide_default_file_system(cache_dir: &std::path::Path) -> Result<Arc<dyn FileSystemAccess>> {
    Ok(Arc::new(bridge_desktop::TokioFileSystem::with_cache_directory(
        cache_dir.to_path_buf(),
    )))
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_file_system(_cache_dir: &std::path::Path) -> Result<Arc<dyn FileSystemAccess>> {
    Err(missing("FileSystemAccess", "the disk cache"))
}

#[cfg(feature = "desktop-shims")]
fn provide_default_storage_telemetry(
    cache_dir: &std::path::Path,
) -> Result<Arc<dyn StorageTelemetry>> {
    Ok(Arc::new(bridge_desktop::SysinfoStorageTelemetry::new(
        cache_dir,
    )))
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_storage_telemetry(
    _cache_dir: &std::path::Path,
) -> Result<Arc<dyn StorageTelemetry>> {
    Err(missing("StorageTelemetry", "sizing the cache budget"))
}

// ============================================================================
// Builder
// ============================================================================

/// Builder for constructing [`CoreConfig`] instances.
#[derive(Default)]
pub struct CoreConfigBuilder {
    cache_dir: Option<PathBuf>,
    http_client: Option<Arc<dyn HttpClient>>,
    file_system: Option<Arc<dyn FileSystemAccess>>,
    storage_telemetry: Option<Arc<dyn StorageTelemetry>>,
    system_signals: Option<Arc<dyn SystemSignalSource>>,
    source_preparer: Option<Arc<dyn SourcePreparer>>,
    clock: Option<Arc<dyn Clock>>,
    cache_budget: Option<CacheBudgetSettings>,
    preload: Option<PreloadSettings>,
    low_storage_trim_threshold_bytes: Option<u64>,
    position_poll_interval: Option<Duration>,
    http_timeout: Option<Duration>,
    event_buffer_size: Option<usize>,
}

impl CoreConfigBuilder {
    pub fn cache_dir<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.cache_dir = Some(path.into());
        self
    }

    pub fn http_client(mut self, client: Arc<dyn HttpClient>) -> Self {
        self.http_client = Some(client);
        self
    }

    pub fn file_system(mut self, fs: Arc<dyn FileSystemAccess>) -> Self {
        self.file_system = Some(fs);
        self
    }

    pub fn storage_telemetry(mut self, telemetry: Arc<dyn StorageTelemetry>) -> Self {
        self.storage_telemetry = Some(telemetry);
        self
    }

    pub fn system_signals(mut self, source: Arc<dyn SystemSignalSource>) -> Self {
        self.system_signals = Some(source);
        self
    }

    pub fn source_preparer(mut self, preparer: Arc<dyn SourcePreparer>) -> Self {
        self.source_preparer = Some(preparer);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn cache_budget(mut self, settings: CacheBudgetSettings) -> Self {
        self.cache_budget = Some(settings);
        self
    }

    pub fn preload(mut self, settings: PreloadSettings) -> Self {
        self.preload = Some(settings);
        self
    }

    pub fn low_storage_trim_threshold_bytes(mut self, bytes: u64) -> Self {
        self.low_storage_trim_threshold_bytes = Some(bytes);
        self
    }

    pub fn position_poll_interval(mut self, interval: Duration) -> Self {
        self.position_poll_interval = Some(interval);
        self
    }

    pub fn http_timeout(mut self, timeout: Duration) -> Self {
        self.http_timeout = Some(timeout);
        self
    }

    pub fn event_buffer_size(mut self, size: usize) -> Self {
        self.event_buffer_size = Some(size);
        self
    }

    /// Builds the final `CoreConfig`, injecting platform defaults where
    /// allowed and validating the result.
    pub fn build(self) -> Result<CoreConfig> {
        let cache_dir = self.cache_dir.ok_or_else(|| {
            Error::Config("Cache directory is required. Use .cache_dir() to set it.".to_string())
        })?;

        let http_timeout = self.http_timeout.unwrap_or(DEFAULT_HTTP_TIMEOUT);

        let http_client = match self.http_client {
            Some(client) => client,
            None => provide_default_http_client(http_timeout)?,
        };

        let file_system = match self.file_system {
            Some(fs) => fs,
            None => provide_default_file_system(&cache_dir)?,
        };

        let storage_telemetry = match self.storage_telemetry {
            Some(telemetry) => telemetry,
            None => provide_default_storage_telemetry(&cache_dir)?,
        };

        let config = CoreConfig {
            cache_dir,
            http_client,
            file_system,
            storage_telemetry,
            system_signals: self.system_signals,
            source_preparer: self.source_preparer,
            clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
            cache_budget: self.cache_budget.unwrap_or_default(),
            preload: self.preload.unwrap_or_default(),
            low_storage_trim_threshold_bytes: self
                .low_storage_trim_threshold_bytes
                .unwrap_or(DEFAULT_LOW_STORAGE_THRESHOLD_BYTES),
            position_poll_interval: self
                .position_poll_interval
                .unwrap_or(DEFAULT_POSITION_POLL_INTERVAL),
            http_timeout,
            event_buffer_size: self
                .event_buffer_size
                .unwrap_or(crate::events::DEFAULT_EVENT_BUFFER_SIZE),
        };

        config.validate()?;

        Ok(config)
    }
}
