//! Storage and File System Abstractions
//!
//! Provides platform-agnostic traits for the file I/O the disk cache needs and
//! for the device free-space telemetry that sizes it.

use async_trait::async_trait;
use bytes::Bytes;
use std::path::{Path, PathBuf};

use crate::error::Result;

/// File metadata information
#[derive(Debug, Clone)]
pub struct FileMetadata {
    pub size: u64,
    pub modified_at: Option<i64>,
    pub is_directory: bool,
}

/// File system access trait
///
/// Abstracts file I/O so the cache can run against a sandboxed app directory
/// on mobile, a regular directory on desktop, or an in-memory fake in tests.
///
/// Implementations must make [`rename`](FileSystemAccess::rename) atomic when
/// source and destination share a directory; the cache relies on it to
/// publish segments without readers ever observing a partially written file.
///
/// # Example
///
/// ```ignore
/// use bridge_traits::storage::FileSystemAccess;
///
/// async fn publish(fs: &dyn FileSystemAccess, dir: &Path, data: Bytes) -> Result<()> {
///     let tmp = dir.join("0.seg.tmp");
///     fs.write_file(&tmp, data).await?;
///     fs.rename(&tmp, &dir.join("0.seg")).await
/// }
/// ```
#[async_trait]
pub trait FileSystemAccess: Send + Sync {
    /// Get the application's cache directory
    ///
    /// This directory is suitable for files that can be deleted by the
    /// system when storage is low.
    async fn get_cache_directory(&self) -> Result<PathBuf>;

    /// Check if a file or directory exists
    async fn exists(&self, path: &Path) -> Result<bool>;

    /// Get metadata for a file or directory
    async fn metadata(&self, path: &Path) -> Result<FileMetadata>;

    /// Create a directory and all parent directories if they don't exist
    async fn create_dir_all(&self, path: &Path) -> Result<()>;

    /// Read entire file contents into memory
    async fn read_file(&self, path: &Path) -> Result<Bytes>;

    /// Read `length` bytes starting at `offset`.
    ///
    /// Fails when the file is shorter than `offset + length`.
    async fn read_range(&self, path: &Path, offset: u64, length: u64) -> Result<Bytes>;

    /// Write data to a file, creating or truncating it
    async fn write_file(&self, path: &Path, data: Bytes) -> Result<()>;

    /// Atomically move `from` to `to`, replacing `to` if it exists
    async fn rename(&self, from: &Path, to: &Path) -> Result<()>;

    /// Delete a file
    async fn delete_file(&self, path: &Path) -> Result<()>;

    /// Delete a directory and all its contents
    async fn delete_dir_all(&self, path: &Path) -> Result<()>;

    /// List all entries in a directory
    async fn list_directory(&self, path: &Path) -> Result<Vec<PathBuf>>;

    /// Calculate total size of a directory recursively
    async fn directory_size(&self, path: &Path) -> Result<u64> {
        let mut total = 0u64;
        let entries = self.list_directory(path).await?;

        for entry in entries {
            let metadata = self.metadata(&entry).await?;
            if metadata.is_directory {
                total += self.directory_size(&entry).await?;
            } else {
                total += metadata.size;
            }
        }

        Ok(total)
    }
}

/// Device storage telemetry.
///
/// - **Android**: `StatFs(cacheDir).availableBytes`
/// - **iOS**: `volumeAvailableCapacityForImportantUsage`
/// - **Desktop**: free space of the volume that holds the cache directory
///
/// Callers treat an error as "telemetry unavailable" and fall back to a
/// conservative default rather than failing.
#[async_trait]
pub trait StorageTelemetry: Send + Sync {
    /// Bytes currently available to the application on the cache volume.
    async fn available_bytes(&self) -> Result<u64>;

    /// Total capacity of the cache volume, when the platform exposes it.
    async fn total_bytes(&self) -> Result<Option<u64>> {
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockall::mock;

    mock! {
        Telemetry {}

        #[async_trait]
        impl StorageTelemetry for Telemetry {
            async fn available_bytes(&self) -> Result<u64>;
        }
    }

    #[test]
    fn test_file_metadata() {
        let meta = FileMetadata {
            size: 1024,
            modified_at: Some(1_700_000_000),
            is_directory: false,
        };

        assert_eq!(meta.size, 1024);
        assert!(!meta.is_directory);
    }

    #[tokio::test]
    async fn test_total_bytes_defaults_to_unknown() {
        let mut telemetry = MockTelemetry::new();
        telemetry.expect_available_bytes().returning(|| Ok(4096));

        assert_eq!(telemetry.available_bytes().await.unwrap(), 4096);
        assert_eq!(telemetry.total_bytes().await.unwrap(), None);
    }
}
