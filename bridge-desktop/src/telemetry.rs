//! Storage telemetry backed by `sysinfo`.

use async_trait::async_trait;
use bridge_traits::{
    error::{BridgeError, Result},
    storage::StorageTelemetry,
};
use std::path::{Path, PathBuf};
use sysinfo::Disks;
use tracing::debug;

/// Reports free space of the volume that holds a given directory.
///
/// The volume is the mounted disk with the longest mount point that prefixes
/// the directory. Disk enumeration is blocking and runs on the blocking pool.
pub struct SysinfoStorageTelemetry {
    path: PathBuf,
}

#[derive(Debug, Clone, Copy)]
struct VolumeSpace {
    available: u64,
    total: u64,
}

impl SysinfoStorageTelemetry {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn volume_for(path: &Path) -> Option<VolumeSpace> {
        let disks = Disks::new_with_refreshed_list();
        disks
            .list()
            .iter()
            .filter(|disk| path.starts_with(disk.mount_point()))
            .max_by_key(|disk| disk.mount_point().as_os_str().len())
            .map(|disk| VolumeSpace {
                available: disk.available_space(),
                total: disk.total_space(),
            })
    }

    async fn query(&self) -> Result<VolumeSpace> {
        let path = self.path.clone();
        let space = tokio::task::spawn_blocking(move || Self::volume_for(&path))
            .await
            .map_err(|e| BridgeError::OperationFailed(format!("disk query panicked: {}", e)))?;

        space.ok_or_else(|| {
            BridgeError::NotAvailable(format!("no volume found for {}", self.path.display()))
        })
    }
}

#[async_trait]
impl StorageTelemetry for SysinfoStorageTelemetry {
    async fn available_bytes(&self) -> Result<u64> {
        let space = self.query().await?;
        debug!(path = ?self.path, available = space.available, "Queried free space");
        Ok(space.available)
    }

    async fn total_bytes(&self) -> Result<Option<u64>> {
        Ok(Some(self.query().await?.total))
    }
}
