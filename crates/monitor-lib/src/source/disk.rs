//! Mounted filesystem capacity via sysinfo

use crate::error::SourceError;
use crate::models::DiskSample;
use sysinfo::Disks;

/// Enumerate mounted filesystems and their capacity
///
/// sysinfo reads the mount table and calls statvfs synchronously, so this runs
/// on the blocking pool.
pub async fn sample_disks() -> Result<Vec<DiskSample>, SourceError> {
    tokio::task::spawn_blocking(read_disks)
        .await
        .map_err(|e| SourceError::Task(format!("disk enumeration: {}", e)))
}

fn read_disks() -> Vec<DiskSample> {
    let disks = Disks::new_with_refreshed_list();

    let mut samples: Vec<DiskSample> = disks
        .list()
        .iter()
        .map(|disk| DiskSample {
            mount: disk.mount_point().to_string_lossy().to_string(),
            total_bytes: disk.total_space(),
            free_bytes: disk.available_space(),
        })
        .collect();

    samples.sort_by(|a, b| a.mount.cmp(&b.mount));
    samples.dedup_by(|a, b| a.mount == b.mount);
    samples
}
