use crate::{CollectError, Result};
use hostpulse_common::types::clamp_percent;
use nix::errno::Errno;
use nix::sys::statvfs::statvfs;
use std::path::Path;

/// Bytes per sector as reported by `/proc/diskstats`, independent of the
/// device's physical sector size.
pub const SECTOR_SIZE: u64 = 512;

const PHYSICAL_DISK_PREFIXES: [&str; 2] = ["sd", "nvme"];

/// Whether a block device name looks like a SCSI/SATA or NVMe disk.
///
/// Partitions of those disks match too (`sda1`, `nvme0n1p2`); loop, device
/// mapper and other virtual devices do not.
pub fn is_physical_disk(name: &str) -> bool {
    PHYSICAL_DISK_PREFIXES
        .iter()
        .any(|prefix| name.starts_with(prefix))
}

/// Sums `sectors read * 512` over every matching device in `/proc/diskstats`.
///
/// Lines that don't carry a sectors-read column are skipped.
pub fn parse_diskstats_read_bytes(text: &str) -> u64 {
    text.lines()
        .filter_map(|line| {
            let mut fields = line.split_whitespace();
            let name = fields.nth(2)?;
            // reads completed, reads merged, sectors read
            let sectors_read: u64 = fields.nth(2)?.parse().ok()?;
            is_physical_disk(name).then_some(sectors_read)
        })
        .fold(0u64, |acc, sectors| {
            acc.saturating_add(sectors.saturating_mul(SECTOR_SIZE))
        })
}

/// `(total - available) / total * 100`, or `0` for an empty filesystem.
///
/// `available` is space available to unprivileged users, so reserved blocks
/// count as used.
pub fn disk_used_percent(total_bytes: u64, available_bytes: u64) -> f64 {
    if total_bytes == 0 {
        return 0.0;
    }
    let used = total_bytes.saturating_sub(available_bytes);
    clamp_percent(used as f64 / total_bytes as f64 * 100.0)
}

/// Usage of the filesystem holding `mount`, from a single `statvfs` call.
///
/// Only this one filesystem is queried, so tmpfs and network mounts work and
/// an unrelated hung mount cannot stall the read.
pub fn filesystem_usage(mount: &Path) -> Result<f64> {
    let stat = statvfs(mount).map_err(|errno| match errno {
        Errno::ENOENT | Errno::ENOTDIR => CollectError::MountNotFound(mount.display().to_string()),
        other => CollectError::Io {
            path: mount.to_path_buf(),
            source: other.into(),
        },
    })?;

    let frsize = stat.fragment_size() as u64;
    let total = (stat.blocks() as u64).saturating_mul(frsize);
    if total == 0 {
        return Err(CollectError::ZeroCapacity("filesystem"));
    }
    let available = (stat.blocks_available() as u64).saturating_mul(frsize);
    Ok(disk_used_percent(total, available))
}
