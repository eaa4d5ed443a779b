use crate::cpu::parse_cpu_snapshot;
use crate::disk::{filesystem_usage, parse_diskstats_read_bytes};
use crate::memory::parse_meminfo;
use crate::{CollectError, CounterReader, Result};
use hostpulse_common::types::CpuSnapshot;
use std::path::PathBuf;

pub const DEFAULT_PROC_ROOT: &str = "/proc";
pub const DEFAULT_DISK_MOUNT: &str = "/";

/// Reads live counters from procfs and the mounted filesystem table.
#[derive(Debug, Clone)]
pub struct ProcCounterReader {
    proc_root: PathBuf,
    disk_mount: PathBuf,
}

impl ProcCounterReader {
    pub fn new(proc_root: impl Into<PathBuf>, disk_mount: impl Into<PathBuf>) -> Self {
        Self {
            proc_root: proc_root.into(),
            disk_mount: disk_mount.into(),
        }
    }

    fn read_proc_file(&self, name: &str) -> Result<String> {
        let path = self.proc_root.join(name);
        std::fs::read_to_string(&path).map_err(|source| CollectError::Io { path, source })
    }
}

impl Default for ProcCounterReader {
    fn default() -> Self {
        Self::new(DEFAULT_PROC_ROOT, DEFAULT_DISK_MOUNT)
    }
}

impl CounterReader for ProcCounterReader {
    fn read_cpu_snapshot(&self) -> Result<CpuSnapshot> {
        parse_cpu_snapshot(&self.read_proc_file("stat")?)
    }

    fn read_memory_usage(&self) -> Result<f64> {
        let info = parse_meminfo(&self.read_proc_file("meminfo")?)?;
        if info.total_kb == 0 {
            return Err(CollectError::ZeroCapacity("MemTotal"));
        }
        Ok(info.used_percent())
    }

    fn read_disk_usage(&self) -> Result<f64> {
        filesystem_usage(&self.disk_mount)
    }

    fn read_disk_io_bytes(&self) -> Result<u64> {
        Ok(parse_diskstats_read_bytes(
            &self.read_proc_file("diskstats")?,
        ))
    }
}
