//! Host counter sampling for the hostpulse agent.
//!
//! A [`CounterReader`] turns the kernel's cumulative counters into typed
//! snapshots without keeping state between calls. The [`engine::SamplingEngine`]
//! holds the one piece of state the agent needs, the previous CPU snapshot,
//! and derives a [`MetricsRecord`](hostpulse_common::types::MetricsRecord)
//! from each round of reads.

pub mod cpu;
pub mod disk;
pub mod engine;
pub mod memory;
pub mod reader;


use hostpulse_common::types::CpuSnapshot;
use std::path::PathBuf;

/// Errors raised while reading or parsing a counter source.
///
/// The sampling engine never propagates these; it logs them and reports the
/// affected metric as zero.
#[derive(Debug, thiserror::Error)]
pub enum CollectError {
    /// The counter source could not be opened or read.
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The source was read but its contents did not match the expected layout.
    #[error("malformed {source_name}: {reason}")]
    Malformed {
        source_name: &'static str,
        reason: String,
    },

    /// The configured mount point does not exist.
    #[error("mount point {0} does not exist")]
    MountNotFound(String),

    /// The source reported a zero capacity, so no percentage exists.
    #[error("{0} reported zero capacity")]
    ZeroCapacity(&'static str),
}

impl CollectError {
    pub(crate) fn malformed(source_name: &'static str, reason: impl Into<String>) -> Self {
        Self::Malformed {
            source_name,
            reason: reason.into(),
        }
    }
}

/// Convenience `Result` alias for counter reads.
pub type Result<T> = std::result::Result<T, CollectError>;

/// Stateless access to the host's resource counters.
///
/// The live implementation is [`reader::ProcCounterReader`]. Every call
/// produces a fresh reading; implementations must not cache between calls.
/// The trait requires `Send + Sync` so an engine can move onto the
/// dispatcher task.
pub trait CounterReader: Send + Sync {
    /// Reads the aggregate CPU time-in-state counters.
    fn read_cpu_snapshot(&self) -> Result<CpuSnapshot>;

    /// Returns memory in use as a percentage of installed memory.
    fn read_memory_usage(&self) -> Result<f64>;

    /// Returns space in use on the reported filesystem as a percentage.
    fn read_disk_usage(&self) -> Result<f64>;

    /// Returns cumulative bytes read since boot across physical disks.
    fn read_disk_io_bytes(&self) -> Result<u64>;
}
