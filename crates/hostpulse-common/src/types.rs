use serde::{Deserialize, Serialize};

/// One sample of the aggregate `cpu` line, in USER_HZ ticks since boot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CpuSnapshot {
    pub user: u64,
    pub nice: u64,
    pub system: u64,
    pub idle: u64,
    pub iowait: u64,
    pub irq: u64,
    pub softirq: u64,
}

impl CpuSnapshot {
    /// Sum of all seven time-in-state counters.
    pub fn total(&self) -> u64 {
        self.user
            .saturating_add(self.nice)
            .saturating_add(self.system)
            .saturating_add(self.idle)
            .saturating_add(self.iowait)
            .saturating_add(self.irq)
            .saturating_add(self.softirq)
    }

    /// Time not spent doing work: `idle + iowait`.
    pub fn idle_total(&self) -> u64 {
        self.idle.saturating_add(self.iowait)
    }
}

/// The payload posted to the collection endpoint once per cycle.
///
/// Field names and types are the wire contract; do not rename.
///
/// # Examples
///
/// ```
/// use hostpulse_common::types::MetricsRecord;
///
/// let record = MetricsRecord {
///     hostname: "web-1".to_string(),
///     timestamp: 1_700_000_000_000_000_000,
///     cpu_usage: 12.5,
///     memory_usage: 40.0,
///     disk_usage: 71.25,
///     disk_io_read: 4096,
/// };
/// assert_eq!(record.summary(), "CPU=12.50% Memory=40.00% Disk=71.25%");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsRecord {
    pub hostname: String,
    /// Capture instant, nanoseconds since the Unix epoch.
    pub timestamp: i64,
    pub cpu_usage: f64,
    pub memory_usage: f64,
    pub disk_usage: f64,
    /// Cumulative bytes read since boot across physical disks.
    pub disk_io_read: u64,
}

impl MetricsRecord {
    /// One-line human-readable summary of the three percentages.
    pub fn summary(&self) -> String {
        format!(
            "CPU={:.2}% Memory={:.2}% Disk={:.2}%",
            self.cpu_usage, self.memory_usage, self.disk_usage
        )
    }
}

/// Whether each metric in a record came from a successful read.
///
/// A metric whose source could not be read is reported as `0` on the wire;
/// the matching flag here is `false` so a zero from a failed read can be told
/// apart from a genuinely idle resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadingValidity {
    pub cpu: bool,
    pub memory: bool,
    pub disk: bool,
    pub disk_io: bool,
}

impl ReadingValidity {
    pub fn all_valid(&self) -> bool {
        self.cpu && self.memory && self.disk && self.disk_io
    }

    /// Names of the metrics that fell back to zero.
    pub fn invalid_metrics(&self) -> Vec<&'static str> {
        [
            ("cpu_usage", self.cpu),
            ("memory_usage", self.memory),
            ("disk_usage", self.disk),
            ("disk_io_read", self.disk_io),
        ]
        .into_iter()
        .filter(|(_, valid)| !valid)
        .map(|(name, _)| name)
        .collect()
    }
}

impl Default for ReadingValidity {
    fn default() -> Self {
        Self {
            cpu: true,
            memory: true,
            disk: true,
            disk_io: true,
        }
    }
}

/// Clamp a percentage into `[0, 100]`, mapping NaN to `0`.
pub fn clamp_percent(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 100.0)
    }
}
