use crate::cpu::cpu_utilization;
use crate::{CounterReader, Result};
use chrono::Utc;
use hostpulse_common::types::{clamp_percent, CpuSnapshot, MetricsRecord, ReadingValidity};

/// One cycle's output: the wire record plus which of its readings are real.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub record: MetricsRecord,
    pub validity: ReadingValidity,
}

/// Turns cumulative counters into a [`MetricsRecord`] per call.
///
/// The engine retains exactly one previous CPU snapshot. CPU utilization is
/// the busy share of ticks between that snapshot and the one read by the
/// current call, so the percentage only means "utilization over the last
/// interval" when calls happen on a fixed cadence. Construction takes a
/// priming read; the first call after it reports utilization since
/// construction.
///
/// Every reading degrades to zero on failure instead of failing the cycle.
/// [`Sample::validity`] records which readings fell back.
pub struct SamplingEngine<R> {
    reader: R,
    hostname: String,
    prev_cpu: CpuSnapshot,
}

impl<R: CounterReader> SamplingEngine<R> {
    pub fn new(reader: R, hostname: impl Into<String>) -> Self {
        let prev_cpu = match reader.read_cpu_snapshot() {
            Ok(snapshot) => snapshot,
            Err(e) => {
                tracing::warn!(error = %e, "Priming CPU read failed, starting from zero baseline");
                CpuSnapshot::default()
            }
        };
        Self {
            reader,
            hostname: hostname.into(),
            prev_cpu,
        }
    }

    /// The snapshot the next utilization call will diff against.
    pub fn previous_snapshot(&self) -> &CpuSnapshot {
        &self.prev_cpu
    }

    /// Reads a new CPU snapshot and returns utilization since the previous one.
    ///
    /// The new snapshot replaces the retained one as the last step, even when
    /// the read failed and a zero snapshot stands in for it.
    pub fn compute_cpu_utilization(&mut self) -> (f64, bool) {
        let (curr, valid) = degrade("cpu_usage", self.reader.read_cpu_snapshot());
        let usage = if valid {
            cpu_utilization(&self.prev_cpu, &curr)
        } else {
            0.0
        };
        self.prev_cpu = curr;
        (usage, valid)
    }

    /// Takes every reading once and stamps the result with the current time.
    pub fn sample(&mut self) -> Sample {
        let (cpu_usage, cpu_valid) = self.compute_cpu_utilization();
        let (memory_usage, memory_valid) =
            degrade("memory_usage", self.reader.read_memory_usage());
        let (disk_usage, disk_valid) = degrade("disk_usage", self.reader.read_disk_usage());
        let (disk_io_read, disk_io_valid) =
            degrade("disk_io_read", self.reader.read_disk_io_bytes());

        let timestamp = Utc::now().timestamp_nanos_opt().unwrap_or_default();

        Sample {
            record: MetricsRecord {
                hostname: self.hostname.clone(),
                timestamp,
                cpu_usage,
                memory_usage: clamp_percent(memory_usage),
                disk_usage: clamp_percent(disk_usage),
                disk_io_read,
            },
            validity: ReadingValidity {
                cpu: cpu_valid,
                memory: memory_valid,
                disk: disk_valid,
                disk_io: disk_io_valid,
            },
        }
    }

    pub fn build_record(&mut self) -> MetricsRecord {
        self.sample().record
    }
}

fn degrade<T: Default>(metric: &'static str, reading: Result<T>) -> (T, bool) {
    match reading {
        Ok(value) => (value, true),
        Err(e) => {
            tracing::warn!(metric, error = %e, "Counter read failed, reporting zero");
            (T::default(), false)
        }
    }
}
