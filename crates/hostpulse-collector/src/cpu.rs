use crate::{CollectError, Result};
use hostpulse_common::types::{clamp_percent, CpuSnapshot};

const SOURCE: &str = "/proc/stat";

/// Parses the aggregate `cpu` line at the top of `/proc/stat`.
///
/// Only the first seven counters (user through softirq) are read; kernels
/// that expose steal/guest columns have them ignored.
pub fn parse_cpu_snapshot(stat: &str) -> Result<CpuSnapshot> {
    let line = stat
        .lines()
        .next()
        .ok_or_else(|| CollectError::malformed(SOURCE, "empty file"))?;

    let mut fields = line.split_whitespace();
    match fields.next() {
        Some("cpu") => {}
        Some(label) => {
            return Err(CollectError::malformed(
                SOURCE,
                format!("expected aggregate cpu line, found '{label}'"),
            ))
        }
        None => return Err(CollectError::malformed(SOURCE, "blank first line")),
    }

    let mut counters = [0u64; 7];
    for (i, slot) in counters.iter_mut().enumerate() {
        let raw = fields.next().ok_or_else(|| {
            CollectError::malformed(SOURCE, format!("expected 7 counters, found {i}"))
        })?;
        *slot = raw
            .parse()
            .map_err(|e| CollectError::malformed(SOURCE, format!("counter {i} '{raw}': {e}")))?;
    }

    let [user, nice, system, idle, iowait, irq, softirq] = counters;
    Ok(CpuSnapshot {
        user,
        nice,
        system,
        idle,
        iowait,
        irq,
        softirq,
    })
}

/// Busy percentage over the interval between two snapshots.
///
/// Returns `0` when no ticks elapsed. Counters that went backwards (a zeroed
/// snapshot from a failed read, or a reset) contribute no time rather than
/// wrapping.
pub fn cpu_utilization(prev: &CpuSnapshot, curr: &CpuSnapshot) -> f64 {
    let total_delta = curr.total().saturating_sub(prev.total());
    if total_delta == 0 {
        return 0.0;
    }
    let idle_delta = curr.idle_total().saturating_sub(prev.idle_total());
    let busy_delta = total_delta.saturating_sub(idle_delta);
    clamp_percent(busy_delta as f64 / total_delta as f64 * 100.0)
}
