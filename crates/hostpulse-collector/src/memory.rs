use crate::{CollectError, Result};
use hostpulse_common::types::clamp_percent;

const SOURCE: &str = "/proc/meminfo";

/// The two `/proc/meminfo` fields the agent reports on, in kB.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MemInfo {
    pub total_kb: u64,
    pub available_kb: u64,
}

impl MemInfo {
    pub fn used_percent(&self) -> f64 {
        memory_used_percent(self.total_kb, self.available_kb)
    }
}

/// Scans `/proc/meminfo` for `MemTotal` and `MemAvailable`.
///
/// `MemTotal` is required. A kernel without `MemAvailable` (pre-3.14) is
/// treated as having nothing available.
pub fn parse_meminfo(text: &str) -> Result<MemInfo> {
    let mut total = None;
    let mut available = None;

    for line in text.lines() {
        if let Some(rest) = line.strip_prefix("MemTotal:") {
            total = Some(parse_kb(rest)?);
        } else if let Some(rest) = line.strip_prefix("MemAvailable:") {
            available = Some(parse_kb(rest)?);
        }
        if total.is_some() && available.is_some() {
            break;
        }
    }

    let total_kb = total.ok_or_else(|| CollectError::malformed(SOURCE, "missing MemTotal"))?;
    Ok(MemInfo {
        total_kb,
        available_kb: available.unwrap_or(0),
    })
}

fn parse_kb(rest: &str) -> Result<u64> {
    let raw = rest
        .split_whitespace()
        .next()
        .ok_or_else(|| CollectError::malformed(SOURCE, "field without value"))?;
    raw.parse()
        .map_err(|e| CollectError::malformed(SOURCE, format!("value '{raw}': {e}")))
}

/// `(total - available) / total * 100`, or `0` for a zero total.
pub fn memory_used_percent(total: u64, available: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let used = total.saturating_sub(available);
    clamp_percent(used as f64 / total as f64 * 100.0)
}
