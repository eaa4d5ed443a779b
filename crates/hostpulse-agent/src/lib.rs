//! The hostpulse agent: samples local resource counters on a fixed cadence
//! and posts each [`MetricsRecord`](hostpulse_common::types::MetricsRecord)
//! to a collection endpoint.

pub mod config;
pub mod dispatcher;
pub mod transport;

#[cfg(test)]
mod tests;
