use crate::config::ConfigError;
use crate::transport::Transport;
use hostpulse_collector::engine::SamplingEngine;
use hostpulse_collector::CounterReader;
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    Sent,
    SendFailed,
}

/// Running totals over the dispatcher's lifetime.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DispatchStats {
    pub cycles: u64,
    pub sent: u64,
    pub failed: u64,
}

impl DispatchStats {
    fn record(&mut self, outcome: CycleOutcome) {
        self.cycles += 1;
        match outcome {
            CycleOutcome::Sent => self.sent += 1,
            CycleOutcome::SendFailed => self.failed += 1,
        }
    }
}

/// Drives the sample, send, wait cycle.
///
/// Cycles start on a fixed cadence; the first fires immediately. A send that
/// overruns the interval pushes the next cycle back rather than bunching
/// cycles up. Failed sends are logged and dropped, and the next cycle's
/// record supersedes them.
pub struct Dispatcher<R, T> {
    engine: SamplingEngine<R>,
    transport: T,
    period: Duration,
    stats: DispatchStats,
}

impl<R: CounterReader, T: Transport> Dispatcher<R, T> {
    pub fn new(
        engine: SamplingEngine<R>,
        transport: T,
        period: Duration,
    ) -> Result<Self, ConfigError> {
        if period.is_zero() {
            return Err(ConfigError::InvalidInterval {
                value: "0".to_string(),
                reason: "must be greater than 0".to_string(),
            });
        }
        Ok(Self {
            engine,
            transport,
            period,
            stats: DispatchStats::default(),
        })
    }

    pub fn stats(&self) -> DispatchStats {
        self.stats
    }

    /// Samples once and hands the record to the transport.
    pub async fn run_cycle(&mut self) -> CycleOutcome {
        let sample = self.engine.sample();
        let record = &sample.record;

        tracing::info!(
            hostname = %record.hostname,
            "Sending metrics: {}",
            record.summary()
        );
        if !sample.validity.all_valid() {
            tracing::debug!(
                unavailable = ?sample.validity.invalid_metrics(),
                "Record carries zero fallbacks"
            );
        }

        let outcome = match self.transport.send(record).await {
            Ok(()) => {
                tracing::debug!(target_url = self.transport.target(), "Metrics reported");
                CycleOutcome::Sent
            }
            Err(e) => {
                tracing::error!(
                    target_url = self.transport.target(),
                    error = %e,
                    "Failed to send metrics"
                );
                CycleOutcome::SendFailed
            }
        };
        self.stats.record(outcome);
        outcome
    }

    /// Runs until `cancel` fires.
    pub async fn run(&mut self, cancel: CancellationToken) -> DispatchStats {
        self.run_until(cancel, None).await
    }

    /// Runs at most `cycles` cycles, or fewer if `cancel` fires first.
    pub async fn run_for(&mut self, cycles: u64, cancel: CancellationToken) -> DispatchStats {
        self.run_until(cancel, Some(cycles)).await
    }

    async fn run_until(&mut self, cancel: CancellationToken, limit: Option<u64>) -> DispatchStats {
        let mut tick = interval(self.period);
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut done = 0u64;

        loop {
            if limit.is_some_and(|max| done >= max) {
                break;
            }
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    tracing::info!("Shutting down collection loop");
                    break;
                }
                _ = tick.tick() => {
                    self.run_cycle().await;
                    done += 1;
                }
            }
        }

        self.stats
    }
}
