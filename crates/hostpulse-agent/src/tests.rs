use crate::dispatcher::{CycleOutcome, DispatchStats, Dispatcher};
use crate::transport::{Transport, TransportError};
use async_trait::async_trait;
use hostpulse_collector::engine::SamplingEngine;
use hostpulse_collector::{CounterReader, Result as CollectResult};
use hostpulse_common::types::{CpuSnapshot, MetricsRecord};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Advances every CPU counter by 10 ticks per read, 3 of them busy.
#[derive(Default)]
struct SteadyReader {
    reads: AtomicU64,
}

impl CounterReader for SteadyReader {
    fn read_cpu_snapshot(&self) -> CollectResult<CpuSnapshot> {
        let n = self.reads.fetch_add(1, Ordering::SeqCst);
        Ok(CpuSnapshot {
            user: 3 * n,
            idle: 7 * n,
            ..Default::default()
        })
    }

    fn read_memory_usage(&self) -> CollectResult<f64> {
        Ok(42.0)
    }

    fn read_disk_usage(&self) -> CollectResult<f64> {
        Ok(61.5)
    }

    fn read_disk_io_bytes(&self) -> CollectResult<u64> {
        Ok(4096)
    }
}

#[derive(Clone, Default)]
struct RecordingTransport {
    sent: Arc<Mutex<Vec<(Instant, MetricsRecord)>>>,
    fail: bool,
    delay: Option<Duration>,
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn send(&self, record: &MetricsRecord) -> Result<(), TransportError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.sent
            .lock()
            .unwrap()
            .push((Instant::now(), record.clone()));
        if self.fail {
            return Err(TransportError::Status {
                status: 502,
                body: "bad gateway".to_string(),
            });
        }
        Ok(())
    }

    fn target(&self) -> &str {
        "memory://test"
    }
}

fn dispatcher(
    transport: RecordingTransport,
    period_secs: u64,
) -> Dispatcher<SteadyReader, RecordingTransport> {
    let engine = SamplingEngine::new(SteadyReader::default(), "agent-test");
    Dispatcher::new(engine, transport, Duration::from_secs(period_secs)).unwrap()
}

fn gaps(sent: &[(Instant, MetricsRecord)]) -> Vec<Duration> {
    sent.windows(2).map(|w| w[1].0 - w[0].0).collect()
}

#[tokio::test]
async fn single_cycle_sends_full_record() {
    let transport = RecordingTransport::default();
    let mut d = dispatcher(transport.clone(), 5);

    assert_eq!(d.run_cycle().await, CycleOutcome::Sent);
    assert_eq!(
        d.stats(),
        DispatchStats {
            cycles: 1,
            sent: 1,
            failed: 0
        }
    );

    let sent = transport.sent.lock().unwrap();
    let record = &sent[0].1;
    assert_eq!(record.hostname, "agent-test");
    assert_eq!(record.cpu_usage, 30.0);
    assert_eq!(record.memory_usage, 42.0);
    assert_eq!(record.disk_usage, 61.5);
    assert_eq!(record.disk_io_read, 4096);
}

#[tokio::test(start_paused = true)]
async fn cycles_fire_on_the_configured_interval() {
    let transport = RecordingTransport::default();
    let mut d = dispatcher(transport.clone(), 5);

    let stats = d.run_for(4, CancellationToken::new()).await;
    assert_eq!(
        stats,
        DispatchStats {
            cycles: 4,
            sent: 4,
            failed: 0
        }
    );

    let sent = transport.sent.lock().unwrap();
    assert_eq!(gaps(&sent), vec![Duration::from_secs(5); 3]);
}

#[tokio::test(start_paused = true)]
async fn failed_sends_do_not_stall_the_loop() {
    let transport = RecordingTransport {
        fail: true,
        ..Default::default()
    };
    let mut d = dispatcher(transport.clone(), 5);

    let stats = d.run_for(3, CancellationToken::new()).await;
    assert_eq!(stats.cycles, 3);
    assert_eq!(stats.failed, 3);
    assert_eq!(stats.sent, 0);

    let sent = transport.sent.lock().unwrap();
    assert_eq!(gaps(&sent), vec![Duration::from_secs(5); 2]);
    // every cycle carries a fresh sample
    assert!(sent.iter().all(|(_, r)| r.cpu_usage == 30.0));
}

#[tokio::test(start_paused = true)]
async fn slow_send_delays_but_never_hurries_the_next_cycle() {
    let transport = RecordingTransport {
        delay: Some(Duration::from_secs(7)),
        ..Default::default()
    };
    let mut d = dispatcher(transport.clone(), 5);

    d.run_for(3, CancellationToken::new()).await;

    let sent = transport.sent.lock().unwrap();
    for gap in gaps(&sent) {
        assert!(gap >= Duration::from_secs(5), "cycle fired early: {gap:?}");
    }
}

#[tokio::test(start_paused = true)]
async fn cancellation_interrupts_the_wait() {
    let transport = RecordingTransport::default();
    let mut d = dispatcher(transport.clone(), 5);
    let cancel = CancellationToken::new();

    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(7)).await;
        trigger.cancel();
    });

    let started = Instant::now();
    let stats = d.run(cancel).await;
    assert_eq!(stats.cycles, 2);
    assert!(Instant::now() - started < Duration::from_secs(10));
}

#[tokio::test]
async fn cancelled_before_start_takes_no_sample() {
    let transport = RecordingTransport::default();
    let mut d = dispatcher(transport.clone(), 5);
    let cancel = CancellationToken::new();
    cancel.cancel();

    let stats = d.run(cancel).await;
    assert_eq!(stats, DispatchStats::default());
    assert!(transport.sent.lock().unwrap().is_empty());
}

#[test]
fn zero_period_is_rejected() {
    let engine = SamplingEngine::new(SteadyReader::default(), "h");
    assert!(Dispatcher::new(engine, RecordingTransport::default(), Duration::ZERO).is_err());
}
