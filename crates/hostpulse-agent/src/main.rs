use anyhow::{Context, Result};
use hostpulse_agent::config::{self, CliAction};
use hostpulse_agent::dispatcher::Dispatcher;
use hostpulse_agent::transport::{HttpTransport, Transport};
use hostpulse_collector::engine::SamplingEngine;
use hostpulse_collector::reader::ProcCounterReader;
use tokio_util::sync::CancellationToken;
use tracing::Level;
use tracing_subscriber::fmt::writer::MakeWriterExt;
use tracing_subscriber::EnvFilter;

fn init_tracing() -> Result<()> {
    // warnings and errors on stderr, everything else on stdout
    let writer = std::io::stderr
        .with_max_level(Level::WARN)
        .or_else(std::io::stdout);
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("hostpulse=info".parse()?))
        .with_writer(writer)
        .init();
    Ok(())
}

async fn shutdown_signal(cancel: CancellationToken) {
    let ctrl_c = tokio::signal::ctrl_c();
    let mut sigterm =
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(signal) => signal,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to register SIGTERM handler, using Ctrl-C only");
                if ctrl_c.await.is_ok() {
                    cancel.cancel();
                }
                return;
            }
        };

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received SIGINT"),
        _ = sigterm.recv() => tracing::info!("Received SIGTERM"),
    }
    cancel.cancel();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing()?;

    let config = match config::parse_args(std::env::args().skip(1))
        .context("invalid agent configuration")?
    {
        CliAction::Help => {
            println!("{}", config::USAGE);
            return Ok(());
        }
        CliAction::Run(config) => config,
    };

    let hostname = config.resolve_hostname();
    let transport = HttpTransport::new(&config.server_url, config.send_timeout())
        .context("failed to build HTTP client")?;

    tracing::info!(
        hostname = %hostname,
        server = transport.target(),
        interval_secs = config.collection_interval_secs,
        "hostpulse-agent starting"
    );

    let reader = ProcCounterReader::new(config.proc_root.clone(), config.disk_mount.clone());
    let engine = SamplingEngine::new(reader, hostname);
    let mut dispatcher = Dispatcher::new(engine, transport, config.interval())?;

    let cancel = CancellationToken::new();
    tokio::spawn(shutdown_signal(cancel.clone()));

    let stats = dispatcher.run(cancel).await;
    tracing::info!(
        cycles = stats.cycles,
        sent = stats.sent,
        failed = stats.failed,
        "hostpulse-agent stopped"
    );

    Ok(())
}
