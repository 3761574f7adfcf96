//! obrec-recorder binary entry point

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use obrec_archiver::ParquetSink;
use obrec_connector_lib::{run_server, ServerState, VenueKind};
use tokio::signal::unix::{signal, SignalKind};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use obrec_recorder::{
    build_adapters, parse_duration, Config, ConsoleReporter, RecorderSupervisor, SupervisorOptions,
};

#[derive(Parser, Debug)]
#[command(name = "obrec-recorder")]
#[command(about = "Record order book snapshots from crypto venues to parquet")]
struct Args {
    /// Path to recorder configuration file (built-in defaults if omitted)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Only run these venues (comma separated)
    #[arg(long, value_delimiter = ',')]
    venues: Vec<VenueKind>,

    /// Replace configured symbols for every non-Lighter venue
    #[arg(long, value_delimiter = ',')]
    symbols: Vec<String>,

    /// Stop after this long (e.g. 30m, 2h)
    #[arg(short, long)]
    duration: Option<String>,

    /// Maintain books without persisting snapshots
    #[arg(long)]
    no_record: bool,

    /// Print each market's top of book periodically
    #[arg(long)]
    display: bool,

    /// Serve /health, /ready and /metrics on this address
    #[arg(long)]
    metrics_addr: Option<SocketAddr>,

    /// Override the storage directory
    #[arg(long, env = "OBREC_DATA_DIR")]
    data_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => Config::load(path).map_err(|e| {
            error!(error = %e, path = ?path, "Failed to load config");
            e
        })?,
        None => Config::default(),
    };

    if !args.venues.is_empty() {
        config.restrict_venues(&args.venues);
    }
    if !args.symbols.is_empty() {
        config.override_symbols(&args.symbols);
    }
    if args.no_record {
        config.recording = false;
    }
    if let Some(dir) = args.data_dir {
        config.storage.path = dir;
    }
    config.validate()?;

    let duration = args.duration.as_deref().map(parse_duration).transpose()?;

    info!(
        venues = config.enabled_venues().count(),
        storage = ?config.storage.path,
        compression = ?config.storage.compression,
        recording = config.recording,
        duration = ?duration,
        "Starting recorder"
    );

    let sink = Arc::new(
        ParquetSink::new(config.storage.path.clone()).with_compression(config.storage.compression),
    );
    let shutdown = CancellationToken::new();
    let adapters = build_adapters(&config, sink, &shutdown)?;

    let options = SupervisorOptions {
        report_interval: config.report.interval()?,
        display_interval: if args.display {
            Some(config.report.display_interval()?)
        } else {
            None
        },
        duration,
        data_dir: config.storage.path.clone(),
    };
    let mut supervisor =
        RecorderSupervisor::new(adapters, shutdown.clone(), Arc::new(ConsoleReporter), options);

    if let Some(addr) = args.metrics_addr {
        let state = ServerState::new(supervisor.adapter_stats());
        let server_shutdown = shutdown.clone();
        tokio::spawn(async move {
            info!(addr = %addr, "Starting health server");
            tokio::select! {
                result = run_server(addr, state) => {
                    if let Err(e) = result {
                        error!(error = %e, "Health server failed");
                    }
                }
                _ = server_shutdown.cancelled() => {}
            }
        });
    }

    supervisor.start()?;

    // Set up signal handlers for graceful shutdown
    let mut sigterm =
        signal(SignalKind::terminate()).expect("Failed to create SIGTERM handler");
    let mut sigint =
        signal(SignalKind::interrupt()).expect("Failed to create SIGINT handler");

    info!("Recorder running, waiting for SIGTERM/SIGINT to stop");

    let stop_signal = async {
        tokio::select! {
            _ = sigterm.recv() => info!("SIGTERM received, shutting down gracefully"),
            _ = sigint.recv() => info!("SIGINT received, shutting down gracefully"),
        }
    };
    supervisor.run(stop_signal).await;

    info!("Recorder shutdown complete");
    Ok(())
}
