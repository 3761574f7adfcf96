//! Recorder supervisor: starts every adapter, reports on them periodically
//! and runs the graceful stop sequence.

use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use obrec_connector_lib::{AdapterStats, VenueAdapter};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::display::{render_report, render_snapshot};
use crate::error::RecorderError;
use crate::report::RecorderReport;

/// Levels per side shown by the live display
const DISPLAY_LEVELS: usize = 10;

/// Destination for periodic and final reports
pub trait ReportSink: Send + Sync {
    fn emit(&self, report: &RecorderReport);
}

/// Prints reports to stdout and logs a summary event
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleReporter;

impl ReportSink for ConsoleReporter {
    fn emit(&self, report: &RecorderReport) {
        println!("{}", render_report(report));
        info!(
            adapters = report.adapters.len(),
            streaming = report.streaming(),
            total_messages = report.total_messages(),
            total_rate = report.total_rate(),
            buffered = report.total_buffered(),
            is_final = report.is_final,
            "Recorder report"
        );
    }
}

#[derive(Debug, Clone)]
pub struct SupervisorOptions {
    pub report_interval: Duration,
    /// Render each adapter's latest book at this interval
    pub display_interval: Option<Duration>,
    /// Stop on its own after this long
    pub duration: Option<Duration>,
    /// Shown in the final report
    pub data_dir: PathBuf,
}

impl Default for SupervisorOptions {
    fn default() -> Self {
        Self {
            report_interval: Duration::from_secs(30),
            display_interval: None,
            duration: None,
            data_dir: PathBuf::from("orderbook_data"),
        }
    }
}

pub struct RecorderSupervisor {
    adapters: Vec<Box<dyn VenueAdapter>>,
    stats: Vec<Arc<AdapterStats>>,
    reporter: Arc<dyn ReportSink>,
    options: SupervisorOptions,
    /// Parent of every adapter's shutdown token
    shutdown: CancellationToken,
    /// Report and display loops
    background: JoinSet<()>,
    background_shutdown: CancellationToken,
    started_at: Instant,
    started: bool,
    stopping: bool,
}

impl RecorderSupervisor {
    pub fn new(
        adapters: Vec<Box<dyn VenueAdapter>>,
        shutdown: CancellationToken,
        reporter: Arc<dyn ReportSink>,
        options: SupervisorOptions,
    ) -> Self {
        let stats = adapters.iter().map(|a| a.stats()).collect();
        Self {
            adapters,
            stats,
            reporter,
            options,
            shutdown,
            background: JoinSet::new(),
            background_shutdown: CancellationToken::new(),
            started_at: Instant::now(),
            started: false,
            stopping: false,
        }
    }

    pub fn adapter_stats(&self) -> Vec<Arc<AdapterStats>> {
        self.stats.clone()
    }

    pub fn is_stopping(&self) -> bool {
        self.stopping
    }

    /// Connect every adapter and start the periodic tasks. An adapter that
    /// fails to start is logged and skipped.
    pub fn start(&mut self) -> Result<(), RecorderError> {
        if self.started {
            return Err(RecorderError::AlreadyStarted);
        }
        self.started = true;
        self.started_at = Instant::now();

        let mut running = 0;
        for adapter in &mut self.adapters {
            match adapter.connect() {
                Ok(()) => running += 1,
                Err(e) => error!(adapter = %adapter.id(), error = %e, "Failed to start adapter"),
            }
        }
        info!(adapters = self.adapters.len(), running, "Recorder started");

        self.spawn_reporter();
        if let Some(interval) = self.options.display_interval {
            self.spawn_display(interval);
        }
        Ok(())
    }

    fn spawn_reporter(&mut self) {
        let stats = self.stats.clone();
        let reporter = Arc::clone(&self.reporter);
        let period = self.options.report_interval;
        let data_dir = self.options.data_dir.clone();
        let started_at = self.started_at;
        let shutdown = self.background_shutdown.clone();

        self.background.spawn(async move {
            let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = ticker.tick() => {
                        let report = RecorderReport::collect(
                            &stats,
                            started_at.elapsed(),
                            data_dir.clone(),
                            false,
                        );
                        reporter.emit(&report);
                    }
                }
            }
            debug!("Report loop stopped");
        });
    }

    fn spawn_display(&mut self, period: Duration) {
        let receivers: Vec<_> = self.adapters.iter().map(|a| a.subscribe()).collect();
        let shutdown = self.background_shutdown.clone();

        self.background.spawn(async move {
            let mut ticker = tokio::time::interval(period);
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = ticker.tick() => {
                        for rx in &receivers {
                            if let Some(snapshot) = rx.borrow().as_ref() {
                                println!("{}", render_snapshot(snapshot, DISPLAY_LEVELS));
                            }
                        }
                    }
                }
            }
            debug!("Display loop stopped");
        });
    }

    /// Run until `stop_signal` resolves or the configured duration elapses,
    /// then stop gracefully.
    pub async fn run<F>(&mut self, stop_signal: F) -> Option<RecorderReport>
    where
        F: Future<Output = ()>,
    {
        let duration = self.options.duration;
        let deadline = async move {
            match duration {
                Some(duration) => tokio::time::sleep(duration).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            _ = stop_signal => info!("Stop requested"),
            _ = deadline => info!(duration = ?duration, "Recording duration reached"),
        }
        self.stop().await
    }

    /// Graceful stop: end periodic tasks, flush every adapter, cancel and
    /// await them, then emit the final report. Returns the final report the
    /// first time; later calls do nothing and return `None`.
    pub async fn stop(&mut self) -> Option<RecorderReport> {
        if self.stopping {
            debug!("Recorder already stopped");
            return None;
        }
        self.stopping = true;
        info!(adapters = self.adapters.len(), "Stopping recorder");

        self.background_shutdown.cancel();
        while let Some(result) = self.background.join_next().await {
            if let Err(e) = result {
                warn!(error = %e, "Background task failed");
            }
        }

        for adapter in &mut self.adapters {
            match adapter.flush_buffer().await {
                Ok(0) => {}
                Ok(flushed) => info!(adapter = %adapter.id(), flushed, "Flushed buffer"),
                Err(e) => error!(adapter = %adapter.id(), error = %e, "Failed to flush buffer"),
            }
        }

        self.shutdown.cancel();
        for adapter in &mut self.adapters {
            if let Err(e) = adapter.stop().await {
                error!(adapter = %adapter.id(), error = %e, "Failed to stop adapter");
            }
        }

        let report = RecorderReport::collect(
            &self.stats,
            self.started_at.elapsed(),
            self.options.data_dir.clone(),
            true,
        );
        self.reporter.emit(&report);
        info!(total_messages = report.total_messages(), "Recorder stopped");
        Some(report)
    }
}
