//! Venue adapter: one task per market that keeps a local book in sync with a
//! depth stream and buffers snapshots for persistence.
//!
//! The task owns the book, the buffer and the sequence tracker outright; the
//! [`AdapterHandle`] talks to it over a command channel and observes it
//! through [`AdapterStats`] and a watch channel carrying the latest snapshot.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::Utc;
use obrec_archiver::{RotationWindow, SinkError, SnapshotSink};
use obrec_book::{BookStore, DepthUpdate, MarketId, Snapshot};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::backoff::{Backoff, BackoffPolicy};
use crate::baseline::fetch_baseline;
use crate::buffer::SnapshotBuffer;
use crate::error::{AdapterError, BaselineError};
use crate::sequence::{SequenceCheck, SequencePolicy, SequenceTracker};
use crate::stats::{AdapterStats, ConnectionState};
use crate::traits::{Connector, DepthDecoder, VenueAdapter};

const COMMAND_CAPACITY: usize = 8;

/// Per-adapter tuning
#[derive(Debug, Clone)]
pub struct AdapterConfig {
    /// Levels per side kept in each snapshot
    pub depth_levels: usize,
    /// Buffered snapshots that trigger a flush
    pub batch_size: usize,
    /// Maximum time between flushes while the buffer is non-empty
    pub flush_interval: Duration,
    /// Buffer capacity; the oldest snapshot is dropped beyond it
    pub max_buffer: usize,
    /// Buffer and persist snapshots. When false the book is only observed.
    pub record: bool,
    pub sequence_policy: SequencePolicy,
    pub backoff: BackoffPolicy,
}

impl Default for AdapterConfig {
    fn default() -> Self {
        Self {
            depth_levels: 20,
            batch_size: 1000,
            flush_interval: Duration::from_secs(5),
            max_buffer: 10_000,
            record: true,
            sequence_policy: SequencePolicy::Strict,
            backoff: BackoffPolicy::default(),
        }
    }
}

enum AdapterCommand {
    Flush(oneshot::Sender<Result<usize, SinkError>>),
}

/// How a connection session ended
enum Session {
    Stop,
    Lost(String),
}

enum Processed {
    Applied,
    Skipped,
    /// Book was invalidated and must be re-anchored on a fresh session
    Resync,
}

/// Everything the adapter task mutates besides the transport.
struct MarketState {
    market: MarketId,
    config: AdapterConfig,
    decoder: Box<dyn DepthDecoder>,
    book: BookStore,
    sequence: SequenceTracker,
    buffer: SnapshotBuffer,
    sink: Arc<dyn SnapshotSink>,
    stats: Arc<AdapterStats>,
    snapshots: watch::Sender<Option<Snapshot>>,
    http: reqwest::Client,
}

impl MarketState {
    fn process(&mut self, raw: &[u8]) -> Processed {
        let update = match self.decoder.decode(raw) {
            Ok(Some(update)) => update,
            Ok(None) => return Processed::Skipped,
            Err(e) => {
                self.stats.record_parse_error();
                warn!(adapter = %self.stats.id(), error = %e, "Dropping undecodable message");
                return Processed::Skipped;
            }
        };

        match self.sequence.check(&update) {
            SequenceCheck::Apply => {}
            SequenceCheck::Stale { last, received } => {
                self.stats.record_stale();
                debug!(adapter = %self.stats.id(), last, received, "Skipping stale update");
                return Processed::Skipped;
            }
            SequenceCheck::Gap { expected, received } => {
                self.stats.record_gap();
                warn!(
                    adapter = %self.stats.id(),
                    expected,
                    received,
                    "Sequence gap, discarding book"
                );
                self.book.clear();
                self.sequence.reset();
                return Processed::Resync;
            }
        }

        self.apply(&update);
        self.stats.record_message();
        Processed::Applied
    }

    fn apply(&mut self, update: &DepthUpdate) {
        self.book.apply_update(update);
        self.sequence.record(update);

        let snapshot = Snapshot::capture(
            &self.book,
            self.config.depth_levels,
            &self.market,
            update,
            Utc::now(),
        );
        if self.config.record {
            if self.buffer.push(snapshot.clone()) {
                self.stats.record_dropped();
                debug!(
                    adapter = %self.stats.id(),
                    capacity = self.buffer.capacity(),
                    dropped = self.buffer.dropped(),
                    "Buffer full, dropped oldest snapshot"
                );
            }
            self.stats.set_buffer_depth(self.buffer.len());
        }
        self.snapshots.send_replace(Some(snapshot));
    }

    async fn sync_baseline(&mut self) -> Result<(), BaselineError> {
        let update = fetch_baseline(&self.http, self.decoder.as_ref()).await?;
        info!(
            adapter = %self.stats.id(),
            sequence = ?update.sequence,
            levels = update.deltas.len(),
            "Book synchronised to depth baseline"
        );
        self.sequence.reset();
        self.apply(&update);
        Ok(())
    }

    fn flush_due(&self) -> bool {
        self.buffer.should_flush(Instant::now())
    }

    /// Merge everything buffered into the current window. On failure the
    /// buffer is left as it was so the next trigger retries the same rows.
    async fn flush(&mut self) -> Result<usize, SinkError> {
        if self.buffer.is_empty() {
            return Ok(0);
        }
        let pending = self.buffer.pending();
        let count = pending.len();
        let window = RotationWindow::containing(Utc::now());
        let sink = Arc::clone(&self.sink);
        let market = self.market.clone();

        let result = tokio::task::spawn_blocking(move || sink.merge(&market, window, &pending))
            .await
            .map_err(|e| SinkError::Task(e.to_string()))
            .and_then(|merged| merged);

        match result {
            Ok(outcome) => {
                self.buffer.mark_flushed(count, Instant::now());
                self.stats.record_flush(count);
                self.stats.set_buffer_depth(self.buffer.len());
                if let Some(outcome) = outcome {
                    info!(
                        adapter = %self.stats.id(),
                        path = %outcome.path.display(),
                        appended = outcome.appended,
                        total = outcome.total_records,
                        "Flushed snapshots"
                    );
                }
                Ok(count)
            }
            Err(e) => {
                self.stats.record_flush_failure();
                error!(
                    adapter = %self.stats.id(),
                    window = %window,
                    pending = count,
                    error = %e,
                    "Flush failed, keeping buffer for retry"
                );
                Err(e)
            }
        }
    }

    async fn handle(&mut self, command: AdapterCommand) {
        match command {
            AdapterCommand::Flush(reply) => {
                let result = self.flush().await;
                let _ = reply.send(result);
            }
        }
    }
}

/// The connection task for one market.
pub struct OrderbookAdapter<C: Connector> {
    connector: C,
    state: MarketState,
    backoff: Backoff,
    shutdown: CancellationToken,
    commands: mpsc::Receiver<AdapterCommand>,
    command_tx: mpsc::Sender<AdapterCommand>,
}

impl<C: Connector> OrderbookAdapter<C> {
    pub fn new(
        connector: C,
        decoder: Box<dyn DepthDecoder>,
        sink: Arc<dyn SnapshotSink>,
        config: AdapterConfig,
        shutdown: CancellationToken,
    ) -> Self {
        let market = MarketId::new(decoder.venue(), decoder.symbol());
        let stats = Arc::new(AdapterStats::new(market.clone()));
        let (snapshots, _) = watch::channel(None);
        let (command_tx, commands) = mpsc::channel(COMMAND_CAPACITY);

        Self {
            connector,
            backoff: Backoff::new(config.backoff),
            state: MarketState {
                market,
                book: BookStore::new(),
                sequence: SequenceTracker::new(config.sequence_policy),
                buffer: SnapshotBuffer::new(
                    config.max_buffer,
                    config.batch_size,
                    config.flush_interval,
                ),
                decoder,
                sink,
                stats,
                snapshots,
                http: reqwest::Client::new(),
                config,
            },
            shutdown,
            commands,
            command_tx,
        }
    }

    pub fn id(&self) -> &str {
        self.state.stats.id()
    }

    pub fn stats(&self) -> Arc<AdapterStats> {
        Arc::clone(&self.state.stats)
    }

    /// Run until the shutdown token is cancelled. Connection failures never
    /// end the task; they go through backoff and reconnect.
    pub async fn run(mut self) {
        info!(adapter = %self.id(), url = %self.state.decoder.stream_url(), "Adapter starting");

        loop {
            match self.run_session().await {
                Session::Stop => break,
                Session::Lost(reason) => {
                    self.state.stats.set_state(ConnectionState::ConnectionLost);
                    warn!(adapter = %self.id(), reason = %reason, "Connection lost");
                    if let Err(e) = self.connector.close().await {
                        debug!(adapter = %self.id(), error = %e, "Close after lost connection failed");
                    }

                    let delay = self.backoff.on_failure();
                    self.state.stats.record_reconnect();
                    self.state.stats.set_state(ConnectionState::Backoff);
                    info!(
                        adapter = %self.id(),
                        delay_ms = delay.as_millis() as u64,
                        failures = self.backoff.failures(),
                        "Reconnecting after backoff"
                    );
                    if !self.wait(delay).await {
                        break;
                    }
                }
            }
        }

        if let Err(e) = self.state.flush().await {
            error!(adapter = %self.id(), error = %e, "Final flush failed");
        }
        if let Err(e) = self.connector.close().await {
            debug!(adapter = %self.id(), error = %e, "Close on stop failed");
        }
        self.state.stats.set_state(ConnectionState::Stopped);
        info!(adapter = %self.id(), "Adapter stopped");
    }

    async fn run_session(&mut self) -> Session {
        self.state.stats.set_state(ConnectionState::Connecting);
        self.state.sequence.reset();
        // Levels removed while disconnected would otherwise linger
        if self.state.sequence.policy() == SequencePolicy::Strict {
            self.state.book.clear();
        }

        let mut frames = {
            let connect = self.connector.connect();
            tokio::pin!(connect);
            loop {
                tokio::select! {
                    _ = self.shutdown.cancelled() => return Session::Stop,
                    Some(command) = self.commands.recv() => self.state.handle(command).await,
                    result = &mut connect => match result {
                        Ok(frames) => break frames,
                        Err(e) => return Session::Lost(e.to_string()),
                    },
                }
            }
        };

        if self.state.sequence.policy() == SequencePolicy::Strict
            && self.state.decoder.baseline_url().is_some()
        {
            tokio::select! {
                _ = self.shutdown.cancelled() => return Session::Stop,
                result = self.state.sync_baseline() => {
                    if let Err(e) = result {
                        return Session::Lost(format!("baseline: {}", e));
                    }
                }
            }
        }

        self.backoff.on_success();
        self.state.stats.set_state(ConnectionState::Streaming);
        info!(adapter = %self.id(), "Streaming");

        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => return Session::Stop,
                Some(command) = self.commands.recv() => self.state.handle(command).await,
                frame = frames.recv() => match frame {
                    Some(raw) => {
                        if let Processed::Resync = self.state.process(&raw) {
                            return Session::Lost("sequence gap".to_string());
                        }
                        if self.state.flush_due() {
                            // Failures are logged and counted; the buffer is retried
                            let _ = self.state.flush().await;
                        }
                    }
                    None => return Session::Lost("stream closed".to_string()),
                },
            }
        }
    }

    /// Sleep out a backoff delay. Returns false if shutdown was requested.
    async fn wait(&mut self, delay: Duration) -> bool {
        let sleep = tokio::time::sleep(delay);
        tokio::pin!(sleep);
        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => return false,
                _ = &mut sleep => return true,
                Some(command) = self.commands.recv() => self.state.handle(command).await,
            }
        }
    }
}

/// [`VenueAdapter`] implementation that owns an [`OrderbookAdapter`] until
/// `connect` spawns it.
pub struct AdapterHandle<C: Connector + 'static> {
    id: String,
    stats: Arc<AdapterStats>,
    snapshots: watch::Receiver<Option<Snapshot>>,
    commands: mpsc::Sender<AdapterCommand>,
    shutdown: CancellationToken,
    adapter: Option<OrderbookAdapter<C>>,
    task: Option<JoinHandle<()>>,
}

impl<C: Connector + 'static> AdapterHandle<C> {
    pub fn new(adapter: OrderbookAdapter<C>) -> Self {
        Self {
            id: adapter.id().to_string(),
            stats: adapter.stats(),
            snapshots: adapter.state.snapshots.subscribe(),
            commands: adapter.command_tx.clone(),
            shutdown: adapter.shutdown.clone(),
            adapter: Some(adapter),
            task: None,
        }
    }

    #[cfg(test)]
    fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }
}

#[async_trait]
impl<C: Connector + 'static> VenueAdapter for AdapterHandle<C> {
    fn id(&self) -> &str {
        &self.id
    }

    fn message_count(&self) -> u64 {
        self.stats.messages()
    }

    fn buffer_depth(&self) -> usize {
        self.stats.buffer_depth()
    }

    fn stats(&self) -> Arc<AdapterStats> {
        Arc::clone(&self.stats)
    }

    fn subscribe(&self) -> watch::Receiver<Option<Snapshot>> {
        self.snapshots.clone()
    }

    fn connect(&mut self) -> Result<(), AdapterError> {
        let adapter = self
            .adapter
            .take()
            .ok_or_else(|| AdapterError::AlreadyStarted(self.id.clone()))?;
        self.task = Some(tokio::spawn(adapter.run()));
        Ok(())
    }

    async fn flush_buffer(&mut self) -> Result<usize, AdapterError> {
        if self.task.is_none() {
            return Ok(0);
        }
        let (reply, result) = oneshot::channel();
        if self.commands.send(AdapterCommand::Flush(reply)).await.is_err() {
            return Ok(0);
        }
        match result.await {
            Ok(flushed) => Ok(flushed?),
            // Task ended before it picked up the command
            Err(_) => Ok(0),
        }
    }

    async fn stop(&mut self) -> Result<(), AdapterError> {
        self.shutdown.cancel();
        if let Some(task) = self.task.take() {
            task.await.map_err(|e| AdapterError::Task(e.to_string()))?;
        }
        if self.adapter.take().is_some() {
            self.stats.set_state(ConnectionState::Stopped);
        }
        Ok(())
    }
}
