use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::time::{Duration, Instant};

use obrec_book::MarketId;
use serde::Serialize;

use crate::metrics::AdapterMetrics;

/// Connection lifecycle of a venue adapter.
///
/// `Disconnected -> Connecting -> Streaming -> (ConnectionLost -> Backoff ->
/// Connecting)* -> Stopped`. Only an explicit stop reaches `Stopped`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Streaming,
    ConnectionLost,
    Backoff,
    Stopped,
}

impl ConnectionState {
    pub fn as_u8(self) -> u8 {
        match self {
            ConnectionState::Disconnected => 0,
            ConnectionState::Connecting => 1,
            ConnectionState::Streaming => 2,
            ConnectionState::ConnectionLost => 3,
            ConnectionState::Backoff => 4,
            ConnectionState::Stopped => 5,
        }
    }

    pub fn from_u8(value: u8) -> Self {
        match value {
            1 => ConnectionState::Connecting,
            2 => ConnectionState::Streaming,
            3 => ConnectionState::ConnectionLost,
            4 => ConnectionState::Backoff,
            5 => ConnectionState::Stopped,
            _ => ConnectionState::Disconnected,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Streaming => "streaming",
            ConnectionState::ConnectionLost => "connection_lost",
            ConnectionState::Backoff => "backoff",
            ConnectionState::Stopped => "stopped",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Counters shared between an adapter task and whoever observes it.
///
/// Only the adapter task writes; the supervisor, the health server and
/// reports read. Every update is mirrored into the Prometheus series.
#[derive(Debug)]
pub struct AdapterStats {
    id: String,
    market: MarketId,
    started_at: Instant,
    metrics: AdapterMetrics,
    state: AtomicU8,
    messages: AtomicU64,
    parse_errors: AtomicU64,
    stale: AtomicU64,
    gaps: AtomicU64,
    reconnects: AtomicU64,
    dropped: AtomicU64,
    flushes: AtomicU64,
    flush_failures: AtomicU64,
    records_persisted: AtomicU64,
    buffer_depth: AtomicU64,
}

/// Point-in-time copy of [`AdapterStats`]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatsSample {
    pub id: String,
    pub state: ConnectionState,
    pub messages: u64,
    pub parse_errors: u64,
    pub stale: u64,
    pub gaps: u64,
    pub reconnects: u64,
    pub dropped: u64,
    pub flushes: u64,
    pub flush_failures: u64,
    pub records_persisted: u64,
    pub buffer_depth: u64,
    #[serde(skip)]
    pub uptime: Duration,
}

impl StatsSample {
    /// Messages per second since the adapter was created
    pub fn rate(&self) -> f64 {
        let secs = self.uptime.as_secs_f64();
        if secs > 0.0 {
            self.messages as f64 / secs
        } else {
            0.0
        }
    }
}

impl AdapterStats {
    pub fn new(market: MarketId) -> Self {
        let metrics = AdapterMetrics::new(&market.exchange, &market.symbol);
        Self {
            id: market.key(),
            market,
            started_at: Instant::now(),
            metrics,
            state: AtomicU8::new(ConnectionState::Disconnected.as_u8()),
            messages: AtomicU64::new(0),
            parse_errors: AtomicU64::new(0),
            stale: AtomicU64::new(0),
            gaps: AtomicU64::new(0),
            reconnects: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
            flushes: AtomicU64::new(0),
            flush_failures: AtomicU64::new(0),
            records_persisted: AtomicU64::new(0),
            buffer_depth: AtomicU64::new(0),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn market(&self) -> &MarketId {
        &self.market
    }

    pub fn state(&self) -> ConnectionState {
        ConnectionState::from_u8(self.state.load(Ordering::SeqCst))
    }

    pub fn set_state(&self, state: ConnectionState) {
        self.state.store(state.as_u8(), Ordering::SeqCst);
        self.metrics.set_connection_state(state.as_u8());
    }

    pub fn messages(&self) -> u64 {
        self.messages.load(Ordering::Relaxed)
    }

    pub fn buffer_depth(&self) -> usize {
        self.buffer_depth.load(Ordering::Relaxed) as usize
    }

    pub fn record_message(&self) {
        self.messages.fetch_add(1, Ordering::Relaxed);
        self.metrics.inc_message();
    }

    pub fn record_parse_error(&self) {
        self.parse_errors.fetch_add(1, Ordering::Relaxed);
        self.metrics.inc_parse_error();
    }

    pub fn record_stale(&self) {
        self.stale.fetch_add(1, Ordering::Relaxed);
        self.metrics.inc_stale();
    }

    pub fn record_gap(&self) {
        self.gaps.fetch_add(1, Ordering::Relaxed);
        self.metrics.inc_gap();
    }

    pub fn record_reconnect(&self) {
        self.reconnects.fetch_add(1, Ordering::Relaxed);
        self.metrics.inc_reconnect();
    }

    pub fn record_dropped(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
        self.metrics.inc_dropped();
    }

    pub fn record_flush(&self, records: usize) {
        self.flushes.fetch_add(1, Ordering::Relaxed);
        self.records_persisted
            .fetch_add(records as u64, Ordering::Relaxed);
        self.metrics.inc_flush(true);
        self.metrics.add_persisted(records);
    }

    pub fn record_flush_failure(&self) {
        self.flush_failures.fetch_add(1, Ordering::Relaxed);
        self.metrics.inc_flush(false);
    }

    pub fn set_buffer_depth(&self, depth: usize) {
        self.buffer_depth.store(depth as u64, Ordering::Relaxed);
        self.metrics.set_buffer_depth(depth);
    }

    pub fn sample(&self) -> StatsSample {
        StatsSample {
            id: self.id.clone(),
            state: self.state(),
            messages: self.messages.load(Ordering::Relaxed),
            parse_errors: self.parse_errors.load(Ordering::Relaxed),
            stale: self.stale.load(Ordering::Relaxed),
            gaps: self.gaps.load(Ordering::Relaxed),
            reconnects: self.reconnects.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            flushes: self.flushes.load(Ordering::Relaxed),
            flush_failures: self.flush_failures.load(Ordering::Relaxed),
            records_persisted: self.records_persisted.load(Ordering::Relaxed),
            buffer_depth: self.buffer_depth.load(Ordering::Relaxed),
            uptime: self.started_at.elapsed(),
        }
    }
}
