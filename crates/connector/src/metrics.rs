//! Prometheus metrics for venue adapters
//!
//! Every series is labelled with the venue and symbol of the adapter that
//! recorded it.

use once_cell::sync::Lazy;
use prometheus::{
    register_int_counter_vec, register_int_gauge_vec, Encoder, IntCounterVec, IntGaugeVec,
    TextEncoder,
};

/// Labels used for metrics
const LABEL_VENUE: &str = "venue";
const LABEL_SYMBOL: &str = "symbol";
const LABEL_RESULT: &str = "result";

/// Depth messages applied to the book
static MESSAGES_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "obrec_messages_total",
        "Depth messages applied to the local book",
        &[LABEL_VENUE, LABEL_SYMBOL]
    )
    .expect("Failed to register messages_total metric")
});

static PARSE_ERRORS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "obrec_parse_errors_total",
        "Inbound messages dropped because they could not be decoded",
        &[LABEL_VENUE, LABEL_SYMBOL]
    )
    .expect("Failed to register parse_errors_total metric")
});

static STALE_UPDATES_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "obrec_stale_updates_total",
        "Updates skipped because the book already covered their ids",
        &[LABEL_VENUE, LABEL_SYMBOL]
    )
    .expect("Failed to register stale_updates_total metric")
});

static SEQUENCE_GAPS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "obrec_sequence_gaps_total",
        "Detected gaps in venue update ids",
        &[LABEL_VENUE, LABEL_SYMBOL]
    )
    .expect("Failed to register sequence_gaps_total metric")
});

static RECONNECTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "obrec_reconnects_total",
        "Reconnect attempts scheduled after a lost or failed connection",
        &[LABEL_VENUE, LABEL_SYMBOL]
    )
    .expect("Failed to register reconnects_total metric")
});

static SNAPSHOTS_DROPPED_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "obrec_snapshots_dropped_total",
        "Buffered snapshots evicted because the buffer was full",
        &[LABEL_VENUE, LABEL_SYMBOL]
    )
    .expect("Failed to register snapshots_dropped_total metric")
});

static FLUSHES_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "obrec_flushes_total",
        "Buffer flushes by result (ok, error)",
        &[LABEL_VENUE, LABEL_SYMBOL, LABEL_RESULT]
    )
    .expect("Failed to register flushes_total metric")
});

static RECORDS_PERSISTED_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "obrec_records_persisted_total",
        "Snapshots written to window files",
        &[LABEL_VENUE, LABEL_SYMBOL]
    )
    .expect("Failed to register records_persisted_total metric")
});

static BUFFER_DEPTH: Lazy<IntGaugeVec> = Lazy::new(|| {
    register_int_gauge_vec!(
        "obrec_buffer_depth",
        "Snapshots waiting to be flushed",
        &[LABEL_VENUE, LABEL_SYMBOL]
    )
    .expect("Failed to register buffer_depth metric")
});

/// 0=disconnected 1=connecting 2=streaming 3=connection_lost 4=backoff 5=stopped
static CONNECTION_STATE: Lazy<IntGaugeVec> = Lazy::new(|| {
    register_int_gauge_vec!(
        "obrec_connection_state",
        "Adapter connection state code",
        &[LABEL_VENUE, LABEL_SYMBOL]
    )
    .expect("Failed to register connection_state metric")
});

/// Handle for recording metrics for one adapter
#[derive(Clone, Debug)]
pub struct AdapterMetrics {
    venue: String,
    symbol: String,
}

impl AdapterMetrics {
    pub fn new(venue: impl Into<String>, symbol: impl Into<String>) -> Self {
        Self {
            venue: venue.into(),
            symbol: symbol.into(),
        }
    }

    fn labels(&self) -> [&str; 2] {
        [&self.venue, &self.symbol]
    }

    pub fn inc_message(&self) {
        MESSAGES_TOTAL.with_label_values(&self.labels()).inc();
    }

    pub fn inc_parse_error(&self) {
        PARSE_ERRORS_TOTAL.with_label_values(&self.labels()).inc();
    }

    pub fn inc_stale(&self) {
        STALE_UPDATES_TOTAL.with_label_values(&self.labels()).inc();
    }

    pub fn inc_gap(&self) {
        SEQUENCE_GAPS_TOTAL.with_label_values(&self.labels()).inc();
    }

    pub fn inc_reconnect(&self) {
        RECONNECTS_TOTAL.with_label_values(&self.labels()).inc();
    }

    pub fn inc_dropped(&self) {
        SNAPSHOTS_DROPPED_TOTAL.with_label_values(&self.labels()).inc();
    }

    pub fn inc_flush(&self, ok: bool) {
        let result = if ok { "ok" } else { "error" };
        FLUSHES_TOTAL
            .with_label_values(&[&self.venue, &self.symbol, result])
            .inc();
    }

    pub fn add_persisted(&self, records: usize) {
        RECORDS_PERSISTED_TOTAL
            .with_label_values(&self.labels())
            .inc_by(records as u64);
    }

    pub fn set_buffer_depth(&self, depth: usize) {
        BUFFER_DEPTH
            .with_label_values(&self.labels())
            .set(depth as i64);
    }

    pub fn set_connection_state(&self, code: u8) {
        CONNECTION_STATE
            .with_label_values(&self.labels())
            .set(i64::from(code));
    }
}

/// Encode all registered metrics in Prometheus text format
pub fn encode_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| {
        prometheus::Error::Msg(format!("Failed to encode metrics as UTF-8: {}", e))
    })
}
