use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use obrec_connector_lib::{AdapterStats, ConnectionState, StatsSample};
use serde::Serialize;

/// One adapter's line in a report
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AdapterReport {
    pub id: String,
    pub state: ConnectionState,
    pub messages: u64,
    /// Messages per second since the adapter was created
    pub rate: f64,
    pub buffer_depth: u64,
    pub reconnects: u64,
    pub gaps: u64,
    pub parse_errors: u64,
    pub dropped: u64,
    pub flush_failures: u64,
    pub records_persisted: u64,
}

impl From<StatsSample> for AdapterReport {
    fn from(sample: StatsSample) -> Self {
        Self {
            rate: sample.rate(),
            id: sample.id,
            state: sample.state,
            messages: sample.messages,
            buffer_depth: sample.buffer_depth,
            reconnects: sample.reconnects,
            gaps: sample.gaps,
            parse_errors: sample.parse_errors,
            dropped: sample.dropped,
            flush_failures: sample.flush_failures,
            records_persisted: sample.records_persisted,
        }
    }
}

/// Aggregate view over every adapter at one point in time.
#[derive(Debug, Clone, Serialize)]
pub struct RecorderReport {
    pub generated_at: DateTime<Utc>,
    #[serde(skip)]
    pub elapsed: Duration,
    pub adapters: Vec<AdapterReport>,
    pub data_dir: PathBuf,
    /// Emitted once, after the recorder stopped
    pub is_final: bool,
}

impl RecorderReport {
    pub fn collect(
        stats: &[Arc<AdapterStats>],
        elapsed: Duration,
        data_dir: PathBuf,
        is_final: bool,
    ) -> Self {
        Self {
            generated_at: Utc::now(),
            elapsed,
            adapters: stats.iter().map(|s| s.sample().into()).collect(),
            data_dir,
            is_final,
        }
    }

    pub fn total_messages(&self) -> u64 {
        self.adapters.iter().map(|a| a.messages).sum()
    }

    /// Sum of per-adapter rates
    pub fn total_rate(&self) -> f64 {
        self.adapters.iter().map(|a| a.rate).sum()
    }

    /// Total messages over the recorder's own running time
    pub fn average_rate(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.total_messages() as f64 / secs
        } else {
            0.0
        }
    }

    pub fn total_buffered(&self) -> u64 {
        self.adapters.iter().map(|a| a.buffer_depth).sum()
    }

    pub fn streaming(&self) -> usize {
        self.adapters
            .iter()
            .filter(|a| a.state == ConnectionState::Streaming)
            .count()
    }
}
