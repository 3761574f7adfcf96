use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::level::Side;

/// One level change. `size == 0` removes the level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LevelDelta {
    pub side: Side,
    pub price: Decimal,
    pub size: Decimal,
}

impl LevelDelta {
    pub fn new(side: Side, price: Decimal, size: Decimal) -> Self {
        Self { side, price, size }
    }

    pub fn bid(price: Decimal, size: Decimal) -> Self {
        Self::new(Side::Bid, price, size)
    }

    pub fn ask(price: Decimal, size: Decimal) -> Self {
        Self::new(Side::Ask, price, size)
    }
}

/// Whether an update patches the book or replaces it wholesale
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UpdateKind {
    #[default]
    Delta,
    /// Full book: existing levels are discarded before the deltas apply
    Snapshot,
}

/// Parsed form of one inbound depth message.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DepthUpdate {
    pub event_type: String,
    pub kind: UpdateKind,
    /// First update id covered by this message, when the venue reports one
    pub first_sequence: Option<u64>,
    /// Last update id covered by this message
    pub sequence: Option<u64>,
    pub event_time: Option<DateTime<Utc>>,
    /// Applied strictly in listed order
    pub deltas: Vec<LevelDelta>,
}

impl DepthUpdate {
    pub fn delta(event_type: impl Into<String>, deltas: Vec<LevelDelta>) -> Self {
        Self {
            event_type: event_type.into(),
            deltas,
            ..Default::default()
        }
    }

    pub fn snapshot(event_type: impl Into<String>, deltas: Vec<LevelDelta>) -> Self {
        Self {
            event_type: event_type.into(),
            kind: UpdateKind::Snapshot,
            deltas,
            ..Default::default()
        }
    }

    pub fn with_sequence(mut self, first: Option<u64>, last: Option<u64>) -> Self {
        self.first_sequence = first;
        self.sequence = last;
        self
    }

    pub fn with_event_time(mut self, event_time: Option<DateTime<Utc>>) -> Self {
        self.event_time = event_time;
        self
    }

    pub fn is_snapshot(&self) -> bool {
        self.kind == UpdateKind::Snapshot
    }
}
