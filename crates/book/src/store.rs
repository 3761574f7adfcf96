use std::collections::BTreeMap;

use rust_decimal::Decimal;

use crate::level::{PriceLevel, Side};
use crate::update::DepthUpdate;

/// Local replica of one market's book.
///
/// Every stored size is strictly positive: applying a zero size removes the
/// level. Crossed or locked books are stored as received.
#[derive(Debug, Clone, Default)]
pub struct BookStore {
    bids: BTreeMap<Decimal, Decimal>,
    asks: BTreeMap<Decimal, Decimal>,
}

impl BookStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn side_mut(&mut self, side: Side) -> &mut BTreeMap<Decimal, Decimal> {
        match side {
            Side::Bid => &mut self.bids,
            Side::Ask => &mut self.asks,
        }
    }

    fn side(&self, side: Side) -> &BTreeMap<Decimal, Decimal> {
        match side {
            Side::Bid => &self.bids,
            Side::Ask => &self.asks,
        }
    }

    /// Upsert or remove a level. Never fails; values are validated upstream.
    pub fn apply(&mut self, side: Side, price: Decimal, size: Decimal) {
        let levels = self.side_mut(side);
        if size <= Decimal::ZERO {
            levels.remove(&price);
        } else {
            levels.insert(price, size);
        }
    }

    /// Apply a parsed message. Snapshot updates replace the whole book first.
    pub fn apply_update(&mut self, update: &DepthUpdate) {
        if update.is_snapshot() {
            self.clear();
        }
        for delta in &update.deltas {
            self.apply(delta.side, delta.price, delta.size);
        }
    }

    /// Best `n` levels, bids descending and asks ascending.
    pub fn top(&self, side: Side, n: usize) -> Vec<PriceLevel> {
        let to_level = |(price, size): (&Decimal, &Decimal)| PriceLevel::new(*price, *size);
        match side {
            Side::Bid => self.bids.iter().rev().take(n).map(to_level).collect(),
            Side::Ask => self.asks.iter().take(n).map(to_level).collect(),
        }
    }

    pub fn best(&self, side: Side) -> Option<PriceLevel> {
        let entry = match side {
            Side::Bid => self.bids.iter().next_back(),
            Side::Ask => self.asks.iter().next(),
        };
        entry.map(|(price, size)| PriceLevel::new(*price, *size))
    }

    /// Number of levels on a side
    pub fn depth(&self, side: Side) -> usize {
        self.side(side).len()
    }

    pub fn size_at(&self, side: Side, price: Decimal) -> Option<Decimal> {
        self.side(side).get(&price).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.bids.is_empty() && self.asks.is_empty()
    }

    pub fn clear(&mut self) {
        self.bids.clear();
        self.asks.clear();
    }
}
