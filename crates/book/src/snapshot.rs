use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use crate::level::{MarketId, PriceLevel, Side};
use crate::store::BookStore;
use crate::update::DepthUpdate;

/// Immutable view of a book after one processed message.
///
/// Best prices, sizes, spread and mid are `None` whenever either side is
/// empty. A derived value that does not fit in a `Decimal` is also `None`.
/// Volumes only sum the captured top-N levels, not the whole book, and
/// saturate at `Decimal::MAX`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Snapshot {
    pub timestamp: DateTime<Utc>,
    pub sequence_id: Option<u64>,
    pub market: MarketId,
    pub event_type: String,
    pub event_time: Option<DateTime<Utc>>,
    pub bids: Vec<PriceLevel>,
    pub asks: Vec<PriceLevel>,
    pub best_bid: Option<Decimal>,
    pub best_ask: Option<Decimal>,
    pub best_bid_size: Option<Decimal>,
    pub best_ask_size: Option<Decimal>,
    pub spread: Option<Decimal>,
    pub spread_percent: Option<Decimal>,
    pub mid_price: Option<Decimal>,
    pub total_bid_volume: Decimal,
    pub total_ask_volume: Decimal,
}

impl Snapshot {
    /// Capture the top `depth` levels of `book` as of `timestamp`, tagging it
    /// with the identifiers carried by the update that was just applied.
    pub fn capture(
        book: &BookStore,
        depth: usize,
        market: &MarketId,
        update: &DepthUpdate,
        timestamp: DateTime<Utc>,
    ) -> Self {
        let bids = book.top(Side::Bid, depth);
        let asks = book.top(Side::Ask, depth);
        let total_bid_volume = volume(&bids);
        let total_ask_volume = volume(&asks);

        let mut snapshot = Self {
            timestamp,
            sequence_id: update.sequence,
            market: market.clone(),
            event_type: update.event_type.clone(),
            event_time: update.event_time,
            bids,
            asks,
            best_bid: None,
            best_ask: None,
            best_bid_size: None,
            best_ask_size: None,
            spread: None,
            spread_percent: None,
            mid_price: None,
            total_bid_volume,
            total_ask_volume,
        };

        if let (Some(bid), Some(ask)) = (snapshot.bids.first().copied(), snapshot.asks.first().copied()) {
            let spread = ask.price.checked_sub(bid.price);
            snapshot.best_bid = Some(bid.price);
            snapshot.best_ask = Some(ask.price);
            snapshot.best_bid_size = Some(bid.size);
            snapshot.best_ask_size = Some(ask.size);
            snapshot.spread = spread;
            snapshot.spread_percent = spread
                .and_then(|spread| spread.checked_div(ask.price))
                .and_then(|ratio| ratio.checked_mul(Decimal::ONE_HUNDRED));
            snapshot.mid_price = mid_price(bid.price, ask.price, spread);
        }

        snapshot
    }

    /// True when both sides had at least one level at capture time
    pub fn is_two_sided(&self) -> bool {
        self.best_bid.is_some() && self.best_ask.is_some()
    }
}

fn volume(levels: &[PriceLevel]) -> Decimal {
    levels
        .iter()
        .fold(Decimal::ZERO, |total, level| total.saturating_add(level.size))
}

/// The sum of two prices near `Decimal::MAX` overflows; bid plus half the
/// spread does not when the book is not crossed.
fn mid_price(bid: Decimal, ask: Decimal, spread: Option<Decimal>) -> Option<Decimal> {
    let two = Decimal::from(2);
    bid.checked_add(ask)
        .and_then(|sum| sum.checked_div(two))
        .or_else(|| spread.and_then(|s| s.checked_div(two)).and_then(|h| bid.checked_add(h)))
}
