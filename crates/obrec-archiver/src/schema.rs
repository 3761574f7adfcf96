//! Arrow layout of persisted snapshots.
//!
//! Decimal book values are stored as Float64. Top-N levels are stored as four
//! parallel `List<Float64>` columns (prices and sizes per side, best first).

use std::sync::Arc;

use arrow::array::*;
use arrow::datatypes::{DataType, Field, Schema, SchemaRef, TimeUnit};
use arrow::error::ArrowError;
use arrow::record_batch::RecordBatch;
use obrec_book::{PriceLevel, Snapshot};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

pub const SCHEMA_NAME: &str = "orderbook_snapshot";
pub const SCHEMA_VERSION: &str = "1.0.0";

fn ts_type() -> DataType {
    DataType::Timestamp(TimeUnit::Microsecond, Some(Arc::from("UTC")))
}

fn levels_type() -> DataType {
    DataType::List(Arc::new(Field::new("item", DataType::Float64, true)))
}

pub fn snapshot_schema() -> SchemaRef {
    Arc::new(Schema::new(vec![
        Field::new("timestamp", ts_type(), false),
        Field::new("sequence_id", DataType::UInt64, true),
        Field::new("exchange", DataType::Utf8, false),
        Field::new("symbol", DataType::Utf8, false),
        Field::new("event_type", DataType::Utf8, false),
        Field::new("event_time", ts_type(), true),
        Field::new("bid_prices", levels_type(), false),
        Field::new("bid_sizes", levels_type(), false),
        Field::new("ask_prices", levels_type(), false),
        Field::new("ask_sizes", levels_type(), false),
        Field::new("best_bid", DataType::Float64, true),
        Field::new("best_ask", DataType::Float64, true),
        Field::new("best_bid_size", DataType::Float64, true),
        Field::new("best_ask_size", DataType::Float64, true),
        Field::new("spread", DataType::Float64, true),
        Field::new("spread_percent", DataType::Float64, true),
        Field::new("mid_price", DataType::Float64, true),
        Field::new("total_bid_volume", DataType::Float64, false),
        Field::new("total_ask_volume", DataType::Float64, false),
    ]))
}

fn to_f64(value: Decimal) -> f64 {
    value.to_f64().unwrap_or(f64::NAN)
}

fn append_levels(
    prices: &mut ListBuilder<Float64Builder>,
    sizes: &mut ListBuilder<Float64Builder>,
    levels: &[PriceLevel],
) {
    for level in levels {
        prices.values().append_value(to_f64(level.price));
        sizes.values().append_value(to_f64(level.size));
    }
    prices.append(true);
    sizes.append(true);
}

/// Build one record batch from snapshots, preserving their order.
pub fn snapshots_to_batch(snapshots: &[Snapshot]) -> Result<RecordBatch, ArrowError> {
    let mut timestamp = TimestampMicrosecondBuilder::new();
    let mut sequence_id = UInt64Builder::new();
    let mut exchange = StringBuilder::new();
    let mut symbol = StringBuilder::new();
    let mut event_type = StringBuilder::new();
    let mut event_time = TimestampMicrosecondBuilder::new();
    let mut bid_prices = ListBuilder::new(Float64Builder::new());
    let mut bid_sizes = ListBuilder::new(Float64Builder::new());
    let mut ask_prices = ListBuilder::new(Float64Builder::new());
    let mut ask_sizes = ListBuilder::new(Float64Builder::new());
    let mut best_bid = Float64Builder::new();
    let mut best_ask = Float64Builder::new();
    let mut best_bid_size = Float64Builder::new();
    let mut best_ask_size = Float64Builder::new();
    let mut spread = Float64Builder::new();
    let mut spread_percent = Float64Builder::new();
    let mut mid_price = Float64Builder::new();
    let mut total_bid_volume = Float64Builder::new();
    let mut total_ask_volume = Float64Builder::new();

    for snap in snapshots {
        timestamp.append_value(snap.timestamp.timestamp_micros());
        sequence_id.append_option(snap.sequence_id);
        exchange.append_value(&snap.market.exchange);
        symbol.append_value(&snap.market.symbol);
        event_type.append_value(&snap.event_type);
        event_time.append_option(snap.event_time.map(|t| t.timestamp_micros()));
        append_levels(&mut bid_prices, &mut bid_sizes, &snap.bids);
        append_levels(&mut ask_prices, &mut ask_sizes, &snap.asks);
        best_bid.append_option(snap.best_bid.map(to_f64));
        best_ask.append_option(snap.best_ask.map(to_f64));
        best_bid_size.append_option(snap.best_bid_size.map(to_f64));
        best_ask_size.append_option(snap.best_ask_size.map(to_f64));
        spread.append_option(snap.spread.map(to_f64));
        spread_percent.append_option(snap.spread_percent.map(to_f64));
        mid_price.append_option(snap.mid_price.map(to_f64));
        total_bid_volume.append_value(to_f64(snap.total_bid_volume));
        total_ask_volume.append_value(to_f64(snap.total_ask_volume));
    }

    RecordBatch::try_new(
        snapshot_schema(),
        vec![
            Arc::new(timestamp.finish().with_timezone("UTC")),
            Arc::new(sequence_id.finish()),
            Arc::new(exchange.finish()),
            Arc::new(symbol.finish()),
            Arc::new(event_type.finish()),
            Arc::new(event_time.finish().with_timezone("UTC")),
            Arc::new(bid_prices.finish()),
            Arc::new(bid_sizes.finish()),
            Arc::new(ask_prices.finish()),
            Arc::new(ask_sizes.finish()),
            Arc::new(best_bid.finish()),
            Arc::new(best_ask.finish()),
            Arc::new(best_bid_size.finish()),
            Arc::new(best_ask_size.finish()),
            Arc::new(spread.finish()),
            Arc::new(spread_percent.finish()),
            Arc::new(mid_price.finish()),
            Arc::new(total_bid_volume.finish()),
            Arc::new(total_ask_volume.finish()),
        ],
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use obrec_book::{BookStore, DepthUpdate, LevelDelta, MarketId};

    fn d(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    fn two_sided() -> Snapshot {
        let mut book = BookStore::new();
        let update = DepthUpdate::delta(
            "depthUpdate",
            vec![
                LevelDelta::bid(d("100"), d("1")),
                LevelDelta::bid(d("99.5"), d("2")),
                LevelDelta::ask(d("101"), d("0.5")),
            ],
        )
        .with_sequence(Some(1), Some(42));
        book.apply_update(&update);
        Snapshot::capture(
            &book,
            20,
            &MarketId::new("binance_spot", "BTCUSDT"),
            &update,
            Utc.with_ymd_and_hms(2026, 2, 12, 14, 0, 1).unwrap(),
        )
    }

    #[test]
    fn test_batch_matches_schema() {
        let batch = snapshots_to_batch(&[two_sided()]).unwrap();
        assert_eq!(batch.schema(), snapshot_schema());
        assert_eq!(batch.num_rows(), 1);
        assert_eq!(batch.num_columns(), 19);
    }

    #[test]
    fn test_levels_columns() {
        let batch = snapshots_to_batch(&[two_sided()]).unwrap();
        let bid_prices = batch
            .column_by_name("bid_prices")
            .unwrap()
            .as_any()
            .downcast_ref::<ListArray>()
            .unwrap();
        let row = bid_prices.value(0);
        let prices = row.as_any().downcast_ref::<Float64Array>().unwrap();
        assert_eq!(prices.len(), 2);
        assert_eq!(prices.value(0), 100.0);
        assert_eq!(prices.value(1), 99.5);
    }

    #[test]
    fn test_nulls_for_one_sided_book() {
        let mut book = BookStore::new();
        let update = DepthUpdate::delta("depthUpdate", vec![LevelDelta::bid(d("100"), d("1"))]);
        book.apply_update(&update);
        let snap = Snapshot::capture(
            &book,
            20,
            &MarketId::new("lighter", "1"),
            &update,
            Utc.with_ymd_and_hms(2026, 2, 12, 14, 0, 1).unwrap(),
        );

        let batch = snapshots_to_batch(&[snap]).unwrap();
        let mid = batch
            .column_by_name("mid_price")
            .unwrap()
            .as_any()
            .downcast_ref::<Float64Array>()
            .unwrap();
        assert!(mid.is_null(0));
        let seq = batch
            .column_by_name("sequence_id")
            .unwrap()
            .as_any()
            .downcast_ref::<UInt64Array>()
            .unwrap();
        assert!(seq.is_null(0));
        let volume = batch
            .column_by_name("total_bid_volume")
            .unwrap()
            .as_any()
            .downcast_ref::<Float64Array>()
            .unwrap();
        assert_eq!(volume.value(0), 1.0);
    }

    #[test]
    fn test_empty_batch() {
        let batch = snapshots_to_batch(&[]).unwrap();
        assert_eq!(batch.num_rows(), 0);
    }
}
