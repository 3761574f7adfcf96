//! Binance diff-depth streams (`<symbol>@depth`), spot and USD-M futures.
//!
//! A local book is anchored with the REST depth endpoint, whose
//! `lastUpdateId` becomes the sequence baseline. Each stream event covers
//! update ids `U..=u`; futures events also carry `pu`, the previous event's
//! `u`.

use obrec_book::{DepthUpdate, Side};
use serde::Deserialize;

use super::{millis_to_utc, text_levels};
use crate::error::DecodeError;
use crate::traits::DepthDecoder;

const SPOT_WS_BASE: &str = "wss://stream.binance.com:9443";
const SPOT_REST_BASE: &str = "https://api.binance.com";
const FUTURES_WS_BASE: &str = "wss://fstream.binance.com";
const FUTURES_REST_BASE: &str = "https://fapi.binance.com";

/// Depth requested from the REST baseline endpoint
const BASELINE_LIMIT: u32 = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinanceMarket {
    Spot,
    Futures,
}

#[derive(Debug, Deserialize)]
struct DepthEvent {
    #[serde(rename = "E")]
    event_time: i64,
    #[serde(rename = "U")]
    first_update_id: u64,
    #[serde(rename = "u")]
    final_update_id: u64,
    #[serde(rename = "pu", default)]
    prev_final_update_id: Option<u64>,
    #[serde(rename = "b")]
    bids: Vec<[String; 2]>,
    #[serde(rename = "a")]
    asks: Vec<[String; 2]>,
}

#[derive(Debug, Deserialize)]
struct DepthSnapshot {
    #[serde(rename = "lastUpdateId")]
    last_update_id: u64,
    #[serde(rename = "E", default)]
    event_time: Option<i64>,
    bids: Vec<[String; 2]>,
    asks: Vec<[String; 2]>,
}

pub struct BinanceDepthDecoder {
    market: BinanceMarket,
    symbol: String,
    ws_base: String,
    rest_base: String,
}

impl BinanceDepthDecoder {
    pub fn new(market: BinanceMarket, symbol: &str) -> Self {
        let (ws_base, rest_base) = match market {
            BinanceMarket::Spot => (SPOT_WS_BASE, SPOT_REST_BASE),
            BinanceMarket::Futures => (FUTURES_WS_BASE, FUTURES_REST_BASE),
        };
        Self {
            market,
            symbol: symbol.trim().to_uppercase(),
            ws_base: ws_base.to_string(),
            rest_base: rest_base.to_string(),
        }
    }

    pub fn with_ws_base(mut self, base: Option<String>) -> Self {
        if let Some(base) = base {
            self.ws_base = base.trim_end_matches('/').to_string();
        }
        self
    }

    pub fn with_rest_base(mut self, base: Option<String>) -> Self {
        if let Some(base) = base {
            self.rest_base = base.trim_end_matches('/').to_string();
        }
        self
    }

    fn depth_path(&self) -> &'static str {
        match self.market {
            BinanceMarket::Spot => "/api/v3/depth",
            BinanceMarket::Futures => "/fapi/v1/depth",
        }
    }
}

impl DepthDecoder for BinanceDepthDecoder {
    fn venue(&self) -> &str {
        match self.market {
            BinanceMarket::Spot => "binance_spot",
            BinanceMarket::Futures => "binance_futures",
        }
    }

    fn symbol(&self) -> &str {
        &self.symbol
    }

    fn stream_url(&self) -> String {
        format!("{}/ws/{}@depth", self.ws_base, self.symbol.to_lowercase())
    }

    fn decode(&self, raw: &[u8]) -> Result<Option<DepthUpdate>, DecodeError> {
        let value: serde_json::Value = serde_json::from_slice(raw)?;
        // Subscription acks and anything else without the depth event tag
        if value.get("e").and_then(|e| e.as_str()) != Some("depthUpdate") {
            return Ok(None);
        }
        let event: DepthEvent = serde_json::from_value(value)?;

        let mut deltas = text_levels(Side::Bid, &event.bids)?;
        deltas.extend(text_levels(Side::Ask, &event.asks)?);

        // Futures chain on `pu`; the next expected id is pu + 1
        let first = match event.prev_final_update_id {
            Some(pu) => pu.saturating_add(1),
            None => event.first_update_id,
        };

        Ok(Some(
            DepthUpdate::delta("depthUpdate", deltas)
                .with_sequence(Some(first), Some(event.final_update_id))
                .with_event_time(millis_to_utc(event.event_time)),
        ))
    }

    fn baseline_url(&self) -> Option<String> {
        Some(format!(
            "{}{}?symbol={}&limit={}",
            self.rest_base,
            self.depth_path(),
            self.symbol,
            BASELINE_LIMIT
        ))
    }

    fn decode_baseline(&self, raw: &[u8]) -> Result<DepthUpdate, DecodeError> {
        let snapshot: DepthSnapshot = serde_json::from_slice(raw)?;
        let mut deltas = text_levels(Side::Bid, &snapshot.bids)?;
        deltas.extend(text_levels(Side::Ask, &snapshot.asks)?);
        Ok(DepthUpdate::snapshot("snapshot", deltas)
            .with_sequence(None, Some(snapshot.last_update_id))
            .with_event_time(snapshot.event_time.and_then(millis_to_utc)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use obrec_book::{LevelDelta, UpdateKind};
    use rust_decimal::Decimal;

    fn d(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    const SPOT_EVENT: &str = r#"{"e":"depthUpdate","E":1700000000123,"s":"BTCUSDT","U":157,"u":160,"b":[["0.0024","10"],["0.0023","0"]],"a":[["0.0026","100"]]}"#;

    #[test]
    fn test_stream_url() {
        let decoder = BinanceDepthDecoder::new(BinanceMarket::Spot, "btcusdt");
        assert_eq!(
            decoder.stream_url(),
            "wss://stream.binance.com:9443/ws/btcusdt@depth"
        );
        let futures = BinanceDepthDecoder::new(BinanceMarket::Futures, "ETHUSDT");
        assert_eq!(futures.stream_url(), "wss://fstream.binance.com/ws/ethusdt@depth");
    }

    #[test]
    fn test_decode_spot_event() {
        let decoder = BinanceDepthDecoder::new(BinanceMarket::Spot, "BTCUSDT");
        let update = decoder.decode(SPOT_EVENT.as_bytes()).unwrap().unwrap();

        assert_eq!(update.kind, UpdateKind::Delta);
        assert_eq!(update.event_type, "depthUpdate");
        assert_eq!(update.first_sequence, Some(157));
        assert_eq!(update.sequence, Some(160));
        assert_eq!(
            update.event_time.map(|t| t.timestamp_millis()),
            Some(1700000000123)
        );
        assert_eq!(
            update.deltas,
            vec![
                LevelDelta::bid(d("0.0024"), d("10")),
                LevelDelta::bid(d("0.0023"), d("0")),
                LevelDelta::ask(d("0.0026"), d("100")),
            ]
        );
    }

    #[test]
    fn test_decode_futures_uses_prev_id() {
        let decoder = BinanceDepthDecoder::new(BinanceMarket::Futures, "BTCUSDT");
        let raw = r#"{"e":"depthUpdate","E":1700000000000,"T":1700000000000,"s":"BTCUSDT","U":390,"u":400,"pu":389,"b":[["25000.10","1.5"]],"a":[]}"#;
        let update = decoder.decode(raw.as_bytes()).unwrap().unwrap();
        assert_eq!(update.first_sequence, Some(390));
        assert_eq!(update.sequence, Some(400));
    }

    #[test]
    fn test_control_frames_ignored() {
        let decoder = BinanceDepthDecoder::new(BinanceMarket::Spot, "BTCUSDT");
        assert!(decoder.decode(br#"{"result":null,"id":1}"#).unwrap().is_none());
    }

    #[test]
    fn test_malformed_messages() {
        let decoder = BinanceDepthDecoder::new(BinanceMarket::Spot, "BTCUSDT");
        assert!(matches!(decoder.decode(b"not json"), Err(DecodeError::Json(_))));

        let bad_price = r#"{"e":"depthUpdate","E":1,"U":1,"u":2,"b":[["abc","1"]],"a":[]}"#;
        assert!(matches!(
            decoder.decode(bad_price.as_bytes()),
            Err(DecodeError::InvalidLevel(_))
        ));

        let missing_ids = r#"{"e":"depthUpdate","E":1,"b":[],"a":[]}"#;
        assert!(decoder.decode(missing_ids.as_bytes()).is_err());
    }

    #[test]
    fn test_baseline() {
        let decoder = BinanceDepthDecoder::new(BinanceMarket::Spot, "BTCUSDT")
            .with_rest_base(Some("http://127.0.0.1:9000/".to_string()));
        assert_eq!(
            decoder.baseline_url().unwrap(),
            "http://127.0.0.1:9000/api/v3/depth?symbol=BTCUSDT&limit=1000"
        );

        let raw = r#"{"lastUpdateId":1027024,"bids":[["4.00000000","431.00000000"]],"asks":[["4.00000200","12.00000000"]]}"#;
        let update = decoder.decode_baseline(raw.as_bytes()).unwrap();
        assert!(update.is_snapshot());
        assert_eq!(update.sequence, Some(1027024));
        assert_eq!(update.deltas.len(), 2);
    }

    #[test]
    fn test_futures_baseline_url() {
        let decoder = BinanceDepthDecoder::new(BinanceMarket::Futures, "ethusdt");
        assert_eq!(
            decoder.baseline_url().unwrap(),
            "https://fapi.binance.com/fapi/v1/depth?symbol=ETHUSDT&limit=1000"
        );
    }
}
