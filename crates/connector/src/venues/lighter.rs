//! Lighter `order_book/{market_id}` channel.
//!
//! The first frame after subscribing (`subscribed/order_book`) carries the
//! full book; `update/order_book` frames carry level changes where size "0"
//! removes the level. `offset` grows monotonically but is not contiguous.

use obrec_book::{DepthUpdate, LevelDelta, Side};
use serde::Deserialize;

use super::{json_decimal, level, millis_to_utc};
use crate::error::DecodeError;
use crate::traits::DepthDecoder;

const DEFAULT_WS_URL: &str = "wss://mainnet.zklighter.elliot.ai/stream";

#[derive(Debug, Deserialize)]
struct OrderBookFrame {
    #[serde(rename = "type")]
    frame_type: String,
    #[serde(default)]
    timestamp: Option<i64>,
    order_book: Option<OrderBook>,
}

#[derive(Debug, Deserialize)]
struct OrderBook {
    #[serde(default)]
    offset: Option<u64>,
    #[serde(default)]
    bids: Vec<Level>,
    #[serde(default)]
    asks: Vec<Level>,
}

#[derive(Debug, Deserialize)]
struct Level {
    price: serde_json::Value,
    size: serde_json::Value,
}

fn levels(side: Side, raw: &[Level]) -> Result<Vec<LevelDelta>, DecodeError> {
    raw.iter()
        .map(|l| level(side, json_decimal(&l.price)?, json_decimal(&l.size)?))
        .collect()
}

pub struct LighterDepthDecoder {
    market_id: u32,
    symbol: String,
    ws_url: String,
}

impl LighterDepthDecoder {
    pub fn new(market_id: u32) -> Self {
        Self {
            market_id,
            symbol: market_id.to_string(),
            ws_url: DEFAULT_WS_URL.to_string(),
        }
    }

    pub fn with_ws_url(mut self, url: Option<String>) -> Self {
        if let Some(url) = url {
            self.ws_url = url;
        }
        self
    }
}

impl DepthDecoder for LighterDepthDecoder {
    fn venue(&self) -> &str {
        "lighter"
    }

    fn symbol(&self) -> &str {
        &self.symbol
    }

    fn stream_url(&self) -> String {
        self.ws_url.clone()
    }

    fn subscribe_messages(&self) -> Vec<String> {
        vec![serde_json::json!({
            "type": "subscribe",
            "channel": format!("order_book/{}", self.market_id),
        })
        .to_string()]
    }

    fn decode(&self, raw: &[u8]) -> Result<Option<DepthUpdate>, DecodeError> {
        let frame: OrderBookFrame = serde_json::from_slice(raw)?;
        let is_snapshot = match frame.frame_type.as_str() {
            "subscribed/order_book" => true,
            "update/order_book" => false,
            // connected, ping, pong and other channels
            _ => return Ok(None),
        };
        let book = frame.order_book.ok_or(DecodeError::MissingField("order_book"))?;

        let mut deltas = levels(Side::Bid, &book.bids)?;
        deltas.extend(levels(Side::Ask, &book.asks)?);

        let update = if is_snapshot {
            DepthUpdate::snapshot(frame.frame_type, deltas)
        } else {
            DepthUpdate::delta(frame.frame_type, deltas)
        };
        Ok(Some(
            update
                .with_sequence(None, book.offset)
                .with_event_time(frame.timestamp.and_then(millis_to_utc)),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    fn d(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    #[test]
    fn test_subscribe_message() {
        let decoder = LighterDepthDecoder::new(1);
        let msgs = decoder.subscribe_messages();
        assert_eq!(msgs.len(), 1);
        let value: serde_json::Value = serde_json::from_str(&msgs[0]).unwrap();
        assert_eq!(value["type"], "subscribe");
        assert_eq!(value["channel"], "order_book/1");
        assert_eq!(decoder.symbol(), "1");
    }

    #[test]
    fn test_decode_initial_snapshot() {
        let decoder = LighterDepthDecoder::new(1);
        let raw = r#"{"channel":"order_book:1","offset":41692864,"order_book":{"code":0,"asks":[{"price":"3327.46","size":"29.0915"}],"bids":[{"price":"3327.10","size":"1.5"},{"price":"3326.90","size":"2"}],"offset":41692864},"type":"subscribed/order_book"}"#;
        let update = decoder.decode(raw.as_bytes()).unwrap().unwrap();

        assert!(update.is_snapshot());
        assert_eq!(update.sequence, Some(41692864));
        assert_eq!(update.first_sequence, None);
        assert_eq!(update.deltas.len(), 3);
        assert_eq!(update.deltas[2], LevelDelta::ask(d("3327.46"), d("29.0915")));
    }

    #[test]
    fn test_decode_update() {
        let decoder = LighterDepthDecoder::new(1);
        let raw = r#"{"channel":"order_book:1","order_book":{"asks":[{"price":"3327.46","size":"0"}],"bids":[],"offset":41692900},"timestamp":1700000000000,"type":"update/order_book"}"#;
        let update = decoder.decode(raw.as_bytes()).unwrap().unwrap();

        assert!(!update.is_snapshot());
        assert_eq!(update.event_type, "update/order_book");
        assert_eq!(update.deltas, vec![LevelDelta::ask(d("3327.46"), Decimal::ZERO)]);
        assert!(update.event_time.is_some());
    }

    #[test]
    fn test_control_frames_ignored() {
        let decoder = LighterDepthDecoder::new(1);
        assert!(decoder.decode(br#"{"type":"connected","session_id":"abc"}"#).unwrap().is_none());
        assert!(decoder.decode(br#"{"type":"ping"}"#).unwrap().is_none());
    }

    #[test]
    fn test_update_without_book_is_error() {
        let decoder = LighterDepthDecoder::new(1);
        assert!(matches!(
            decoder.decode(br#"{"type":"update/order_book"}"#),
            Err(DecodeError::MissingField("order_book"))
        ));
    }
}
