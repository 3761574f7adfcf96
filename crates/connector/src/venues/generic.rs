//! Canonical depth message shape, for feeds normalised upstream:
//!
//! ```json
//! {"event_type": "depthUpdate", "bids": [["100.5", "1"]], "asks": [{"price": 101, "size": 2}],
//!  "sequence_id": 42, "first_sequence_id": 40, "event_time": 1700000000000, "snapshot": false}
//! ```

use obrec_book::{DepthUpdate, LevelDelta, Side};
use serde::Deserialize;

use super::{json_decimal, level, millis_to_utc};
use crate::error::DecodeError;
use crate::traits::DepthDecoder;

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawLevel {
    Pair([serde_json::Value; 2]),
    Object {
        price: serde_json::Value,
        size: serde_json::Value,
    },
}

impl RawLevel {
    fn to_delta(&self, side: Side) -> Result<LevelDelta, DecodeError> {
        let (price, size) = match self {
            RawLevel::Pair([price, size]) => (price, size),
            RawLevel::Object { price, size } => (price, size),
        };
        level(side, json_decimal(price)?, json_decimal(size)?)
    }
}

#[derive(Debug, Deserialize)]
struct GenericMessage {
    event_type: Option<String>,
    #[serde(default)]
    bids: Vec<RawLevel>,
    #[serde(default)]
    asks: Vec<RawLevel>,
    #[serde(default)]
    sequence_id: Option<u64>,
    #[serde(default)]
    first_sequence_id: Option<u64>,
    #[serde(default)]
    event_time: Option<i64>,
    #[serde(default)]
    snapshot: bool,
}

pub struct GenericDepthDecoder {
    symbol: String,
    url: String,
    subscriptions: Vec<String>,
}

impl GenericDepthDecoder {
    pub fn new(symbol: &str, url: impl Into<String>) -> Self {
        Self {
            symbol: symbol.trim().to_string(),
            url: url.into(),
            subscriptions: Vec::new(),
        }
    }

    pub fn with_subscriptions(mut self, subscriptions: Vec<String>) -> Self {
        self.subscriptions = subscriptions;
        self
    }
}

impl DepthDecoder for GenericDepthDecoder {
    fn venue(&self) -> &str {
        "generic"
    }

    fn symbol(&self) -> &str {
        &self.symbol
    }

    fn stream_url(&self) -> String {
        self.url.clone()
    }

    fn subscribe_messages(&self) -> Vec<String> {
        self.subscriptions.clone()
    }

    fn decode(&self, raw: &[u8]) -> Result<Option<DepthUpdate>, DecodeError> {
        let msg: GenericMessage = serde_json::from_slice(raw)?;
        let event_type = msg.event_type.ok_or(DecodeError::MissingField("event_type"))?;

        let mut deltas = Vec::with_capacity(msg.bids.len() + msg.asks.len());
        for raw in &msg.bids {
            deltas.push(raw.to_delta(Side::Bid)?);
        }
        for raw in &msg.asks {
            deltas.push(raw.to_delta(Side::Ask)?);
        }

        let update = if msg.snapshot {
            DepthUpdate::snapshot(event_type, deltas)
        } else {
            DepthUpdate::delta(event_type, deltas)
        };
        Ok(Some(
            update
                .with_sequence(msg.first_sequence_id, msg.sequence_id)
                .with_event_time(msg.event_time.and_then(millis_to_utc)),
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

    fn decoder() -> GenericDepthDecoder {
        GenericDepthDecoder::new("TEST", "ws://127.0.0.1:1/feed")
    }

    #[test]
    fn test_pairs_and_objects() {
        let raw = r#"{"event_type":"depthUpdate","bids":[["100","1"],[99.5,2]],"asks":[{"price":"101","size":0.5}],"sequence_id":7,"event_time":1700000000000}"#;
        let update = decoder().decode(raw.as_bytes()).unwrap().unwrap();

        assert_eq!(
            update.deltas,
            vec![
                LevelDelta::bid(d("100"), d("1")),
                LevelDelta::bid(d("99.5"), d("2")),
                LevelDelta::ask(d("101"), d("0.5")),
            ]
        );
        assert_eq!(update.sequence, Some(7));
        assert_eq!(update.first_sequence, None);
        assert!(!update.is_snapshot());
    }

    #[test]
    fn test_optional_fields() {
        let update = decoder()
            .decode(br#"{"event_type":"depthUpdate"}"#)
            .unwrap()
            .unwrap();
        assert!(update.deltas.is_empty());
        assert_eq!(update.sequence, None);
        assert_eq!(update.event_time, None);
    }

    #[test]
    fn test_snapshot_flag() {
        let update = decoder()
            .decode(br#"{"event_type":"snapshot","snapshot":true,"bids":[["1","1"]]}"#)
            .unwrap()
            .unwrap();
        assert!(update.is_snapshot());
    }

    #[test]
    fn test_rejects_malformed() {
        assert!(matches!(
            decoder().decode(br#"{"bids":[]}"#),
            Err(DecodeError::MissingField("event_type"))
        ));
        assert!(matches!(
            decoder().decode(br#"{"event_type":"x","bids":[["-1","1"]]}"#),
            Err(DecodeError::InvalidLevel(_))
        ));
        assert!(decoder().decode(br#"{"event_type":"x","bids":[["1"]]}"#).is_err());
        assert!(decoder().decode(b"{").is_err());
    }

    #[test]
    fn test_subscriptions() {
        assert!(decoder().subscribe_messages().is_empty());
        let decoder = decoder().with_subscriptions(vec!["{\"op\":\"sub\"}".to_string()]);
        assert_eq!(decoder.venue(), "generic");
        assert_eq!(decoder.subscribe_messages().len(), 1);
    }
}
