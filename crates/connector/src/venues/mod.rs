//! Venue wire formats.

pub mod binance;
pub mod generic;
pub mod lighter;

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use obrec_book::{LevelDelta, Side};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{ConnectorError, DecodeError};
use crate::traits::DepthDecoder;

pub use binance::{BinanceDepthDecoder, BinanceMarket};
pub use generic::GenericDepthDecoder;
pub use lighter::LighterDepthDecoder;

/// Supported venues
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VenueKind {
    BinanceSpot,
    BinanceFutures,
    Lighter,
    Generic,
}

impl VenueKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            VenueKind::BinanceSpot => "binance_spot",
            VenueKind::BinanceFutures => "binance_futures",
            VenueKind::Lighter => "lighter",
            VenueKind::Generic => "generic",
        }
    }
}

impl fmt::Display for VenueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VenueKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "binance_spot" => Ok(VenueKind::BinanceSpot),
            "binance_futures" => Ok(VenueKind::BinanceFutures),
            "lighter" => Ok(VenueKind::Lighter),
            "generic" => Ok(VenueKind::Generic),
            other => Err(format!("unknown venue: {}", other)),
        }
    }
}

/// Endpoint overrides for a decoder
#[derive(Debug, Clone, Default)]
pub struct Endpoints {
    pub ws_url: Option<String>,
    pub rest_url: Option<String>,
    /// Frames sent after connecting, for generic feeds
    pub subscribe: Vec<String>,
}

/// Build the decoder for one market on a venue.
pub fn decoder_for(
    kind: VenueKind,
    symbol: &str,
    endpoints: Endpoints,
) -> Result<Box<dyn DepthDecoder>, ConnectorError> {
    let decoder: Box<dyn DepthDecoder> = match kind {
        VenueKind::BinanceSpot => Box::new(
            BinanceDepthDecoder::new(BinanceMarket::Spot, symbol)
                .with_ws_base(endpoints.ws_url)
                .with_rest_base(endpoints.rest_url),
        ),
        VenueKind::BinanceFutures => Box::new(
            BinanceDepthDecoder::new(BinanceMarket::Futures, symbol)
                .with_ws_base(endpoints.ws_url)
                .with_rest_base(endpoints.rest_url),
        ),
        VenueKind::Lighter => {
            let market_id = symbol
                .trim()
                .parse::<u32>()
                .map_err(|_| ConnectorError::Config(format!("invalid lighter market id: {}", symbol)))?;
            Box::new(LighterDepthDecoder::new(market_id).with_ws_url(endpoints.ws_url))
        }
        VenueKind::Generic => {
            let url = endpoints.ws_url.ok_or_else(|| {
                ConnectorError::Config(format!("generic venue needs ws_url for {}", symbol))
            })?;
            Box::new(GenericDepthDecoder::new(symbol, url).with_subscriptions(endpoints.subscribe))
        }
    };
    Ok(decoder)
}

/// Parse a decimal from its wire text, accepting scientific notation.
pub(crate) fn parse_decimal(text: &str) -> Result<Decimal, DecodeError> {
    let text = text.trim();
    let parsed = if text.contains(['e', 'E']) {
        Decimal::from_scientific(text)
    } else {
        Decimal::from_str(text)
    };
    parsed.map_err(|e| DecodeError::InvalidLevel(format!("{}: {}", text, e)))
}

/// Decimal from a JSON string or number
pub(crate) fn json_decimal(value: &serde_json::Value) -> Result<Decimal, DecodeError> {
    match value {
        serde_json::Value::String(s) => parse_decimal(s),
        serde_json::Value::Number(n) => parse_decimal(&n.to_string()),
        other => Err(DecodeError::InvalidLevel(format!("not a number: {}", other))),
    }
}

/// Validated level delta: price must be positive, size non-negative.
pub(crate) fn level(side: Side, price: Decimal, size: Decimal) -> Result<LevelDelta, DecodeError> {
    if price <= Decimal::ZERO {
        return Err(DecodeError::InvalidLevel(format!("non-positive price {}", price)));
    }
    if size < Decimal::ZERO {
        return Err(DecodeError::InvalidLevel(format!("negative size {} at {}", size, price)));
    }
    Ok(LevelDelta::new(side, price, size))
}

/// Text `[price, size]` pairs, as Binance sends them
pub(crate) fn text_levels(side: Side, pairs: &[[String; 2]]) -> Result<Vec<LevelDelta>, DecodeError> {
    pairs
        .iter()
        .map(|[price, size]| level(side, parse_decimal(price)?, parse_decimal(size)?))
        .collect()
}

pub(crate) fn millis_to_utc(ms: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp_millis(ms)
}
