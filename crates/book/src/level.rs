use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Side of the book
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Bid,
    Ask,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Bid => "bid",
            Side::Ask => "ask",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single price level. A size of zero in a delta means "remove".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceLevel {
    pub price: Decimal,
    pub size: Decimal,
}

impl PriceLevel {
    pub fn new(price: Decimal, size: Decimal) -> Self {
        Self { price, size }
    }

    /// Price times size, `None` if the product does not fit in a `Decimal`
    pub fn notional(&self) -> Option<Decimal> {
        self.price.checked_mul(self.size)
    }
}

/// Identifies one market on one venue, e.g. `binance_spot` / `BTCUSDT`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MarketId {
    pub exchange: String,
    pub symbol: String,
}

impl MarketId {
    pub fn new(exchange: impl Into<String>, symbol: impl Into<String>) -> Self {
        Self {
            exchange: exchange.into(),
            symbol: symbol.into(),
        }
    }

    /// Stable key used for adapter ids and file names: `{exchange}_{symbol}`
    pub fn key(&self) -> String {
        format!("{}_{}", self.exchange, self.symbol)
    }
}

impl fmt::Display for MarketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.exchange, self.symbol)
    }
}
