//! obrec-book: local order book replica
//!
//! Holds the per-market bid/ask levels reconstructed from a delta stream and
//! derives the immutable [`Snapshot`] emitted after every processed message.
//! Everything here is pure data; no I/O.

pub mod level;
pub mod snapshot;
pub mod store;
pub mod update;

pub use level::{MarketId, PriceLevel, Side};
pub use snapshot::Snapshot;
pub use store::BookStore;
pub use update::{DepthUpdate, LevelDelta, UpdateKind};
