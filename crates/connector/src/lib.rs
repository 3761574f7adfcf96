//! obrec-connector: venue adapters for order book replication
//!
//! Each adapter owns one market: it streams depth updates over a
//! [`Connector`], decodes them with a venue [`DepthDecoder`], applies them to
//! a local book and buffers the resulting snapshots for a
//! [`obrec_archiver::SnapshotSink`].

pub mod adapter;
pub mod backoff;
pub mod baseline;
pub mod buffer;
pub mod error;
pub mod metrics;
pub mod sequence;
pub mod server;
pub mod stats;
pub mod traits;
pub mod venues;
pub mod websocket;

pub use adapter::{AdapterConfig, AdapterHandle, OrderbookAdapter};
pub use backoff::{Backoff, BackoffPolicy};
pub use buffer::SnapshotBuffer;
pub use error::{AdapterError, BaselineError, ConnectorError, DecodeError};
pub use sequence::{SequenceCheck, SequencePolicy, SequenceTracker};
pub use server::{create_router, run_server, ServerState};
pub use stats::{AdapterStats, ConnectionState, StatsSample};
pub use traits::{Connector, DepthDecoder, VenueAdapter};
pub use venues::{decoder_for, Endpoints, VenueKind};
pub use websocket::WebSocketConnector;
