use std::sync::Arc;

use async_trait::async_trait;
use obrec_book::{DepthUpdate, Snapshot};
use tokio::sync::{mpsc, watch};

use crate::error::{AdapterError, ConnectorError, DecodeError};
use crate::stats::AdapterStats;

/// Transport for one market stream (WebSocket, test channel, etc.)
#[async_trait]
pub trait Connector: Send {
    /// Open a session. The returned channel yields raw frames and closes when
    /// the session ends, which the adapter treats as a lost connection.
    async fn connect(&mut self) -> Result<mpsc::Receiver<Vec<u8>>, ConnectorError>;

    /// Tear down the current session, if any
    async fn close(&mut self) -> Result<(), ConnectorError>;
}

/// Venue-specific wire format.
pub trait DepthDecoder: Send + Sync {
    /// Venue name used in ids, file paths and metric labels
    fn venue(&self) -> &str;

    /// Market symbol as it appears in file paths
    fn symbol(&self) -> &str;

    fn stream_url(&self) -> String;

    /// Frames sent right after the handshake
    fn subscribe_messages(&self) -> Vec<String> {
        Vec::new()
    }

    /// Parse one frame. `Ok(None)` means a control frame (ack, heartbeat)
    /// that carries no book data.
    fn decode(&self, raw: &[u8]) -> Result<Option<DepthUpdate>, DecodeError>;

    /// REST endpoint returning a full depth snapshot, for venues that have one
    fn baseline_url(&self) -> Option<String> {
        None
    }

    fn decode_baseline(&self, _raw: &[u8]) -> Result<DepthUpdate, DecodeError> {
        Err(DecodeError::Unsupported("baseline"))
    }
}

/// Uniform interface the supervisor drives every venue adapter through.
#[async_trait]
pub trait VenueAdapter: Send {
    fn id(&self) -> &str;

    /// Messages applied to the book so far
    fn message_count(&self) -> u64;

    /// Snapshots waiting to be persisted
    fn buffer_depth(&self) -> usize;

    fn stats(&self) -> Arc<AdapterStats>;

    /// Latest snapshot, for display
    fn subscribe(&self) -> watch::Receiver<Option<Snapshot>>;

    /// Start the connection task. Fails if already started.
    fn connect(&mut self) -> Result<(), AdapterError>;

    /// Persist whatever is buffered now. Returns the number of snapshots
    /// written; 0 when there was nothing to flush or the task is not running.
    async fn flush_buffer(&mut self) -> Result<usize, AdapterError>;

    /// Cancel the connection task and wait for it to finish. Idempotent.
    async fn stop(&mut self) -> Result<(), AdapterError>;
}
