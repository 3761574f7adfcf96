//! obrec-archiver: snapshot persistence
//!
//! Merges batches of order book snapshots into one parquet file per market
//! and UTC hour. Merges append to whatever the window file already holds, so
//! retrying a failed flush can duplicate rows but never drops them.

pub mod error;
pub mod parquet_sink;
pub mod schema;
pub mod sink;
pub mod window;

pub use error::SinkError;
pub use parquet_sink::{read_window, ParquetSink, SinkCompression};
pub use sink::{MergeOutcome, SnapshotSink};
pub use window::RotationWindow;
