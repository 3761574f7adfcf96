use std::path::PathBuf;

use obrec_book::{MarketId, Snapshot};

use crate::error::SinkError;
use crate::window::RotationWindow;

/// Result of a successful merge
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeOutcome {
    pub path: PathBuf,
    /// Rows added by this merge
    pub appended: usize,
    /// Rows in the window file after the merge
    pub total_records: usize,
}

/// Durable destination for buffered snapshots.
///
/// `merge` is blocking. Callers on an async runtime should run it on a
/// blocking thread. An empty batch returns `Ok(None)` without touching storage.
pub trait SnapshotSink: Send + Sync {
    fn merge(
        &self,
        market: &MarketId,
        window: RotationWindow,
        snapshots: &[Snapshot],
    ) -> Result<Option<MergeOutcome>, SinkError>;
}
