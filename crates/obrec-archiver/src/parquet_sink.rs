use std::fs::{self, File};
use std::path::{Path, PathBuf};

use arrow::datatypes::SchemaRef;
use arrow::record_batch::RecordBatch;
use obrec_book::{MarketId, Snapshot};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ArrowWriter;
use parquet::basic::{Compression, ZstdLevel};
use parquet::file::metadata::KeyValue;
use parquet::file::properties::{EnabledStatistics, WriterProperties};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::SinkError;
use crate::schema::{self, SCHEMA_NAME, SCHEMA_VERSION};
use crate::sink::{MergeOutcome, SnapshotSink};
use crate::window::RotationWindow;

/// Parquet column compression
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SinkCompression {
    #[default]
    Snappy,
    Zstd,
    None,
}

impl SinkCompression {
    fn to_parquet(self) -> Compression {
        match self {
            SinkCompression::Snappy => Compression::SNAPPY,
            SinkCompression::Zstd => Compression::ZSTD(ZstdLevel::default()),
            SinkCompression::None => Compression::UNCOMPRESSED,
        }
    }
}

/// Writes one parquet file per market and hour under `base_path`:
/// `{base}/{exchange}/{symbol}/{exchange}_orderbook_{symbol}_{YYYY_MM_DD_HH}.parquet`
#[derive(Debug, Clone)]
pub struct ParquetSink {
    base_path: PathBuf,
    compression: SinkCompression,
}

impl ParquetSink {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
            compression: SinkCompression::default(),
        }
    }

    pub fn with_compression(mut self, compression: SinkCompression) -> Self {
        self.compression = compression;
        self
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    pub fn window_path(&self, market: &MarketId, window: RotationWindow) -> PathBuf {
        let filename = format!(
            "{}_orderbook_{}_{}.parquet",
            market.exchange,
            market.symbol,
            window.label()
        );
        self.base_path
            .join(&market.exchange)
            .join(&market.symbol)
            .join(filename)
    }

    fn writer_properties(&self) -> WriterProperties {
        WriterProperties::builder()
            .set_compression(self.compression.to_parquet())
            .set_max_row_group_size(100_000)
            .set_statistics_enabled(EnabledStatistics::Chunk)
            .set_created_by("obrec-archiver".to_string())
            .set_key_value_metadata(Some(vec![
                KeyValue::new("obrec.schema_name".to_string(), SCHEMA_NAME.to_string()),
                KeyValue::new("obrec.schema_version".to_string(), SCHEMA_VERSION.to_string()),
            ]))
            .build()
    }

    /// Existing rows re-bound to the current schema, or a mismatch error.
    fn load_existing(&self, path: &Path, expected: &SchemaRef) -> Result<Vec<RecordBatch>, SinkError> {
        let batches = read_window(path)?;
        let expected_names: Vec<&String> = expected.fields().iter().map(|f| f.name()).collect();

        let mut rebound = Vec::with_capacity(batches.len());
        for batch in batches {
            let schema = batch.schema();
            let names: Vec<&String> = schema.fields().iter().map(|f| f.name()).collect();
            if names != expected_names {
                return Err(SinkError::SchemaMismatch {
                    path: path.display().to_string(),
                    reason: format!("columns {:?}", names),
                });
            }
            let batch = RecordBatch::try_new(expected.clone(), batch.columns().to_vec()).map_err(
                |e| SinkError::SchemaMismatch {
                    path: path.display().to_string(),
                    reason: e.to_string(),
                },
            )?;
            rebound.push(batch);
        }
        Ok(rebound)
    }

    fn write_file(
        &self,
        path: &Path,
        schema: &SchemaRef,
        batches: &[RecordBatch],
    ) -> Result<(), SinkError> {
        let file = File::create(path)?;
        let mut writer = ArrowWriter::try_new(file, schema.clone(), Some(self.writer_properties()))?;
        for batch in batches {
            writer.write(batch)?;
        }
        writer.close()?;
        Ok(())
    }
}

impl SnapshotSink for ParquetSink {
    fn merge(
        &self,
        market: &MarketId,
        window: RotationWindow,
        snapshots: &[Snapshot],
    ) -> Result<Option<MergeOutcome>, SinkError> {
        if snapshots.is_empty() {
            return Ok(None);
        }

        let final_path = self.window_path(market, window);
        if let Some(dir) = final_path.parent() {
            fs::create_dir_all(dir)?;
        }

        let schema = schema::snapshot_schema();
        let mut batches = if final_path.exists() {
            self.load_existing(&final_path, &schema)?
        } else {
            Vec::new()
        };
        let existing_rows: usize = batches.iter().map(|b| b.num_rows()).sum();
        batches.push(schema::snapshots_to_batch(snapshots)?);

        let tmp_path = final_path.with_extension("parquet.tmp");
        if let Err(e) = self.write_file(&tmp_path, &schema, &batches) {
            if let Err(cleanup) = fs::remove_file(&tmp_path) {
                warn!(path = ?tmp_path, error = %cleanup, "Failed to remove partial file");
            }
            return Err(e);
        }

        // Atomic rename from .tmp to final name
        fs::rename(&tmp_path, &final_path)?;

        let outcome = MergeOutcome {
            path: final_path,
            appended: snapshots.len(),
            total_records: existing_rows + snapshots.len(),
        };
        debug!(
            market = %market,
            window = %window,
            appended = outcome.appended,
            total = outcome.total_records,
            "Merged snapshots into window file"
        );
        Ok(Some(outcome))
    }
}

/// Read every batch of a window file.
pub fn read_window(path: &Path) -> Result<Vec<RecordBatch>, SinkError> {
    let file = File::open(path)?;
    let reader = ParquetRecordBatchReaderBuilder::try_new(file)?.build()?;
    let batches = reader.collect::<Result<Vec<_>, _>>()?;
    Ok(batches)
}
