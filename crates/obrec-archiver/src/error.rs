use thiserror::Error;

#[derive(Error, Debug)]
pub enum SinkError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    #[error("Parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    #[error("Schema mismatch in {path}: {reason}")]
    SchemaMismatch { path: String, reason: String },

    #[error("Flush task failed: {0}")]
    Task(String),

    #[error("Sink unavailable: {0}")]
    Unavailable(String),
}
