use obrec_archiver::SinkError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConnectorError {
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("connection failed: {0}")]
    ConnectionFailed(String),
    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
    #[error("subscribe failed: {0}")]
    SubscribeFailed(String),
    #[error("disconnected: {0}")]
    Disconnected(String),
}

/// A single inbound message could not be turned into a depth update.
#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("invalid json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("missing field: {0}")]
    MissingField(&'static str),
    #[error("invalid level: {0}")]
    InvalidLevel(String),
    #[error("unsupported: {0}")]
    Unsupported(&'static str),
}

/// Baseline (REST depth snapshot) fetch failure
#[derive(Error, Debug)]
pub enum BaselineError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("decode failed: {0}")]
    Decode(#[from] DecodeError),
    #[error("venue has no baseline endpoint")]
    Unavailable,
}

#[derive(Error, Debug)]
pub enum AdapterError {
    #[error("adapter {0} already started")]
    AlreadyStarted(String),
    #[error("flush failed: {0}")]
    Flush(#[from] SinkError),
    #[error("adapter task failed: {0}")]
    Task(String),
}
