use obrec_connector_lib::ConnectorError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration error: {0}")]
    Invalid(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

#[derive(Error, Debug)]
pub enum RecorderError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Adapter setup failed: {0}")]
    Connector(#[from] ConnectorError),

    #[error("Recorder already started")]
    AlreadyStarted,
}
