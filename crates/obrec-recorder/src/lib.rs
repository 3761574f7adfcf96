//! obrec-recorder: runs one order book adapter per configured market and
//! persists their snapshots until stopped.

pub mod config;
pub mod display;
pub mod error;
pub mod factory;
pub mod report;
pub mod supervisor;

pub use config::{parse_duration, Config, ReportConfig, StorageConfig, VenueConfig};
pub use error::{ConfigError, RecorderError};
pub use factory::build_adapters;
pub use report::{AdapterReport, RecorderReport};
pub use supervisor::{ConsoleReporter, RecorderSupervisor, ReportSink, SupervisorOptions};
