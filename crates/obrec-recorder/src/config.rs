use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use obrec_archiver::SinkCompression;
use obrec_connector_lib::{AdapterConfig, BackoffPolicy, Endpoints, SequencePolicy, VenueKind};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Recorder configuration. Every field has a default, so an empty file
/// records Binance spot and futures for BTCUSDT and ETHUSDT.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub storage: StorageConfig,
    /// Persist snapshots. When false adapters only maintain books.
    pub recording: bool,
    pub report: ReportConfig,
    pub venues: Vec<VenueConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub path: PathBuf,
    pub compression: SinkCompression,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    /// Aggregate statistics interval, e.g. "30s"
    pub interval: String,
    /// Book rendering interval when display is enabled
    pub display_interval: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VenueConfig {
    pub venue: VenueKind,
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Market symbols; Lighter takes numeric market ids
    #[serde(default)]
    pub symbols: Vec<String>,
    #[serde(default = "default_depth_levels")]
    pub depth_levels: usize,
    /// Snapshots per flush batch
    #[serde(default = "default_buffer_size")]
    pub buffer_size: usize,
    #[serde(default = "default_flush_interval")]
    pub flush_interval: String,
    /// Buffer capacity before the oldest snapshots are dropped
    #[serde(default = "default_max_buffer")]
    pub max_buffer: usize,
    #[serde(default)]
    pub ws_url: Option<String>,
    #[serde(default)]
    pub rest_url: Option<String>,
    /// Frames sent after connecting (generic venue only)
    #[serde(default)]
    pub subscribe: Vec<String>,
    #[serde(default)]
    pub sequence_policy: SequencePolicy,
    #[serde(default = "default_reconnect_initial")]
    pub reconnect_initial: String,
    #[serde(default = "default_reconnect_max")]
    pub reconnect_max: String,
}

fn default_true() -> bool {
    true
}

fn default_depth_levels() -> usize {
    20
}

fn default_buffer_size() -> usize {
    1000
}

fn default_flush_interval() -> String {
    "5s".to_string()
}

fn default_max_buffer() -> usize {
    10_000
}

fn default_reconnect_initial() -> String {
    "1s".to_string()
}

fn default_reconnect_max() -> String {
    "60s".to_string()
}

impl Default for Config {
    fn default() -> Self {
        let majors = vec!["BTCUSDT".to_string(), "ETHUSDT".to_string()];
        Self {
            storage: StorageConfig::default(),
            recording: true,
            report: ReportConfig::default(),
            venues: vec![
                VenueConfig::new(VenueKind::BinanceSpot, majors.clone()),
                VenueConfig::new(VenueKind::BinanceFutures, majors),
                VenueConfig {
                    enabled: false,
                    depth_levels: 10,
                    buffer_size: 500,
                    flush_interval: "3s".to_string(),
                    ..VenueConfig::new(VenueKind::Lighter, vec!["1".to_string(), "2".to_string()])
                },
            ],
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("orderbook_data"),
            compression: SinkCompression::Snappy,
        }
    }
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            interval: "30s".to_string(),
            display_interval: "1s".to_string(),
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(&content)?)
    }

    /// Enable only the listed venues
    pub fn restrict_venues(&mut self, venues: &[VenueKind]) {
        for venue in &mut self.venues {
            venue.enabled = venues.contains(&venue.venue);
        }
    }

    /// Replace symbol lists. Lighter keeps its market ids.
    pub fn override_symbols(&mut self, symbols: &[String]) {
        for venue in &mut self.venues {
            if venue.venue != VenueKind::Lighter {
                venue.symbols = symbols.to_vec();
            }
        }
    }

    pub fn enabled_venues(&self) -> impl Iterator<Item = &VenueConfig> {
        self.venues.iter().filter(|v| v.enabled)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.report.interval()?;
        self.report.display_interval()?;

        let mut seen = HashSet::new();
        let mut enabled = 0;
        for venue in self.enabled_venues() {
            venue.validate()?;
            for symbol in &venue.symbols {
                if !seen.insert((venue.venue, symbol.to_uppercase())) {
                    return Err(ConfigError::Invalid(format!(
                        "{} {} configured twice",
                        venue.venue, symbol
                    )));
                }
            }
            enabled += 1;
        }
        if enabled == 0 {
            return Err(ConfigError::Invalid("No venue enabled".to_string()));
        }
        Ok(())
    }
}

impl ReportConfig {
    pub fn interval(&self) -> Result<Duration, ConfigError> {
        parse_duration(&self.interval)
    }

    pub fn display_interval(&self) -> Result<Duration, ConfigError> {
        parse_duration(&self.display_interval)
    }
}

impl VenueConfig {
    pub fn new(venue: VenueKind, symbols: Vec<String>) -> Self {
        Self {
            venue,
            enabled: true,
            symbols,
            depth_levels: default_depth_levels(),
            buffer_size: default_buffer_size(),
            flush_interval: default_flush_interval(),
            max_buffer: default_max_buffer(),
            ws_url: None,
            rest_url: None,
            subscribe: Vec::new(),
            sequence_policy: SequencePolicy::default(),
            reconnect_initial: default_reconnect_initial(),
            reconnect_max: default_reconnect_max(),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: String| Err(ConfigError::Invalid(format!("{}: {}", self.venue, msg)));

        if self.symbols.is_empty() {
            return invalid("no symbols".to_string());
        }
        if self.depth_levels == 0 {
            return invalid("depth_levels must be greater than zero".to_string());
        }
        if self.buffer_size == 0 {
            return invalid("buffer_size must be greater than zero".to_string());
        }
        if self.max_buffer < self.buffer_size {
            return invalid(format!(
                "max_buffer {} is below buffer_size {}",
                self.max_buffer, self.buffer_size
            ));
        }
        if self.venue == VenueKind::Generic && self.ws_url.is_none() {
            return invalid("ws_url is required".to_string());
        }
        if self.venue == VenueKind::Lighter {
            if let Some(bad) = self.symbols.iter().find(|s| s.trim().parse::<u32>().is_err()) {
                return invalid(format!("invalid market id {}", bad));
            }
        }

        self.flush_interval()?;
        let backoff = self.backoff()?;
        if backoff.max < backoff.initial {
            return invalid("reconnect_max is below reconnect_initial".to_string());
        }
        Ok(())
    }

    pub fn flush_interval(&self) -> Result<Duration, ConfigError> {
        parse_duration(&self.flush_interval)
    }

    pub fn backoff(&self) -> Result<BackoffPolicy, ConfigError> {
        Ok(BackoffPolicy {
            initial: parse_duration(&self.reconnect_initial)?,
            max: parse_duration(&self.reconnect_max)?,
            multiplier: 2,
        })
    }

    pub fn adapter_config(&self, record: bool) -> Result<AdapterConfig, ConfigError> {
        Ok(AdapterConfig {
            depth_levels: self.depth_levels,
            batch_size: self.buffer_size,
            flush_interval: self.flush_interval()?,
            max_buffer: self.max_buffer,
            record,
            sequence_policy: self.sequence_policy,
            backoff: self.backoff()?,
        })
    }

    pub fn endpoints(&self) -> Endpoints {
        Endpoints {
            ws_url: self.ws_url.clone(),
            rest_url: self.rest_url.clone(),
            subscribe: self.subscribe.clone(),
        }
    }
}

/// Parse duration strings like "500ms", "5s", "15m", "1h", "1d"
pub fn parse_duration(s: &str) -> Result<Duration, ConfigError> {
    let s = s.trim();
    if s.is_empty() {
        return Err(ConfigError::Invalid("Empty duration".to_string()));
    }

    let (num_str, unit) = match s.strip_suffix("ms") {
        Some(num) => (num, "ms"),
        None => {
            let split = s.len() - s.chars().last().map_or(0, char::len_utf8);
            s.split_at(split)
        }
    };
    let num: u64 = num_str
        .trim()
        .parse()
        .map_err(|_| ConfigError::Invalid(format!("Invalid duration: {}", s)))?;

    if num == 0 {
        return Err(ConfigError::Invalid(format!(
            "Duration must be greater than zero: {}",
            s
        )));
    }

    let secs_per_unit: u64 = match unit {
        "ms" => return Ok(Duration::from_millis(num)),
        "s" => 1,
        "m" => 60,
        "h" => 60 * 60,
        "d" => 60 * 60 * 24,
        _ => return Err(ConfigError::Invalid(format!("Unknown unit: {}", unit))),
    };
    num.checked_mul(secs_per_unit)
        .map(Duration::from_secs)
        .ok_or_else(|| ConfigError::Invalid(format!("Duration too large: {}", s)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn load(yaml: &str) -> Result<Config, ConfigError> {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(yaml.as_bytes()).unwrap();
        Config::load(file.path())
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.recording);
        assert_eq!(config.storage.path, PathBuf::from("orderbook_data"));
        assert_eq!(config.storage.compression, SinkCompression::Snappy);

        let enabled: Vec<VenueKind> = config.enabled_venues().map(|v| v.venue).collect();
        assert_eq!(enabled, vec![VenueKind::BinanceSpot, VenueKind::BinanceFutures]);
        assert_eq!(config.venues[0].symbols, vec!["BTCUSDT", "ETHUSDT"]);
        assert_eq!(config.venues[0].depth_levels, 20);
        assert_eq!(config.venues[0].buffer_size, 1000);
        assert_eq!(config.venues[2].buffer_size, 500);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_file_uses_defaults() {
        let config = load("").unwrap();
        assert_eq!(config.venues.len(), 3);
        assert_eq!(config.report.interval().unwrap(), Duration::from_secs(30));
    }

    #[test]
    fn test_load_config() {
        let yaml = r#"
storage:
  path: /data/orderbooks
  compression: zstd

recording: false

report:
  interval: 10s

venues:
  - venue: binance_spot
    symbols: [SOLUSDT]
    depth_levels: 10
    buffer_size: 200
    flush_interval: 2s
    max_buffer: 2000
    rest_url: http://localhost:9000
    sequence_policy: trust
  - venue: generic
    symbols: [TEST]
    ws_url: ws://localhost:9001/feed
    subscribe:
      - '{"op":"subscribe"}'
    reconnect_initial: 500ms
    reconnect_max: 30s
"#;
        let config = load(yaml).unwrap();
        assert_eq!(config.storage.path, PathBuf::from("/data/orderbooks"));
        assert_eq!(config.storage.compression, SinkCompression::Zstd);
        assert!(!config.recording);
        assert_eq!(config.report.interval().unwrap(), Duration::from_secs(10));
        assert_eq!(config.report.display_interval, "1s");
        assert_eq!(config.venues.len(), 2);

        let spot = &config.venues[0];
        assert!(spot.enabled);
        assert_eq!(spot.sequence_policy, SequencePolicy::Trust);
        let adapter = spot.adapter_config(config.recording).unwrap();
        assert_eq!(adapter.depth_levels, 10);
        assert_eq!(adapter.batch_size, 200);
        assert_eq!(adapter.flush_interval, Duration::from_secs(2));
        assert!(!adapter.record);

        let generic = &config.venues[1];
        assert_eq!(generic.sequence_policy, SequencePolicy::Strict);
        let backoff = generic.backoff().unwrap();
        assert_eq!(backoff.initial, Duration::from_millis(500));
        assert_eq!(backoff.max, Duration::from_secs(30));
        assert_eq!(generic.endpoints().subscribe.len(), 1);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_unknown_venue_rejected() {
        let yaml = r#"
venues:
  - venue: kraken
    symbols: [XBTUSD]
"#;
        assert!(matches!(load(yaml), Err(ConfigError::Yaml(_))));
    }

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("500ms").unwrap(), Duration::from_millis(500));
        assert_eq!(parse_duration("5s").unwrap(), Duration::from_secs(5));
        assert_eq!(parse_duration("15m").unwrap(), Duration::from_secs(15 * 60));
        assert_eq!(parse_duration("1h").unwrap(), Duration::from_secs(60 * 60));
        assert_eq!(parse_duration("1d").unwrap(), Duration::from_secs(24 * 60 * 60));
    }

    #[test]
    fn test_parse_duration_rejects_invalid() {
        assert!(parse_duration("0s").is_err());
        assert!(parse_duration("").is_err());
        assert!(parse_duration("5").is_err());
        assert!(parse_duration("abc").is_err());
        assert!(parse_duration("5w").is_err());
        assert!(parse_duration("5µ").is_err());
    }

    #[test]
    fn test_parse_duration_overflow() {
        assert!(parse_duration("18446744073709551615d").is_err());
        assert!(parse_duration("18446744073709551615h").is_err());
        assert_eq!(
            parse_duration("18446744073709551615s").unwrap(),
            Duration::from_secs(u64::MAX)
        );
    }

    #[test]
    fn test_validate_rejects_bad_venues() {
        let mut config = Config::default();
        config.venues[0].depth_levels = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.venues[0].max_buffer = 10;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.venues.push(VenueConfig::new(VenueKind::Generic, vec!["X".to_string()]));
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.venues[2].enabled = true;
        config.venues[2].symbols = vec!["eth".to_string()];
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.venues[0].reconnect_max = "500ms".to_string();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.venues[0].symbols = vec!["BTCUSDT".to_string(), "btcusdt".to_string()];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_requires_enabled_venue() {
        let mut config = Config::default();
        config.restrict_venues(&[]);
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_cli_overrides() {
        let mut config = Config::default();
        config.restrict_venues(&[VenueKind::BinanceFutures, VenueKind::Lighter]);
        config.override_symbols(&["SOLUSDT".to_string()]);

        let enabled: Vec<VenueKind> = config.enabled_venues().map(|v| v.venue).collect();
        assert_eq!(enabled, vec![VenueKind::BinanceFutures, VenueKind::Lighter]);
        assert_eq!(config.venues[1].symbols, vec!["SOLUSDT"]);
        assert_eq!(config.venues[2].symbols, vec!["1", "2"]);
        assert!(config.validate().is_ok());
    }
}
