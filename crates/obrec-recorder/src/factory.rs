use std::sync::Arc;

use obrec_archiver::SnapshotSink;
use obrec_connector_lib::{
    decoder_for, AdapterHandle, OrderbookAdapter, VenueAdapter, WebSocketConnector,
};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::Config;
use crate::error::RecorderError;

/// One WebSocket adapter per enabled (venue, symbol). Each adapter gets a
/// child of `shutdown`, so cancelling it stops them all.
pub fn build_adapters(
    config: &Config,
    sink: Arc<dyn SnapshotSink>,
    shutdown: &CancellationToken,
) -> Result<Vec<Box<dyn VenueAdapter>>, RecorderError> {
    let mut adapters: Vec<Box<dyn VenueAdapter>> = Vec::new();

    for venue in config.enabled_venues() {
        let adapter_config = venue.adapter_config(config.recording)?;
        for symbol in &venue.symbols {
            let decoder = decoder_for(venue.venue, symbol, venue.endpoints())?;
            let connector =
                WebSocketConnector::new(decoder.stream_url(), decoder.subscribe_messages());
            let connector_url = connector.url().to_string();
            let adapter = OrderbookAdapter::new(
                connector,
                decoder,
                Arc::clone(&sink),
                adapter_config.clone(),
                shutdown.child_token(),
            );
            info!(
                adapter = %adapter.id(),
                url = %connector_url,
                venue = %venue.venue,
                symbol = %symbol,
                depth = adapter_config.depth_levels,
                batch = adapter_config.batch_size,
                "Created adapter"
            );
            adapters.push(Box::new(AdapterHandle::new(adapter)));
        }
    }

    Ok(adapters)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::VenueConfig;
    use obrec_archiver::ParquetSink;
    use obrec_connector_lib::VenueKind;

    fn sink() -> Arc<dyn SnapshotSink> {
        Arc::new(ParquetSink::new("unused"))
    }

    #[test]
    fn test_one_adapter_per_symbol() {
        let config = Config::default();
        let adapters = build_adapters(&config, sink(), &CancellationToken::new()).unwrap();

        let ids: Vec<&str> = adapters.iter().map(|a| a.id()).collect();
        assert_eq!(
            ids,
            vec![
                "binance_spot_BTCUSDT",
                "binance_spot_ETHUSDT",
                "binance_futures_BTCUSDT",
                "binance_futures_ETHUSDT",
            ]
        );
        assert!(adapters.iter().all(|a| a.message_count() == 0));
    }

    #[test]
    fn test_lighter_and_generic() {
        let mut generic = VenueConfig::new(VenueKind::Generic, vec!["TEST".to_string()]);
        generic.ws_url = Some("ws://127.0.0.1:9/feed".to_string());
        let config = Config {
            venues: vec![
                VenueConfig::new(VenueKind::Lighter, vec!["1".to_string()]),
                generic,
            ],
            ..Config::default()
        };

        let adapters = build_adapters(&config, sink(), &CancellationToken::new()).unwrap();
        let ids: Vec<&str> = adapters.iter().map(|a| a.id()).collect();
        assert_eq!(ids, vec!["lighter_1", "generic_TEST"]);
    }

    #[test]
    fn test_invalid_market_fails() {
        let config = Config {
            venues: vec![VenueConfig::new(VenueKind::Lighter, vec!["eth".to_string()])],
            ..Config::default()
        };
        let result = build_adapters(&config, sink(), &CancellationToken::new());
        assert!(matches!(result, Err(RecorderError::Connector(_))));
    }
}
