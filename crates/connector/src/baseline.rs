use std::time::Duration;

use obrec_book::DepthUpdate;
use reqwest::Client;
use tracing::debug;

use crate::error::BaselineError;
use crate::traits::DepthDecoder;

const BASELINE_TIMEOUT: Duration = Duration::from_secs(10);

/// Fetch the venue's REST depth snapshot for anchoring a fresh book.
pub async fn fetch_baseline(
    client: &Client,
    decoder: &dyn DepthDecoder,
) -> Result<DepthUpdate, BaselineError> {
    let url = decoder.baseline_url().ok_or(BaselineError::Unavailable)?;
    debug!(url = %url, venue = decoder.venue(), symbol = decoder.symbol(), "Fetching depth baseline");

    let body = client
        .get(&url)
        .timeout(BASELINE_TIMEOUT)
        .send()
        .await?
        .error_for_status()?
        .bytes()
        .await?;

    Ok(decoder.decode_baseline(&body)?)
}
