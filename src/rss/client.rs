//! HTTP client construction for feed fetching.

use anyhow::Result;
use tokio::time::Duration;

pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

const USER_AGENT: &str = concat!("heron/", env!("CARGO_PKG_VERSION"));

/// Build the single shared client used for every feed fetch. The request
/// timeout bounds the only network wait in the ingestion cycle.
pub fn build_http_client() -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .gzip(true)
        .timeout(REQUEST_TIMEOUT)
        .redirect(reqwest::redirect::Policy::default())
        .build()
        .map_err(|e| anyhow::anyhow!("Failed to build HTTP client: {}", e))
}
