//! Fetch and decode one feed document.

use quick_xml::de::from_str;
use reqwest::StatusCode;
use thiserror::Error;
use tracing::debug;

use super::types::RssDocument;
use crate::TARGET_WEB_REQUEST;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Network(#[from] reqwest::Error),
    #[error("received non-success status code: {0}")]
    Status(StatusCode),
    #[error("failed to decode feed document: {0}")]
    Decode(#[from] quick_xml::DeError),
}

/// Issue a single GET for a feed and decode the body as RSS 2.0 XML.
///
/// No retries happen here: a failed feed simply waits for its next turn in
/// the polling order. Entities in textual fields are resolved before the
/// document is returned.
pub async fn fetch_feed(
    client: &reqwest::Client,
    url: &str,
) -> Result<RssDocument, FetchError> {
    debug!(target: TARGET_WEB_REQUEST, "Loading RSS feed from {}", url);

    let response = client.get(url).send().await?;

    let status = response.status();
    if status.as_u16() >= 400 {
        return Err(FetchError::Status(status));
    }

    let body = response.text().await?;
    let mut document: RssDocument = from_str(&body)?;
    document.unescape();

    debug!(
        target: TARGET_WEB_REQUEST,
        "Parsed RSS channel {:?} with {} items", document.channel.title, document.channel.items.len()
    );
    Ok(document)
}
