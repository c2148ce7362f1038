mod client;
mod dates;
mod fetcher;
mod types;

pub use self::client::{build_http_client, REQUEST_TIMEOUT};
pub use self::dates::{parse_published, DateParseError};
pub use self::fetcher::{fetch_feed, FetchError};
pub use self::types::{RssChannel, RssDocument, RssItem};
