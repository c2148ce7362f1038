//! Periodic feed ingestion: one feed per wake, one wake pending at most.

use anyhow::{bail, Result};
use chrono::Utc;
use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tokio::time::{interval, Duration};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::db::{Database, NewPost, PostWrite};
use crate::rss::{fetch_feed, parse_published, FetchError, RssDocument};
use crate::TARGET_SCHEDULER;

#[derive(Debug, Error)]
pub enum CycleError {
    #[error("no feeds configured")]
    NoFeedsConfigured,
    #[error("feed selection failed: {0}")]
    Select(#[source] sqlx::Error),
    #[error("failed to claim feed {url}: {source}")]
    Claim {
        url: String,
        #[source]
        source: sqlx::Error,
    },
    #[error("failed to fetch feed {url}: {source}")]
    Fetch {
        url: String,
        #[source]
        source: FetchError,
    },
    #[error("failed to save post from feed {url}: {source}")]
    Persistence {
        url: String,
        #[source]
        source: sqlx::Error,
    },
}

#[derive(Debug)]
pub enum CycleOutcome {
    Completed {
        feed_url: String,
        created: usize,
        skipped: usize,
    },
    Interrupted,
}

/// Parse a human-readable interval like "30s", "1m", or "1h30m".
pub fn parse_interval(input: &str) -> Result<Duration> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        bail!("empty interval");
    }

    let mut total = Duration::ZERO;
    let mut digits = String::new();
    let mut chars = trimmed.chars().peekable();

    while let Some(c) = chars.next() {
        if c.is_ascii_digit() {
            digits.push(c);
            continue;
        }
        if digits.is_empty() {
            bail!("invalid interval {:?}: unit without a number", input);
        }
        let value: u64 = digits.parse()?;
        digits.clear();

        let unit = if c == 'm' && chars.peek() == Some(&'s') {
            chars.next();
            "ms"
        } else {
            match c {
                's' => "s",
                'm' => "m",
                'h' => "h",
                other => bail!("invalid interval {:?}: unknown unit {:?}", input, other),
            }
        };
        total += match unit {
            "ms" => Duration::from_millis(value),
            "s" => Duration::from_secs(value),
            "m" => Duration::from_secs(value * 60),
            _ => Duration::from_secs(value * 3600),
        };
    }

    if !digits.is_empty() {
        bail!("invalid interval {:?}: number without a unit", input);
    }
    if total.is_zero() {
        bail!("interval must be greater than zero");
    }
    Ok(total)
}

/// Drive the ingestion loop until shutdown.
///
/// A ticker task feeds a capacity-1 wake channel via `try_send`, so ticks
/// landing while a cycle is still running collapse into at most one pending
/// wake. An overrunning cycle is followed by exactly one immediate cycle, not
/// one per missed tick, which keeps a single fetch in flight at all times.
pub async fn run(
    db: &Database,
    client: &reqwest::Client,
    fetch_interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> Result<()> {
    info!(target: TARGET_SCHEDULER, "Collecting feeds every {:?}", fetch_interval);

    let (wake_tx, mut wake_rx) = mpsc::channel::<()>(1);
    let mut ticker_shutdown = shutdown.clone();
    tokio::spawn(async move {
        let mut ticker = interval(fetch_interval);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let _ = wake_tx.try_send(());
                }
                _ = ticker_shutdown.changed() => break,
            }
        }
    });

    loop {
        tokio::select! {
            _ = shutdown.changed() => {
                info!(target: TARGET_SCHEDULER, "Shutdown requested, stopping scheduler");
                return Ok(());
            }
            wake = wake_rx.recv() => {
                if wake.is_none() {
                    return Ok(());
                }
                match run_cycle(db, client, &mut shutdown).await {
                    Ok(CycleOutcome::Completed { feed_url, created, skipped }) => {
                        info!(
                            target: TARGET_SCHEDULER,
                            "Processed {}: {} new posts, {} skipped", feed_url, created, skipped
                        );
                    }
                    Ok(CycleOutcome::Interrupted) => return Ok(()),
                    Err(CycleError::NoFeedsConfigured) => {
                        warn!(target: TARGET_SCHEDULER, "No feeds configured, nothing to fetch");
                    }
                    Err(err @ CycleError::Fetch { .. }) => {
                        warn!(target: TARGET_SCHEDULER, "{}", err);
                    }
                    Err(err) => {
                        error!(target: TARGET_SCHEDULER, "{}", err);
                    }
                }
            }
        }
    }
}

/// One wake-to-idle execution: claim the stalest feed, fetch its document,
/// persist its items in document order.
pub async fn run_cycle(
    db: &Database,
    client: &reqwest::Client,
    shutdown: &mut watch::Receiver<bool>,
) -> Result<CycleOutcome, CycleError> {
    let feed = db
        .next_feed_to_fetch()
        .await
        .map_err(CycleError::Select)?
        .ok_or(CycleError::NoFeedsConfigured)?;

    // Claim before fetching: if the fetch fails, the feed waits out a full
    // interval instead of being re-selected on the very next wake.
    db.mark_feed_fetched(feed.id, Utc::now())
        .await
        .map_err(|source| CycleError::Claim {
            url: feed.url.clone(),
            source,
        })?;

    // The fetch is the one cancellation point; a write already in progress
    // below is left to finish.
    let document = tokio::select! {
        _ = shutdown.changed() => {
            debug!(target: TARGET_SCHEDULER, "Shutdown during fetch of {}, abandoning cycle", feed.url);
            return Ok(CycleOutcome::Interrupted);
        }
        fetched = fetch_feed(client, &feed.url) => {
            fetched.map_err(|source| CycleError::Fetch {
                url: feed.url.clone(),
                source,
            })?
        }
    };

    let (created, skipped) = ingest_document(db, feed.id, &feed.url, &document, shutdown).await?;
    Ok(CycleOutcome::Completed {
        feed_url: feed.url,
        created,
        skipped,
    })
}

/// Persist a document's items in order. A bad publish date or a duplicate URL
/// skips that item only; a store failure aborts the rest of the document. On
/// shutdown, the write in flight completes and the rest of the document is
/// abandoned.
async fn ingest_document(
    db: &Database,
    feed_id: Uuid,
    feed_url: &str,
    document: &RssDocument,
    shutdown: &watch::Receiver<bool>,
) -> Result<(usize, usize), CycleError> {
    let mut created = 0;
    let mut skipped = 0;

    for item in &document.channel.items {
        if *shutdown.borrow() {
            debug!(
                target: TARGET_SCHEDULER,
                "Shutdown requested, abandoning remaining items from {}", feed_url
            );
            break;
        }
        if item.link.is_empty() {
            warn!(
                target: TARGET_SCHEDULER,
                "Skipping item {:?} from {}: no link", item.title, feed_url
            );
            skipped += 1;
            continue;
        }
        let published_at = match parse_published(&item.pub_date) {
            Ok(instant) => Some(instant),
            Err(err) => {
                warn!(
                    target: TARGET_SCHEDULER,
                    "Skipping item {:?} from {}: {}", item.title, feed_url, err
                );
                skipped += 1;
                continue;
            }
        };

        let post = NewPost {
            feed_id,
            url: item.link.clone(),
            title: (!item.title.is_empty()).then(|| item.title.clone()),
            description: (!item.description.is_empty()).then(|| item.description.clone()),
            published_at,
        };

        match db.create_post(&post).await {
            Ok(PostWrite::Created) => {
                info!(target: TARGET_SCHEDULER, "Saved post: {}", post.url);
                created += 1;
            }
            Ok(PostWrite::Duplicate) => {
                skipped += 1;
            }
            Err(source) => {
                return Err(CycleError::Persistence {
                    url: feed_url.to_string(),
                    source,
                });
            }
        }
    }

    Ok((created, skipped))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Feed;
    use crate::rss::{build_http_client, RssChannel, RssItem};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    #[test]
    fn parse_interval_accepts_common_forms() {
        assert_eq!(parse_interval("30s").unwrap(), Duration::from_secs(30));
        assert_eq!(parse_interval("1m").unwrap(), Duration::from_secs(60));
        assert_eq!(parse_interval("1h30m").unwrap(), Duration::from_secs(5400));
        assert_eq!(parse_interval("250ms").unwrap(), Duration::from_millis(250));
    }

    #[test]
    fn parse_interval_rejects_invalid_input() {
        assert!(parse_interval("").is_err());
        assert!(parse_interval("fast").is_err());
        assert!(parse_interval("5x").is_err());
        assert!(parse_interval("10").is_err());
        assert!(parse_interval("0s").is_err());
    }

    async fn seeded_feed(db: &Database, url: &str) -> Feed {
        let user = db.create_user("scheduler-test").await.unwrap().unwrap();
        db.create_feed("Test Feed", url, user.id).await.unwrap()
    }

    fn document(items: Vec<RssItem>) -> RssDocument {
        RssDocument {
            channel: RssChannel {
                title: "Test Feed".to_string(),
                link: "https://example.com".to_string(),
                description: String::new(),
                items,
            },
        }
    }

    fn item(link: &str, pub_date: &str) -> RssItem {
        RssItem {
            title: format!("Item at {}", link),
            link: link.to_string(),
            description: String::new(),
            pub_date: pub_date.to_string(),
        }
    }

    #[tokio::test]
    async fn invalid_pub_date_skips_only_that_item() {
        let db = Database::in_memory().await.unwrap();
        let feed = seeded_feed(&db, "https://example.com/rss").await;

        let doc = document(vec![
            item("https://example.com/1", "Mon, 02 Jan 2006 15:04:05 -0700"),
            item("https://example.com/2", ""),
            item("https://example.com/3", "2006-01-02T15:04:05Z"),
        ]);

        let (_shutdown_tx, shutdown) = watch::channel(false);
        let (created, skipped) = ingest_document(&db, feed.id, &feed.url, &doc, &shutdown)
            .await
            .unwrap();
        assert_eq!(created, 2);
        assert_eq!(skipped, 1);

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM posts")
            .fetch_one(db.pool())
            .await
            .unwrap();
        assert_eq!(count, 2);
    }

    #[tokio::test]
    async fn repeated_links_yield_exactly_one_post() {
        let db = Database::in_memory().await.unwrap();
        let feed = seeded_feed(&db, "https://example.com/rss").await;

        let doc = document(vec![
            item("https://example.com/same", "2006-01-02T15:04:05Z"),
            item("https://example.com/same", "2006-01-02T15:04:05Z"),
        ]);

        let (_shutdown_tx, shutdown) = watch::channel(false);
        let (created, skipped) = ingest_document(&db, feed.id, &feed.url, &doc, &shutdown)
            .await
            .unwrap();
        assert_eq!((created, skipped), (1, 1));

        // A second ingestion of the same document is a complete no-op.
        let (created, skipped) = ingest_document(&db, feed.id, &feed.url, &doc, &shutdown)
            .await
            .unwrap();
        assert_eq!((created, skipped), (0, 2));

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM posts")
            .fetch_one(db.pool())
            .await
            .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn empty_store_reports_no_feeds_configured() {
        let db = Database::in_memory().await.unwrap();
        let client = build_http_client().unwrap();
        let (_shutdown_tx, mut shutdown) = watch::channel(false);

        let result = run_cycle(&db, &client, &mut shutdown).await;
        assert!(matches!(result, Err(CycleError::NoFeedsConfigured)));
    }

    async fn wait_for_hits(hits: &Arc<AtomicUsize>, want: usize) {
        for _ in 0..600 {
            if hits.load(Ordering::SeqCst) >= want {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("server never saw {} requests", want);
    }

    #[tokio::test]
    async fn overrun_ticks_collapse_into_one_cycle_and_run_stops_on_shutdown() {
        let body = concat!(
            "<?xml version=\"1.0\"?>",
            "<rss><channel><title>Slow Feed</title>",
            "<link>https://example.com</link><description></description>",
            "</channel></rss>",
        );

        // The server counts requests and holds each response until released,
        // so one fetch can be pinned open across several ticks.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let hits = Arc::new(AtomicUsize::new(0));
        let (release_tx, mut release_rx) = mpsc::channel::<()>(8);
        let server_hits = hits.clone();
        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                let mut buf = [0u8; 1024];
                let _ = socket.read(&mut buf).await;
                server_hits.fetch_add(1, Ordering::SeqCst);
                if release_rx.recv().await.is_none() {
                    break;
                }
                let response = format!(
                    "HTTP/1.1 200 OK\r\ncontent-type: application/rss+xml\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
                    body.len(),
                    body
                );
                let _ = socket.write_all(response.as_bytes()).await;
            }
        });

        let db = Database::in_memory().await.unwrap();
        let url = format!("http://{}/rss", addr);
        seeded_feed(&db, &url).await;
        let client = build_http_client().unwrap();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let run_db = db.clone();
        let run_client = client.clone();
        let handle = tokio::spawn(async move {
            run(&run_db, &run_client, Duration::from_millis(300), shutdown_rx).await
        });

        // The first tick fires immediately.
        wait_for_hits(&hits, 1).await;

        // Hold the response while two more ticks elapse, then let it through.
        tokio::time::sleep(Duration::from_millis(750)).await;
        release_tx.send(()).await.unwrap();

        // The ticks that landed during the overrun produce one follow-up
        // cycle, not one per tick.
        wait_for_hits(&hits, 2).await;
        release_tx.send(()).await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(hits.load(Ordering::SeqCst), 2);

        shutdown_tx.send(true).unwrap();
        handle.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn http_error_cycle_writes_nothing_but_claims_the_feed() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                let mut buf = [0u8; 1024];
                let _ = socket.read(&mut buf).await;
                let _ = socket
                    .write_all(
                        b"HTTP/1.1 500 Internal Server Error\r\ncontent-length: 0\r\nconnection: close\r\n\r\n",
                    )
                    .await;
            }
        });

        let db = Database::in_memory().await.unwrap();
        let url = format!("http://{}/rss", addr);
        let feed = seeded_feed(&db, &url).await;
        let client = build_http_client().unwrap();
        let (_shutdown_tx, mut shutdown) = watch::channel(false);

        let result = run_cycle(&db, &client, &mut shutdown).await;
        assert!(matches!(result, Err(CycleError::Fetch { .. })));

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM posts")
            .fetch_one(db.pool())
            .await
            .unwrap();
        assert_eq!(count, 0);

        // The claim happened before the fetch, so the feed is not immediately
        // re-selected next wake.
        let claimed = db.get_feed_by_url(&feed.url).await.unwrap().unwrap();
        assert!(claimed.last_fetched_at.is_some());
    }
}
