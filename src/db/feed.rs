use chrono::{DateTime, Utc};
use tracing::debug;
use uuid::Uuid;

use super::core::Database;
use crate::TARGET_DB;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Feed {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub name: String,
    pub url: String,
    pub user_id: Uuid,
    pub last_fetched_at: Option<DateTime<Utc>>,
}

impl Database {
    pub async fn create_feed(
        &self,
        name: &str,
        url: &str,
        user_id: Uuid,
    ) -> Result<Feed, sqlx::Error> {
        let feed = Feed {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
            name: name.to_string(),
            url: url.to_string(),
            user_id,
            last_fetched_at: None,
        };

        sqlx::query(
            r#"
            INSERT INTO feeds (id, created_at, updated_at, name, url, user_id, last_fetched_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, NULL)
            "#,
        )
        .bind(feed.id)
        .bind(feed.created_at)
        .bind(feed.updated_at)
        .bind(&feed.name)
        .bind(&feed.url)
        .bind(feed.user_id)
        .execute(self.pool())
        .await?;

        debug!(target: TARGET_DB, "Created feed {} ({})", feed.name, feed.url);
        Ok(feed)
    }

    pub async fn get_feed_by_url(&self, url: &str) -> Result<Option<Feed>, sqlx::Error> {
        sqlx::query_as::<_, Feed>("SELECT * FROM feeds WHERE url = ?1")
            .bind(url)
            .fetch_optional(self.pool())
            .await
    }

    /// All feeds with the name of the user who added them, for listing.
    pub async fn get_feeds_with_owners(
        &self,
    ) -> Result<Vec<(String, String, String)>, sqlx::Error> {
        sqlx::query_as::<_, (String, String, String)>(
            r#"
            SELECT feeds.name, feeds.url, users.name
            FROM feeds
            JOIN users ON users.id = feeds.user_id
            ORDER BY feeds.name
            "#,
        )
        .fetch_all(self.pool())
        .await
    }

    /// The feed that has gone unfetched the longest. Never-fetched feeds sort
    /// first, so they are drained before any feed is revisited.
    pub async fn next_feed_to_fetch(&self) -> Result<Option<Feed>, sqlx::Error> {
        sqlx::query_as::<_, Feed>(
            "SELECT * FROM feeds ORDER BY last_fetched_at ASC NULLS FIRST LIMIT 1",
        )
        .fetch_optional(self.pool())
        .await
    }

    /// Claim a feed by stamping `last_fetched_at` before its fetch begins, so
    /// a failed fetch does not put the feed straight back at the head of the
    /// selection order.
    pub async fn mark_feed_fetched(
        &self,
        feed_id: Uuid,
        fetched_at: DateTime<Utc>,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE feeds SET last_fetched_at = ?1, updated_at = ?1 WHERE id = ?2")
            .bind(fetched_at)
            .bind(feed_id)
            .execute(self.pool())
            .await?;

        debug!(target: TARGET_DB, "Marked feed {} fetched at {}", feed_id, fetched_at);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[tokio::test]
    async fn never_fetched_feeds_are_selected_first() {
        let db = Database::in_memory().await.unwrap();
        let user = db.create_user("selector-test").await.unwrap().unwrap();

        let feed_a = db
            .create_feed("A", "https://a.example.com/rss", user.id)
            .await
            .unwrap();
        let feed_b = db
            .create_feed("B", "https://b.example.com/rss", user.id)
            .await
            .unwrap();
        db.mark_feed_fetched(feed_b.id, Utc::now() - Duration::minutes(10))
            .await
            .unwrap();

        // A has never been fetched, so it wins even though B is 10 minutes stale.
        let next = db.next_feed_to_fetch().await.unwrap().unwrap();
        assert_eq!(next.id, feed_a.id);

        db.mark_feed_fetched(feed_a.id, Utc::now()).await.unwrap();
        let next = db.next_feed_to_fetch().await.unwrap().unwrap();
        assert_eq!(next.id, feed_b.id);
    }

    #[tokio::test]
    async fn claim_advances_last_fetched_at() {
        let db = Database::in_memory().await.unwrap();
        let user = db.create_user("claim-test").await.unwrap().unwrap();
        let feed = db
            .create_feed("A", "https://a.example.com/rss", user.id)
            .await
            .unwrap();

        let first = Utc::now() - Duration::minutes(5);
        db.mark_feed_fetched(feed.id, first).await.unwrap();
        let claimed = db.get_feed_by_url(&feed.url).await.unwrap().unwrap();
        assert_eq!(
            claimed.last_fetched_at.map(|t| t.timestamp()),
            Some(first.timestamp())
        );

        let second = Utc::now();
        db.mark_feed_fetched(feed.id, second).await.unwrap();
        let claimed = db.get_feed_by_url(&feed.url).await.unwrap().unwrap();
        assert!(claimed.last_fetched_at.unwrap() > first);
    }

    #[tokio::test]
    async fn no_feeds_yields_none() {
        let db = Database::in_memory().await.unwrap();
        assert!(db.next_feed_to_fetch().await.unwrap().is_none());
    }
}
