use chrono::{DateTime, Utc};
use tracing::debug;
use uuid::Uuid;

use super::core::Database;
use crate::TARGET_DB;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Post {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub title: Option<String>,
    pub url: String,
    pub description: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub feed_id: Uuid,
}

/// A post ready to be persisted. The post URL is the dedup key; everything
/// else is carried along as-is.
#[derive(Debug, Clone)]
pub struct NewPost {
    pub feed_id: Uuid,
    pub url: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
}

/// Outcome of a post insert. A duplicate URL is an expected result, not an
/// error; only real store failures surface as `sqlx::Error`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostWrite {
    Created,
    Duplicate,
}

impl Database {
    pub async fn create_post(&self, post: &NewPost) -> Result<PostWrite, sqlx::Error> {
        let now = Utc::now();
        let result = sqlx::query(
            r#"
            INSERT INTO posts (id, created_at, updated_at, title, url, description, published_at, feed_id)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            ON CONFLICT (url) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(now)
        .bind(now)
        .bind(&post.title)
        .bind(&post.url)
        .bind(&post.description)
        .bind(post.published_at)
        .bind(post.feed_id)
        .execute(self.pool())
        .await?;

        if result.rows_affected() == 0 {
            debug!(target: TARGET_DB, "Post already exists, skipping: {}", post.url);
            return Ok(PostWrite::Duplicate);
        }

        debug!(target: TARGET_DB, "Saved post: {}", post.url);
        Ok(PostWrite::Created)
    }

    /// Newest posts from the feeds a user follows.
    pub async fn posts_for_user(
        &self,
        user_id: Uuid,
        limit: i64,
    ) -> Result<Vec<Post>, sqlx::Error> {
        sqlx::query_as::<_, Post>(
            r#"
            SELECT posts.*
            FROM posts
            JOIN feed_follows ON feed_follows.feed_id = posts.feed_id
            WHERE feed_follows.user_id = ?1
            ORDER BY posts.published_at DESC
            LIMIT ?2
            "#,
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(self.pool())
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Feed;

    async fn seeded_feed(db: &Database) -> Feed {
        let user = db.create_user("ingest-test").await.unwrap().unwrap();
        db.create_feed("Example", "https://example.com/rss", user.id)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn duplicate_url_is_skipped_not_errored() {
        let db = Database::in_memory().await.unwrap();
        let feed = seeded_feed(&db).await;

        let post = NewPost {
            feed_id: feed.id,
            url: "https://example.com/post-1".to_string(),
            title: Some("First".to_string()),
            description: None,
            published_at: Some(Utc::now()),
        };

        assert_eq!(db.create_post(&post).await.unwrap(), PostWrite::Created);
        assert_eq!(db.create_post(&post).await.unwrap(), PostWrite::Duplicate);

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM posts")
            .fetch_one(db.pool())
            .await
            .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn optional_fields_round_trip() {
        let db = Database::in_memory().await.unwrap();
        let feed = seeded_feed(&db).await;

        let post = NewPost {
            feed_id: feed.id,
            url: "https://example.com/untitled".to_string(),
            title: None,
            description: None,
            published_at: None,
        };
        db.create_post(&post).await.unwrap();

        let rows = db.posts_for_user(feed.user_id, 10).await.unwrap();
        // No follow yet, so nothing is visible through browse.
        assert!(rows.is_empty());

        db.create_follow(feed.user_id, feed.id).await.unwrap();
        let rows = db.posts_for_user(feed.user_id, 10).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].title, None);
        assert_eq!(rows[0].published_at, None);
        assert_eq!(rows[0].url, "https://example.com/untitled");
    }
}
