use chrono::Utc;
use uuid::Uuid;

use super::core::Database;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct FollowedFeed {
    pub feed_name: String,
    pub feed_url: String,
}

impl Database {
    /// Follow a feed for a user. Returns false if the follow already existed.
    pub async fn create_follow(&self, user_id: Uuid, feed_id: Uuid) -> Result<bool, sqlx::Error> {
        let now = Utc::now();
        let result = sqlx::query(
            r#"
            INSERT INTO feed_follows (id, created_at, updated_at, user_id, feed_id)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT (user_id, feed_id) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(now)
        .bind(now)
        .bind(user_id)
        .bind(feed_id)
        .execute(self.pool())
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Returns false if there was no follow to remove.
    pub async fn delete_follow(&self, user_id: Uuid, feed_id: Uuid) -> Result<bool, sqlx::Error> {
        let result =
            sqlx::query("DELETE FROM feed_follows WHERE user_id = ?1 AND feed_id = ?2")
                .bind(user_id)
                .bind(feed_id)
                .execute(self.pool())
                .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn follows_for_user(&self, user_id: Uuid) -> Result<Vec<FollowedFeed>, sqlx::Error> {
        sqlx::query_as::<_, FollowedFeed>(
            r#"
            SELECT feeds.name AS feed_name, feeds.url AS feed_url
            FROM feed_follows
            JOIN feeds ON feeds.id = feed_follows.feed_id
            WHERE feed_follows.user_id = ?1
            ORDER BY feeds.name
            "#,
        )
        .bind(user_id)
        .fetch_all(self.pool())
        .await
    }
}
