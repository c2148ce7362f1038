use chrono::{DateTime, Utc};
use tracing::debug;
use uuid::Uuid;

use super::core::Database;
use crate::TARGET_DB;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct User {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub name: String,
}

impl Database {
    /// Create a user. Returns None if the name is already taken; the UNIQUE
    /// constraint decides, so concurrent registrations cannot race past it.
    pub async fn create_user(&self, name: &str) -> Result<Option<User>, sqlx::Error> {
        let user = User {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
            name: name.to_string(),
        };

        let result = sqlx::query(
            r#"
            INSERT INTO users (id, created_at, updated_at, name)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT (name) DO NOTHING
            "#,
        )
        .bind(user.id)
        .bind(user.created_at)
        .bind(user.updated_at)
        .bind(&user.name)
        .execute(self.pool())
        .await?;

        if result.rows_affected() == 0 {
            debug!(target: TARGET_DB, "User name already taken: {}", user.name);
            return Ok(None);
        }

        debug!(target: TARGET_DB, "Created user {} ({})", user.name, user.id);
        Ok(Some(user))
    }

    pub async fn get_user(&self, name: &str) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE name = ?1")
            .bind(name)
            .fetch_optional(self.pool())
            .await
    }

    pub async fn get_users(&self) -> Result<Vec<User>, sqlx::Error> {
        sqlx::query_as::<_, User>("SELECT * FROM users ORDER BY name")
            .fetch_all(self.pool())
            .await
    }

    /// Delete every user; feeds, follows, and posts cascade.
    pub async fn reset_users(&self) -> Result<(), sqlx::Error> {
        sqlx::query("DELETE FROM users").execute(self.pool()).await?;
        Ok(())
    }
}
