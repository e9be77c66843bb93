use super::Repository;
use crate::database::models::User;
use crate::error::{AppError, Result};
use chrono::{DateTime, Utc};

impl Repository {
    pub async fn create_user(&self, username: &str, password_hash: &str) -> Result<User> {
        let now = Utc::now();

        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (username, password_hash, created_at, updated_at)
            VALUES (?, ?, ?, ?)
            RETURNING *
            "#,
        )
        .bind(username)
        .bind(password_hash)
        .bind(now)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        tracing::info!("Created user: {}", user.username);
        Ok(user)
    }

    pub async fn find_user_by_username(&self, username: &str) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE username = ?")
            .bind(username)
            .fetch_optional(&self.pool)
            .await?;

        Ok(user)
    }

    /// Store the hash of an issued bearer token
    pub async fn store_token(
        &self,
        token_hash: &str,
        user_id: i64,
        expires_at: DateTime<Utc>,
    ) -> Result<()> {
        sqlx::query(
            "INSERT INTO api_tokens (token_hash, user_id, created_at, expires_at) VALUES (?, ?, ?, ?)",
        )
        .bind(token_hash)
        .bind(user_id)
        .bind(Utc::now())
        .bind(expires_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Owner of an unexpired token
    pub async fn find_user_by_token(
        &self,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT u.* FROM users u
            JOIN api_tokens k ON k.user_id = u.id
            WHERE k.token_hash = ? AND k.expires_at > ?
            "#,
        )
        .bind(token_hash)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    pub async fn revoke_token(&self, token_hash: &str) -> Result<()> {
        let rows = sqlx::query("DELETE FROM api_tokens WHERE token_hash = ?")
            .bind(token_hash)
            .execute(&self.pool)
            .await?
            .rows_affected();

        if rows == 0 {
            return Err(AppError::Unauthenticated);
        }
        Ok(())
    }

    pub async fn purge_expired_tokens(&self, now: DateTime<Utc>) -> Result<u64> {
        let rows = sqlx::query("DELETE FROM api_tokens WHERE expires_at <= ?")
            .bind(now)
            .execute(&self.pool)
            .await?
            .rows_affected();

        if rows > 0 {
            tracing::debug!("Purged {} expired tokens", rows);
        }
        Ok(rows)
    }
}
