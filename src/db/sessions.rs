use sqlx::{Pool, Sqlite};
use uuid::Uuid;

use crate::db::models::Session;
use crate::error::AppError;

const MILLIS_PER_HOUR: i64 = 3_600_000;

/// Opaque bearer tokens. The token itself is the primary key.
pub struct SessionRepository;

impl SessionRepository {
    pub async fn create(
        pool: &Pool<Sqlite>,
        user_id: i64,
        expiry_hours: i64,
    ) -> Result<Session, AppError> {
        let created_at = chrono::Utc::now().timestamp_millis();

        let session = sqlx::query_as::<_, Session>(
            r#"
INSERT INTO sessions (token, user_id, expires_at, created_at)
VALUES (?, ?, ?, ?)
RETURNING *
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(user_id)
        .bind(created_at + expiry_hours * MILLIS_PER_HOUR)
        .bind(created_at)
        .fetch_one(pool)
        .await?;

        Ok(session)
    }

    /// Owner of an unexpired session.
    pub async fn user_for_token(
        pool: &Pool<Sqlite>,
        token: &str,
    ) -> Result<Option<i64>, AppError> {
        let user_id = sqlx::query_scalar::<_, i64>(
            "SELECT user_id FROM sessions WHERE token = ? AND expires_at > ?",
        )
        .bind(token)
        .bind(chrono::Utc::now().timestamp_millis())
        .fetch_optional(pool)
        .await?;

        Ok(user_id)
    }

    pub async fn revoke(pool: &Pool<Sqlite>, token: &str) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM sessions WHERE token = ?")
            .bind(token)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn purge_expired(pool: &Pool<Sqlite>) -> Result<u64, AppError> {
        let result = sqlx::query("DELETE FROM sessions WHERE expires_at <= ?")
            .bind(chrono::Utc::now().timestamp_millis())
            .execute(pool)
            .await?;

        Ok(result.rows_affected())
    }
}
