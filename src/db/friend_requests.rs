use sqlx::{Pool, Sqlite};
use crate::db::models::FriendRequest;
use crate::error::AppError;

pub struct FriendRequestRepository;

impl FriendRequestRepository {
    pub async fn create(
        pool: &Pool<Sqlite>,
        user_id: i64,
        requested_user_id: i64,
    ) -> Result<FriendRequest, AppError> {
        let created_at = chrono::Utc::now().timestamp_millis();

        let request = sqlx::query_as::<_, FriendRequest>(
            r#"
INSERT INTO friend_requests (user_id, requested_user_id, created_at)
VALUES (?, ?, ?)
RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(requested_user_id)
        .bind(created_at)
        .fetch_one(pool)
        .await?;

        Ok(request)
    }

    /// All rows between the pair, in either direction.
    pub async fn between(
        pool: &Pool<Sqlite>,
        a: i64,
        b: i64,
    ) -> Result<Vec<FriendRequest>, AppError> {
        let requests = sqlx::query_as::<_, FriendRequest>(
            r#"
SELECT * FROM friend_requests
WHERE (user_id = ? AND requested_user_id = ?)
   OR (user_id = ? AND requested_user_id = ?)
ORDER BY id ASC
            "#
        )
        .bind(a)
        .bind(b)
        .bind(b)
        .bind(a)
        .fetch_all(pool)
        .await?;

        Ok(requests)
    }

    pub async fn delete_between(
        pool: &Pool<Sqlite>,
        a: i64,
        b: i64,
    ) -> Result<u64, AppError> {
        let result = sqlx::query(
            r#"
DELETE FROM friend_requests
WHERE (user_id = ? AND requested_user_id = ?)
   OR (user_id = ? AND requested_user_id = ?)
            "#
        )
        .bind(a)
        .bind(b)
        .bind(b)
        .bind(a)
        .execute(pool)
        .await?;

        Ok(result.rows_affected())
    }
}
