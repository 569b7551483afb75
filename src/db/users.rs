use sqlx::{Pool, QueryBuilder, Sqlite};
use crate::db::models::{User, UserStatus};
use crate::error::AppError;

pub struct UserRepository;

impl UserRepository {
    pub async fn create(
        pool: &Pool<Sqlite>,
        username: &str,
        password_hash: &[u8; 32],
        password_salt: &[u8; 32],
    ) -> Result<User, AppError> {
        let created_at = chrono::Utc::now().timestamp_millis();

        let user = sqlx::query_as::<_, User>(
            r#"
INSERT INTO users (username, password_hash, password_salt, status, created_at)
VALUES (?, ?, ?, ?, ?)
RETURNING *
            "#,
        )
        .bind(username)
        .bind(password_hash.as_slice())
        .bind(password_salt.as_slice())
        .bind(UserStatus::Offline)
        .bind(created_at)
        .fetch_one(pool)
        .await?;

        Ok(user)
    }

    pub async fn get_by_username(
        pool: &Pool<Sqlite>,
        username: &str,
    ) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>(
            "SELECT * FROM users WHERE username = ?"
        )
        .bind(username)
        .fetch_optional(pool)
        .await?;

        Ok(user)
    }

    pub async fn get_by_id(
        pool: &Pool<Sqlite>,
        id: i64,
    ) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>(
            "SELECT * FROM users WHERE id = ?"
        )
        .bind(id)
        .fetch_optional(pool)
        .await?;

        Ok(user)
    }

    pub async fn list_by_ids(
        pool: &Pool<Sqlite>,
        ids: &[i64],
    ) -> Result<Vec<User>, AppError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut query = QueryBuilder::<Sqlite>::new("SELECT * FROM users WHERE id IN (");
        let mut separated = query.separated(", ");
        for id in ids {
            separated.push_bind(*id);
        }
        separated.push_unseparated(") ORDER BY username ASC");

        let users = query.build_query_as::<User>().fetch_all(pool).await?;
        Ok(users)
    }

    /// Users with friend-request rows in both directions with `user_id`.
    pub async fn list_friends(
        pool: &Pool<Sqlite>,
        user_id: i64,
    ) -> Result<Vec<User>, AppError> {
        let users = sqlx::query_as::<_, User>(
            r#"
SELECT u.* FROM users u
WHERE EXISTS (
    SELECT 1 FROM friend_requests f WHERE f.user_id = u.id AND f.requested_user_id = ?
)
AND EXISTS (
    SELECT 1 FROM friend_requests f WHERE f.user_id = ? AND f.requested_user_id = u.id
)
ORDER BY u.username ASC
            "#
        )
        .bind(user_id)
        .bind(user_id)
        .fetch_all(pool)
        .await?;

        Ok(users)
    }

    pub async fn update_username(
        pool: &Pool<Sqlite>,
        id: i64,
        username: &str,
    ) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>(
            "UPDATE users SET username = ? WHERE id = ? RETURNING *"
        )
        .bind(username)
        .bind(id)
        .fetch_optional(pool)
        .await?;

        Ok(user)
    }

    /// Returns false when no such user exists.
    pub async fn update_status(
        pool: &Pool<Sqlite>,
        id: i64,
        status: UserStatus,
    ) -> Result<bool, AppError> {
        let result = sqlx::query("UPDATE users SET status = ? WHERE id = ?")
            .bind(status)
            .bind(id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn set_pfp_extension(
        pool: &Pool<Sqlite>,
        id: i64,
        extension: &str,
    ) -> Result<(), AppError> {
        sqlx::query("UPDATE users SET pfp_file_extension = ? WHERE id = ?")
            .bind(extension)
            .bind(id)
            .execute(pool)
            .await?;

        Ok(())
    }

    pub async fn delete(
        pool: &Pool<Sqlite>,
        id: i64,
    ) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>(
            "DELETE FROM users WHERE id = ? RETURNING *"
        )
        .bind(id)
        .fetch_optional(pool)
        .await?;

        Ok(user)
    }
}
