use sqlx::{Pool, QueryBuilder, Sqlite};
use crate::db::models::GroupRequest;
use crate::error::AppError;

pub struct GroupRequestRepository;

impl GroupRequestRepository {
    pub async fn create(
        pool: &Pool<Sqlite>,
        group_id: i64,
        user_id: i64,
        requested_by: i64,
    ) -> Result<GroupRequest, AppError> {
        let created_at = chrono::Utc::now().timestamp_millis();

        let request = sqlx::query_as::<_, GroupRequest>(
            r#"
INSERT INTO group_requests (group_id, user_id, requested_by, created_at)
VALUES (?, ?, ?, ?)
RETURNING *
            "#,
        )
        .bind(group_id)
        .bind(user_id)
        .bind(requested_by)
        .bind(created_at)
        .fetch_one(pool)
        .await?;

        Ok(request)
    }

    pub async fn get_by_id(
        pool: &Pool<Sqlite>,
        id: i64,
    ) -> Result<Option<GroupRequest>, AppError> {
        let request = sqlx::query_as::<_, GroupRequest>(
            "SELECT * FROM group_requests WHERE id = ?"
        )
        .bind(id)
        .fetch_optional(pool)
        .await?;

        Ok(request)
    }

    /// Filters on whichever of `group_id` / `user_id` is given.
    pub async fn list(
        pool: &Pool<Sqlite>,
        group_id: Option<i64>,
        user_id: Option<i64>,
    ) -> Result<Vec<GroupRequest>, AppError> {
        let mut query = QueryBuilder::<Sqlite>::new("SELECT * FROM group_requests WHERE 1 = 1");
        if let Some(group_id) = group_id {
            query.push(" AND group_id = ").push_bind(group_id);
        }
        if let Some(user_id) = user_id {
            query.push(" AND user_id = ").push_bind(user_id);
        }
        query.push(" ORDER BY id ASC");

        let requests = query.build_query_as::<GroupRequest>().fetch_all(pool).await?;
        Ok(requests)
    }

    pub async fn delete(
        pool: &Pool<Sqlite>,
        id: i64,
    ) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM group_requests WHERE id = ?")
            .bind(id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
