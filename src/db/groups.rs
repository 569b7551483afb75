use sqlx::{Pool, QueryBuilder, Sqlite};
use crate::db::models::{Group, User};
use crate::error::AppError;

pub struct GroupRepository;

impl GroupRepository {
    /// Inserts the group and its creator as the first member in one transaction.
    pub async fn create(
        pool: &Pool<Sqlite>,
        name: &str,
        creator_id: i64,
    ) -> Result<Group, AppError> {
        let created_at = chrono::Utc::now().timestamp_millis();
        let mut tx = pool.begin().await?;

        let group = sqlx::query_as::<_, Group>(
            r#"
INSERT INTO groups (name, creator_id, created_at)
VALUES (?, ?, ?)
RETURNING *
            "#,
        )
        .bind(name)
        .bind(creator_id)
        .bind(created_at)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query("INSERT INTO group_members (group_id, user_id) VALUES (?, ?)")
            .bind(group.id)
            .bind(creator_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(group)
    }

    pub async fn get_by_id(
        pool: &Pool<Sqlite>,
        id: i64,
    ) -> Result<Option<Group>, AppError> {
        let group = sqlx::query_as::<_, Group>("SELECT * FROM groups WHERE id = ?")
            .bind(id)
            .fetch_optional(pool)
            .await?;

        Ok(group)
    }

    pub async fn is_member(
        pool: &Pool<Sqlite>,
        group_id: i64,
        user_id: i64,
    ) -> Result<bool, AppError> {
        let found: Option<i64> = sqlx::query_scalar(
            "SELECT 1 FROM group_members WHERE group_id = ? AND user_id = ?"
        )
        .bind(group_id)
        .bind(user_id)
        .fetch_optional(pool)
        .await?;

        Ok(found.is_some())
    }

    pub async fn add_member(
        pool: &Pool<Sqlite>,
        group_id: i64,
        user_id: i64,
    ) -> Result<(), AppError> {
        sqlx::query("INSERT OR IGNORE INTO group_members (group_id, user_id) VALUES (?, ?)")
            .bind(group_id)
            .bind(user_id)
            .execute(pool)
            .await?;

        Ok(())
    }

    pub async fn list_members(
        pool: &Pool<Sqlite>,
        group_id: i64,
    ) -> Result<Vec<User>, AppError> {
        let members = sqlx::query_as::<_, User>(
            r#"
SELECT u.* FROM users u
JOIN group_members m ON m.user_id = u.id
WHERE m.group_id = ?
ORDER BY u.username ASC
            "#
        )
        .bind(group_id)
        .fetch_all(pool)
        .await?;

        Ok(members)
    }

    /// Ids of groups the user created or belongs to.
    pub async fn ids_for_user(
        pool: &Pool<Sqlite>,
        user_id: i64,
    ) -> Result<Vec<i64>, AppError> {
        let ids = sqlx::query_scalar::<_, i64>(
            r#"
SELECT g.id FROM groups g
WHERE g.creator_id = ?
   OR EXISTS (SELECT 1 FROM group_members m WHERE m.group_id = g.id AND m.user_id = ?)
            "#
        )
        .bind(user_id)
        .bind(user_id)
        .fetch_all(pool)
        .await?;

        Ok(ids)
    }

    pub async fn list_by_ids(
        pool: &Pool<Sqlite>,
        ids: &[i64],
    ) -> Result<Vec<Group>, AppError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut query = QueryBuilder::<Sqlite>::new("SELECT * FROM groups WHERE id IN (");
        let mut separated = query.separated(", ");
        for id in ids {
            separated.push_bind(*id);
        }
        separated.push_unseparated(") ORDER BY id ASC");

        let groups = query.build_query_as::<Group>().fetch_all(pool).await?;
        Ok(groups)
    }

    pub async fn list_created_by(
        pool: &Pool<Sqlite>,
        creator_id: i64,
    ) -> Result<Vec<Group>, AppError> {
        let groups = sqlx::query_as::<_, Group>(
            "SELECT * FROM groups WHERE creator_id = ? ORDER BY id ASC"
        )
        .bind(creator_id)
        .fetch_all(pool)
        .await?;

        Ok(groups)
    }

    pub async fn rename(
        pool: &Pool<Sqlite>,
        id: i64,
        name: &str,
    ) -> Result<Option<Group>, AppError> {
        let group = sqlx::query_as::<_, Group>(
            "UPDATE groups SET name = ? WHERE id = ? RETURNING *"
        )
        .bind(name)
        .bind(id)
        .fetch_optional(pool)
        .await?;

        Ok(group)
    }

    pub async fn set_pfp_extension(
        pool: &Pool<Sqlite>,
        id: i64,
        extension: &str,
    ) -> Result<(), AppError> {
        sqlx::query("UPDATE groups SET pfp_file_extension = ? WHERE id = ?")
            .bind(extension)
            .bind(id)
            .execute(pool)
            .await?;

        Ok(())
    }

    pub async fn delete(
        pool: &Pool<Sqlite>,
        id: i64,
    ) -> Result<Option<Group>, AppError> {
        let group = sqlx::query_as::<_, Group>("DELETE FROM groups WHERE id = ? RETURNING *")
            .bind(id)
            .fetch_optional(pool)
            .await?;

        Ok(group)
    }
}
