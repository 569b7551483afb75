use sqlx::{Pool, Sqlite};
use crate::db::models::MessageRow;
use crate::error::AppError;

pub struct MessageRepository;

impl MessageRepository {
    pub async fn create(
        pool: &Pool<Sqlite>,
        sender_id: i64,
        recipient_id: Option<i64>,
        group_id: Option<i64>,
        encoded_text: &str,
    ) -> Result<MessageRow, AppError> {
        let created_at = chrono::Utc::now().timestamp_millis();

        let message = sqlx::query_as::<_, MessageRow>(
            r#"
INSERT INTO messages (sender_id, recipient_id, group_id, text, created_at, updated_at)
VALUES (?, ?, ?, ?, ?, ?)
RETURNING *
            "#,
        )
        .bind(sender_id)
        .bind(recipient_id)
        .bind(group_id)
        .bind(encoded_text)
        .bind(created_at)
        .bind(created_at)
        .fetch_one(pool)
        .await?;

        Ok(message)
    }

    pub async fn get_by_id(
        pool: &Pool<Sqlite>,
        id: i64,
    ) -> Result<Option<MessageRow>, AppError> {
        let message = sqlx::query_as::<_, MessageRow>("SELECT * FROM messages WHERE id = ?")
            .bind(id)
            .fetch_optional(pool)
            .await?;

        Ok(message)
    }

    /// Direct messages exchanged between the pair, oldest first.
    /// A negative `limit` means no limit.
    pub async fn list_direct(
        pool: &Pool<Sqlite>,
        user_id: i64,
        partner_id: i64,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<MessageRow>, AppError> {
        let messages = sqlx::query_as::<_, MessageRow>(
            r#"
SELECT * FROM messages
WHERE group_id IS NULL
  AND ((sender_id = ? AND recipient_id = ?) OR (sender_id = ? AND recipient_id = ?))
ORDER BY created_at ASC, id ASC
LIMIT ? OFFSET ?
            "#
        )
        .bind(user_id)
        .bind(partner_id)
        .bind(partner_id)
        .bind(user_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await?;

        Ok(messages)
    }

    pub async fn list_group(
        pool: &Pool<Sqlite>,
        group_id: i64,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<MessageRow>, AppError> {
        let messages = sqlx::query_as::<_, MessageRow>(
            r#"
SELECT * FROM messages
WHERE group_id = ?
ORDER BY created_at ASC, id ASC
LIMIT ? OFFSET ?
            "#
        )
        .bind(group_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await?;

        Ok(messages)
    }

    /// Every message the user sent or directly received.
    pub async fn list_involving(
        pool: &Pool<Sqlite>,
        user_id: i64,
    ) -> Result<Vec<MessageRow>, AppError> {
        let messages = sqlx::query_as::<_, MessageRow>(
            r#"
SELECT * FROM messages
WHERE sender_id = ? OR recipient_id = ?
ORDER BY created_at ASC, id ASC
            "#
        )
        .bind(user_id)
        .bind(user_id)
        .fetch_all(pool)
        .await?;

        Ok(messages)
    }

    /// Messages with attachments that deleting the user would cascade away:
    /// their direct messages and everything in groups they created.
    pub async fn ids_with_attachments_for_user(
        pool: &Pool<Sqlite>,
        user_id: i64,
    ) -> Result<Vec<i64>, AppError> {
        let ids = sqlx::query_scalar::<_, i64>(
            r#"
SELECT DISTINCT m.id FROM messages m
JOIN attachments a ON a.message_id = m.id
WHERE m.sender_id = ?
   OR m.recipient_id = ?
   OR m.group_id IN (SELECT id FROM groups WHERE creator_id = ?)
            "#
        )
        .bind(user_id)
        .bind(user_id)
        .bind(user_id)
        .fetch_all(pool)
        .await?;

        Ok(ids)
    }

    pub async fn ids_with_attachments_in_group(
        pool: &Pool<Sqlite>,
        group_id: i64,
    ) -> Result<Vec<i64>, AppError> {
        let ids = sqlx::query_scalar::<_, i64>(
            r#"
SELECT DISTINCT m.id FROM messages m
JOIN attachments a ON a.message_id = m.id
WHERE m.group_id = ?
            "#
        )
        .bind(group_id)
        .fetch_all(pool)
        .await?;

        Ok(ids)
    }

    pub async fn update_text(
        pool: &Pool<Sqlite>,
        id: i64,
        encoded_text: &str,
    ) -> Result<Option<MessageRow>, AppError> {
        let updated_at = chrono::Utc::now().timestamp_millis();

        let message = sqlx::query_as::<_, MessageRow>(
            "UPDATE messages SET text = ?, updated_at = ? WHERE id = ? RETURNING *"
        )
        .bind(encoded_text)
        .bind(updated_at)
        .bind(id)
        .fetch_optional(pool)
        .await?;

        Ok(message)
    }

    pub async fn delete(
        pool: &Pool<Sqlite>,
        id: i64,
    ) -> Result<Option<MessageRow>, AppError> {
        let message = sqlx::query_as::<_, MessageRow>("DELETE FROM messages WHERE id = ? RETURNING *")
            .bind(id)
            .fetch_optional(pool)
            .await?;

        Ok(message)
    }
}
