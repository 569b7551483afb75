use sqlx::{Pool, QueryBuilder, Sqlite};
use crate::db::models::Attachment;
use crate::error::AppError;

pub struct AttachmentRepository;

impl AttachmentRepository {
    pub async fn create(
        pool: &Pool<Sqlite>,
        message_id: i64,
        file_name: &str,
    ) -> Result<Attachment, AppError> {
        let created_at = chrono::Utc::now().timestamp_millis();

        let attachment = sqlx::query_as::<_, Attachment>(
            r#"
INSERT INTO attachments (message_id, file_name, created_at)
VALUES (?, ?, ?)
RETURNING *
            "#,
        )
        .bind(message_id)
        .bind(file_name)
        .bind(created_at)
        .fetch_one(pool)
        .await?;

        Ok(attachment)
    }

    pub async fn list_for_messages(
        pool: &Pool<Sqlite>,
        message_ids: &[i64],
    ) -> Result<Vec<Attachment>, AppError> {
        if message_ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut query = QueryBuilder::<Sqlite>::new("SELECT * FROM attachments WHERE message_id IN (");
        let mut separated = query.separated(", ");
        for id in message_ids {
            separated.push_bind(*id);
        }
        separated.push_unseparated(") ORDER BY id ASC");

        let attachments = query.build_query_as::<Attachment>().fetch_all(pool).await?;
        Ok(attachments)
    }
}
