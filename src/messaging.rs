//! Message creation, listing and editing, plus the matching hub broadcasts.
//!
//! Message text is kept in storage as base64. This is an encoding, not
//! encryption: anyone with database access can read it.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use sqlx::{Pool, Sqlite};

use crate::db::{Attachment, AttachmentRepository, MessageRepository, MessageRow};
use crate::error::AppError;
use crate::hub::{Channel, Hub, MessageAction, ServerEvent};
use crate::storage::{attachment_object_name, message_bucket, sanitize_object_name, ObjectStore};

pub const MAX_TEXT_LEN: usize = 4096;

pub fn encode_text(text: &str) -> String {
    base64_simd::STANDARD.encode_to_string(text.as_bytes())
}

pub fn decode_text(encoded: &str) -> Result<String, AppError> {
    let bytes = base64_simd::STANDARD
        .decode_to_vec(encoded)
        .map_err(|e| AppError::Internal(format!("Stored message text is not base64: {}", e)))?;
    String::from_utf8(bytes)
        .map_err(|e| AppError::Internal(format!("Stored message text is not UTF-8: {}", e)))
}

/// Where a message goes: exactly one of a user or a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    Recipient(i64),
    Group(i64),
}

impl Target {
    pub fn from_parts(recipient_id: Option<i64>, group_id: Option<i64>) -> Result<Self, AppError> {
        match (recipient_id, group_id) {
            (Some(_), Some(_)) => Err(AppError::Validation(
                "A message cannot have both a recipient and a group".to_string(),
            )),
            (None, None) => Err(AppError::Validation(
                "A message needs either a recipient or a group".to_string(),
            )),
            (Some(id), None) | (None, Some(id)) if id <= 0 => {
                Err(AppError::Validation(format!("Invalid target id: {}", id)))
            }
            (Some(id), None) => Ok(Target::Recipient(id)),
            (None, Some(id)) => Ok(Target::Group(id)),
        }
    }

    fn recipient_id(&self) -> Option<i64> {
        match self {
            Target::Recipient(id) => Some(*id),
            Target::Group(_) => None,
        }
    }

    fn group_id(&self) -> Option<i64> {
        match self {
            Target::Group(id) => Some(*id),
            Target::Recipient(_) => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewMessage {
    pub sender_id: i64,
    pub text: String,
    pub target: Target,
}

impl NewMessage {
    pub fn new(
        sender_id: i64,
        text: impl Into<String>,
        recipient_id: Option<i64>,
        group_id: Option<i64>,
    ) -> Result<Self, AppError> {
        if sender_id <= 0 {
            return Err(AppError::Validation(format!("Invalid sender id: {}", sender_id)));
        }
        let text = text.into();
        validate_text(&text)?;

        Ok(NewMessage {
            sender_id,
            text,
            target: Target::from_parts(recipient_id, group_id)?,
        })
    }
}

fn validate_text(text: &str) -> Result<(), AppError> {
    if text.chars().count() > MAX_TEXT_LEN {
        return Err(AppError::Validation(format!(
            "Message must be at most {} characters",
            MAX_TEXT_LEN
        )));
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Conversation {
    Direct { user_id: i64, partner_id: i64 },
    Group(i64),
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Page {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl Page {
    fn bounds(&self) -> (i64, i64) {
        let limit = self.limit.filter(|l| *l > 0).unwrap_or(-1);
        let offset = self.offset.filter(|o| *o > 0).unwrap_or(0);
        (limit, offset)
    }
}

/// A message with its text decoded and attachment URLs resolved.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: i64,
    pub sender_id: i64,
    pub recipient_id: Option<i64>,
    pub group_id: Option<i64>,
    pub text: String,
    pub created_at: i64,
    pub updated_at: i64,
    pub attachment_urls: Vec<String>,
}

impl Message {
    fn from_row(row: MessageRow, attachment_urls: Vec<String>) -> Result<Self, AppError> {
        Ok(Message {
            text: decode_text(&row.text)?,
            id: row.id,
            sender_id: row.sender_id,
            recipient_id: row.recipient_id,
            group_id: row.group_id,
            created_at: row.created_at,
            updated_at: row.updated_at,
            attachment_urls,
        })
    }
}

/// Channels that hear about a message: the group's channel, or both
/// participants' user channels for a direct message.
pub fn channels_for(sender_id: i64, recipient_id: Option<i64>, group_id: Option<i64>) -> Vec<Channel> {
    if let Some(group_id) = group_id {
        return vec![Channel::Group(group_id)];
    }

    let mut channels = vec![Channel::User(sender_id)];
    if let Some(recipient_id) = recipient_id {
        if recipient_id != sender_id {
            channels.push(Channel::User(recipient_id));
        }
    }
    channels
}

#[derive(Clone)]
pub struct MessageService {
    db: Pool<Sqlite>,
    store: Arc<dyn ObjectStore>,
    hub: Hub,
}

impl MessageService {
    pub fn new(db: Pool<Sqlite>, store: Arc<dyn ObjectStore>, hub: Hub) -> Self {
        Self { db, store, hub }
    }

    pub async fn create(&self, new: NewMessage) -> Result<Message, AppError> {
        let row = MessageRepository::create(
            &self.db,
            new.sender_id,
            new.target.recipient_id(),
            new.target.group_id(),
            &encode_text(&new.text),
        )
        .await?;

        let message = Message::from_row(row, Vec::new())?;
        tracing::info!("✉️ Message {} created by user {}", message.id, message.sender_id);

        self.broadcast(MessageAction::Created, &message).await;
        Ok(message)
    }

    pub async fn get(&self, id: i64) -> Result<MessageRow, AppError> {
        MessageRepository::get_by_id(&self.db, id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Message {} not found", id)))
    }

    /// Messages of the conversation, oldest first.
    pub async fn list(&self, conversation: Conversation, page: Page) -> Result<Vec<Message>, AppError> {
        let (limit, offset) = page.bounds();
        let rows = match conversation {
            Conversation::Direct { user_id, partner_id } => {
                MessageRepository::list_direct(&self.db, user_id, partner_id, limit, offset).await?
            }
            Conversation::Group(group_id) => {
                MessageRepository::list_group(&self.db, group_id, limit, offset).await?
            }
        };

        self.decorate(rows).await
    }

    pub async fn update(&self, id: i64, text: &str) -> Result<Message, AppError> {
        validate_text(text)?;

        let row = MessageRepository::update_text(&self.db, id, &encode_text(text))
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Message {} not found", id)))?;

        let message = self
            .decorate(vec![row])
            .await?
            .pop()
            .ok_or_else(|| AppError::Internal("Updated message vanished".to_string()))?;
        tracing::info!("✏️ Message {} updated", id);

        self.broadcast(MessageAction::Updated, &message).await;
        Ok(message)
    }

    /// Removes the message and its attachment rows, then drops the attachment
    /// bucket. A failed bucket removal is logged, not returned.
    pub async fn delete(&self, id: i64) -> Result<Message, AppError> {
        let row = MessageRepository::delete(&self.db, id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Message {} not found", id)))?;

        let message = Message::from_row(row, Vec::new())?;
        tracing::info!("🗑️ Message {} deleted", id);

        self.broadcast(MessageAction::Deleted, &message).await;
        self.remove_attachment_buckets(&[id]).await;

        Ok(message)
    }

    /// Drops the attachment buckets of messages whose rows are already gone
    /// or about to be cascaded away. Failures are logged, not returned.
    pub async fn remove_attachment_buckets(&self, message_ids: &[i64]) {
        for id in message_ids {
            if let Err(e) = self.store.remove_bucket(&message_bucket(*id)).await {
                tracing::warn!("⚠️ Could not remove attachments of message {}: {}", id, e);
            }
        }
    }

    /// Records the attachment and uploads its bytes. The row is not rolled
    /// back if the upload fails.
    pub async fn add_attachment(
        &self,
        message_id: i64,
        file_name: &str,
        bytes: Vec<u8>,
    ) -> Result<Attachment, AppError> {
        let file_name = sanitize_object_name(file_name)?;
        let attachment = AttachmentRepository::create(&self.db, message_id, &file_name).await?;

        let bucket = message_bucket(message_id);
        self.store.ensure_bucket(&bucket).await?;
        self.store
            .put(&bucket, &attachment_object_name(attachment.id, &file_name), bytes)
            .await?;

        tracing::info!("📎 Attachment {} added to message {}", attachment.id, message_id);
        Ok(attachment)
    }

    pub async fn decorate(&self, rows: Vec<MessageRow>) -> Result<Vec<Message>, AppError> {
        let ids: Vec<i64> = rows.iter().map(|m| m.id).collect();
        let attachments = AttachmentRepository::list_for_messages(&self.db, &ids).await?;

        let mut urls: HashMap<i64, Vec<String>> = HashMap::new();
        for attachment in attachments {
            let url = self.store.public_url(
                &message_bucket(attachment.message_id),
                &attachment_object_name(attachment.id, &attachment.file_name),
            );
            urls.entry(attachment.message_id).or_default().push(url);
        }

        rows.into_iter()
            .map(|row| {
                let attachment_urls = urls.remove(&row.id).unwrap_or_default();
                Message::from_row(row, attachment_urls)
            })
            .collect()
    }

    async fn broadcast(&self, action: MessageAction, message: &Message) {
        let channels = channels_for(message.sender_id, message.recipient_id, message.group_id);
        let event = ServerEvent::Message {
            action,
            payload: message.clone(),
        };
        self.hub.publish_all(&channels, &event).await;
    }
}
