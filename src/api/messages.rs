use axum::{
    extract::{Multipart, Path, Query, State},
    Extension, Json,
};
use serde::{Deserialize, Serialize};

use crate::api::groups::require_member;
use crate::api::middleware::AuthUser;
use crate::api::state::AppState;
use crate::api::uploads::read_files;
use crate::api::users::{group_view, user_view, GroupView, UserView};
use crate::db::{Attachment, MessageRow, UserRepository};
use crate::error::AppError;
use crate::friendship::{friendship_status, Friendship};
use crate::messaging::{Conversation, Message, NewMessage, Page};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagesQuery {
    pub user_id: Option<i64>,
    pub partner_id: Option<i64>,
    pub group_id: Option<i64>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
    /// Include the partner's profile and friendship status.
    #[serde(default)]
    pub partner: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PartnerView {
    #[serde(flatten)]
    pub user: UserView,
    pub friendship_status: Friendship,
}

#[derive(Debug, Serialize)]
pub struct MessagesResponse {
    pub messages: Vec<Message>,
    pub partner: Option<PartnerView>,
    pub group: Option<GroupView>,
}

/// GET /api/messages?userId=&partnerId=|groupId=&limit=&offset=&partner=true
pub async fn list_messages(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Query(query): Query<MessagesQuery>,
) -> Result<Json<MessagesResponse>, AppError> {
    let page = Page {
        limit: query.limit,
        offset: query.offset,
    };
    let store = state.store.as_ref();

    if let Some(group_id) = query.group_id {
        let group = require_member(&state.db, group_id, auth.0).await?;
        let messages = state.messages.list(Conversation::Group(group_id), page).await?;

        return Ok(Json(MessagesResponse {
            messages,
            partner: None,
            group: Some(group_view(store, group)),
        }));
    }

    let (user_id, partner_id) = match (query.user_id, query.partner_id) {
        (Some(u), Some(p)) if u > 0 && p > 0 => (u, p),
        _ => {
            return Err(AppError::Validation(
                "Either groupId or both userId and partnerId are required".to_string(),
            ))
        }
    };
    auth.ensure_is(user_id)?;

    let messages = state
        .messages
        .list(Conversation::Direct { user_id, partner_id }, page)
        .await?;

    let partner = if query.partner {
        match UserRepository::get_by_id(&state.db, partner_id).await? {
            Some(user) => Some(PartnerView {
                friendship_status: friendship_status(&state.db, user_id, partner_id).await?,
                user: user_view(store, user),
            }),
            None => None,
        }
    } else {
        None
    };

    Ok(Json(MessagesResponse {
        messages,
        partner,
        group: None,
    }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateMessageRequest {
    pub sender_id: i64,
    pub recipient_id: Option<i64>,
    pub group_id: Option<i64>,
    #[serde(default)]
    pub text: String,
}

/// POST /api/messages
pub async fn create_message(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Json(req): Json<CreateMessageRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    auth.ensure_is(req.sender_id)?;
    let new = NewMessage::new(req.sender_id, req.text, req.recipient_id, req.group_id)?;

    if let Some(group_id) = req.group_id {
        require_member(&state.db, group_id, req.sender_id).await?;
    }
    if let Some(recipient_id) = req.recipient_id {
        if UserRepository::get_by_id(&state.db, recipient_id).await?.is_none() {
            return Err(AppError::NotFound("Recipient not found".to_string()));
        }
    }

    let message = state.messages.create(new).await?;

    Ok(Json(serde_json::json!({ "message": message })))
}

async fn own_message(state: &AppState, auth: AuthUser, message_id: i64) -> Result<MessageRow, AppError> {
    let row = state.messages.get(message_id).await?;
    if row.sender_id != auth.0 {
        return Err(AppError::Forbidden("Only the sender can change this message".to_string()));
    }
    Ok(row)
}

#[derive(Debug, Deserialize)]
pub struct UpdateMessageRequest {
    pub text: String,
}

/// PUT /api/messages/:messageId
pub async fn update_message(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(message_id): Path<i64>,
    Json(req): Json<UpdateMessageRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    own_message(&state, auth, message_id).await?;
    let message = state.messages.update(message_id, &req.text).await?;

    Ok(Json(serde_json::json!({ "message": message })))
}

/// DELETE /api/messages/:messageId
pub async fn delete_message(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(message_id): Path<i64>,
) -> Result<Json<serde_json::Value>, AppError> {
    own_message(&state, auth, message_id).await?;
    state.messages.delete(message_id).await?;

    Ok(Json(serde_json::json!({ "message": "OK" })))
}

/// POST /api/messages/:messageId/attachments (multipart, one attachment per file part)
pub async fn upload_attachments(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(message_id): Path<i64>,
    mut multipart: Multipart,
) -> Result<Json<serde_json::Value>, AppError> {
    own_message(&state, auth, message_id).await?;

    let files = read_files(&mut multipart, None, state.config.max_upload_bytes).await?;

    let mut attachments: Vec<Attachment> = Vec::with_capacity(files.len());
    for file in files {
        attachments.push(
            state
                .messages
                .add_attachment(message_id, &file.file_name, file.bytes)
                .await?,
        );
    }

    Ok(Json(serde_json::json!({ "attachments": attachments })))
}
