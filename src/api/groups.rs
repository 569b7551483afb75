use axum::{
    extract::{Multipart, Path, State},
    Extension, Json,
};
use serde::{Deserialize, Serialize};

use crate::api::middleware::AuthUser;
use crate::api::state::AppState;
use crate::api::uploads::read_files;
use crate::api::users::{group_view, user_view, GroupView, UserView};
use crate::db::{Group, GroupRepository, MessageRepository};
use crate::error::AppError;
use crate::storage::{file_extension, picture_name, GROUP_PFP_BUCKET};
use sqlx::{Pool, Sqlite};

fn validate_group_name(name: &str) -> Result<String, AppError> {
    let trimmed = name.trim();
    if trimmed.is_empty() || trimmed.chars().count() > 64 {
        return Err(AppError::Validation("Group name must be 1-64 characters".to_string()));
    }
    Ok(trimmed.to_string())
}

async fn find_group(pool: &Pool<Sqlite>, group_id: i64) -> Result<Group, AppError> {
    GroupRepository::get_by_id(pool, group_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Group not found".to_string()))
}

/// Loads the group and checks that `user_id` created it.
pub async fn require_creator(
    pool: &Pool<Sqlite>,
    group_id: i64,
    user_id: i64,
) -> Result<Group, AppError> {
    let group = find_group(pool, group_id).await?;
    if group.creator_id != user_id {
        return Err(AppError::Forbidden("Only the group creator can do that".to_string()));
    }
    Ok(group)
}

pub async fn require_member(
    pool: &Pool<Sqlite>,
    group_id: i64,
    user_id: i64,
) -> Result<Group, AppError> {
    let group = find_group(pool, group_id).await?;
    if !GroupRepository::is_member(pool, group_id, user_id).await? {
        return Err(AppError::Forbidden("You are not a member of this group".to_string()));
    }
    Ok(group)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateGroupRequest {
    pub user_id: i64,
    pub name: String,
}

/// POST /api/groups
pub async fn create_group(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Json(req): Json<CreateGroupRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    auth.ensure_is(req.user_id)?;
    let name = validate_group_name(&req.name)?;

    let group = GroupRepository::create(&state.db, &name, req.user_id).await?;
    tracing::info!("👥 Group {} created by user {}", group.id, req.user_id);

    Ok(Json(serde_json::json!({ "group": group })))
}

#[derive(Debug, Serialize)]
pub struct GroupDetails {
    #[serde(flatten)]
    pub group: GroupView,
    pub members: Vec<UserView>,
}

/// GET /api/groups/:groupId (members only)
pub async fn get_group(
    State(state): State<AppState>,
    Extension(AuthUser(current)): Extension<AuthUser>,
    Path(group_id): Path<i64>,
) -> Result<Json<GroupDetails>, AppError> {
    let group = require_member(&state.db, group_id, current).await?;
    let store = state.store.as_ref();

    let members = GroupRepository::list_members(&state.db, group_id)
        .await?
        .into_iter()
        .map(|u| user_view(store, u))
        .collect();

    Ok(Json(GroupDetails {
        group: group_view(store, group),
        members,
    }))
}

#[derive(Debug, Deserialize)]
pub struct RenameGroupRequest {
    pub name: String,
}

/// PUT /api/groups/:groupId (creator only)
pub async fn rename_group(
    State(state): State<AppState>,
    Extension(AuthUser(current)): Extension<AuthUser>,
    Path(group_id): Path<i64>,
    Json(req): Json<RenameGroupRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    require_creator(&state.db, group_id, current).await?;
    let name = validate_group_name(&req.name)?;

    let group = GroupRepository::rename(&state.db, group_id, &name)
        .await?
        .ok_or_else(|| AppError::NotFound("Group not found".to_string()))?;

    Ok(Json(serde_json::json!({ "group": group })))
}

/// PATCH /api/groups/:groupId/profile-picture (creator only)
pub async fn update_profile_picture(
    State(state): State<AppState>,
    Extension(AuthUser(current)): Extension<AuthUser>,
    Path(group_id): Path<i64>,
    mut multipart: Multipart,
) -> Result<Json<serde_json::Value>, AppError> {
    require_creator(&state.db, group_id, current).await?;

    let mut files =
        read_files(&mut multipart, Some("profile-picture"), state.config.max_upload_bytes).await?;
    let file = files.swap_remove(0);
    let extension = file_extension(&file.file_name)
        .ok_or_else(|| AppError::Validation("Picture needs a file extension".to_string()))?;

    state.store.ensure_bucket(GROUP_PFP_BUCKET).await?;
    state
        .store
        .put(GROUP_PFP_BUCKET, &picture_name(group_id, &extension), file.bytes)
        .await?;
    GroupRepository::set_pfp_extension(&state.db, group_id, &extension).await?;

    Ok(Json(serde_json::json!({ "message": "OK" })))
}

/// DELETE /api/groups/:groupId (creator only)
pub async fn delete_group(
    State(state): State<AppState>,
    Extension(AuthUser(current)): Extension<AuthUser>,
    Path(group_id): Path<i64>,
) -> Result<Json<serde_json::Value>, AppError> {
    require_creator(&state.db, group_id, current).await?;

    let message_ids = MessageRepository::ids_with_attachments_in_group(&state.db, group_id).await?;

    if let Some(group) = GroupRepository::delete(&state.db, group_id).await? {
        tracing::info!("🗑️ Group {} deleted", group.id);
        if let Some(ext) = group.pfp_file_extension.as_deref() {
            if let Err(e) = state.store.remove(GROUP_PFP_BUCKET, &picture_name(group.id, ext)).await {
                tracing::warn!("⚠️ Could not remove picture of group {}: {}", group.id, e);
            }
        }
        state.messages.remove_attachment_buckets(&message_ids).await;
    }

    Ok(Json(serde_json::json!({ "message": "OK" })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_group_name() {
        assert_eq!(validate_group_name("  Book club ").unwrap(), "Book club");
        assert!(validate_group_name("   ").is_err());
        assert!(validate_group_name(&"g".repeat(65)).is_err());
    }
}
