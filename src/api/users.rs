use std::collections::{BTreeSet, HashMap};

use axum::{
    extract::{Multipart, Path, Query, State},
    Extension, Json,
};
use serde::{Deserialize, Serialize};

use crate::api::auth::validate_username;
use crate::api::middleware::AuthUser;
use crate::api::state::AppState;
use crate::api::uploads::read_files;
use crate::db::{
    Group, GroupRepository, GroupRequest, GroupRequestRepository, MessageRepository, User,
    UserRepository, UserStatus,
};
use crate::error::AppError;
use crate::friendship::{friendship_status, Friendship};
use crate::storage::{
    file_extension, picture_name, ObjectStore, GROUP_PFP_BUCKET, USER_PFP_BUCKET,
};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserView {
    #[serde(flatten)]
    pub user: User,
    pub pfp_url: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupView {
    #[serde(flatten)]
    pub group: Group,
    pub pfp_url: Option<String>,
}

pub fn user_view(store: &dyn ObjectStore, user: User) -> UserView {
    let pfp_url = user
        .pfp_file_extension
        .as_deref()
        .map(|ext| store.public_url(USER_PFP_BUCKET, &picture_name(user.id, ext)));
    UserView { user, pfp_url }
}

pub fn group_view(store: &dyn ObjectStore, group: Group) -> GroupView {
    let pfp_url = group
        .pfp_file_extension
        .as_deref()
        .map(|ext| store.public_url(GROUP_PFP_BUCKET, &picture_name(group.id, ext)));
    GroupView { group, pfp_url }
}

#[derive(Debug, Deserialize)]
pub struct LookupQuery {
    pub username: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LookupResponse {
    pub user: User,
    pub friendship_status: Friendship,
    pub pfp_url: String,
}

/// GET /api/users?username=
pub async fn lookup(
    State(state): State<AppState>,
    Extension(AuthUser(current)): Extension<AuthUser>,
    Query(query): Query<LookupQuery>,
) -> Result<Json<LookupResponse>, AppError> {
    let username = query.username.trim().to_lowercase();
    let user = UserRepository::get_by_username(&state.db, &username)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    let friendship_status = friendship_status(&state.db, current, user.id).await?;
    let view = user_view(state.store.as_ref(), user);
    let pfp_url = view
        .pfp_url
        .unwrap_or_else(|| format!("{}/placeholder.svg", state.config.client_url));

    Ok(Json(LookupResponse {
        user: view.user,
        friendship_status,
        pfp_url,
    }))
}

#[derive(Debug, Deserialize)]
pub struct UsernameRequest {
    pub username: String,
}

/// PATCH /api/users/:userId/username
pub async fn update_username(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(user_id): Path<i64>,
    Json(req): Json<UsernameRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    auth.ensure_is(user_id)?;
    let username = validate_username(&req.username)?;

    let user = UserRepository::update_username(&state.db, user_id, &username)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    Ok(Json(serde_json::json!({ "user": user })))
}

/// PATCH /api/users/:userId/profile-picture (multipart part `profile-picture`)
pub async fn update_profile_picture(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(user_id): Path<i64>,
    mut multipart: Multipart,
) -> Result<Json<serde_json::Value>, AppError> {
    auth.ensure_is(user_id)?;

    let mut files =
        read_files(&mut multipart, Some("profile-picture"), state.config.max_upload_bytes).await?;
    let file = files.swap_remove(0);
    let extension = file_extension(&file.file_name)
        .ok_or_else(|| AppError::Validation("Picture needs a file extension".to_string()))?;

    state.store.ensure_bucket(USER_PFP_BUCKET).await?;
    state
        .store
        .put(USER_PFP_BUCKET, &picture_name(user_id, &extension), file.bytes)
        .await?;
    UserRepository::set_pfp_extension(&state.db, user_id, &extension).await?;

    Ok(Json(serde_json::json!({ "message": "OK" })))
}

#[derive(Debug, Deserialize)]
pub struct StatusRequest {
    pub status: UserStatus,
}

/// PATCH /api/users/:userId/status
pub async fn update_status(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(user_id): Path<i64>,
    Json(req): Json<StatusRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    auth.ensure_is(user_id)?;
    state.presence.set_status(user_id, req.status).await?;

    Ok(Json(serde_json::json!({ "message": "OK" })))
}

/// DELETE /api/users/:userId
pub async fn delete_user(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(user_id): Path<i64>,
) -> Result<Json<serde_json::Value>, AppError> {
    auth.ensure_is(user_id)?;

    // Rows below are cascaded by the delete, their blobs are not
    let message_ids = MessageRepository::ids_with_attachments_for_user(&state.db, user_id).await?;
    let created_groups = GroupRepository::list_created_by(&state.db, user_id).await?;

    let user = UserRepository::delete(&state.db, user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;
    tracing::info!("🗑️ User {} deleted", user.id);

    if let Some(ext) = user.pfp_file_extension.as_deref() {
        if let Err(e) = state.store.remove(USER_PFP_BUCKET, &picture_name(user.id, ext)).await {
            tracing::warn!("⚠️ Could not remove profile picture of user {}: {}", user.id, e);
        }
    }
    for group in &created_groups {
        if let Some(ext) = group.pfp_file_extension.as_deref() {
            if let Err(e) = state.store.remove(GROUP_PFP_BUCKET, &picture_name(group.id, ext)).await {
                tracing::warn!("⚠️ Could not remove picture of group {}: {}", group.id, e);
            }
        }
    }
    state.messages.remove_attachment_buckets(&message_ids).await;

    Ok(Json(serde_json::json!({ "message": "OK" })))
}

#[derive(Debug, Serialize)]
pub struct ChatsResponse {
    pub users: Vec<UserView>,
    pub groups: Vec<GroupView>,
}

/// GET /api/users/:userId/chats
pub async fn chats(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(user_id): Path<i64>,
) -> Result<Json<ChatsResponse>, AppError> {
    auth.ensure_is(user_id)?;

    let messages = MessageRepository::list_involving(&state.db, user_id).await?;

    let mut user_ids = BTreeSet::new();
    let mut group_ids = BTreeSet::new();
    for message in &messages {
        match (message.group_id, message.recipient_id) {
            (Some(group_id), _) => {
                group_ids.insert(group_id);
            }
            (None, Some(recipient_id)) => {
                user_ids.insert(message.sender_id);
                user_ids.insert(recipient_id);
            }
            (None, None) => {}
        }
    }
    user_ids.remove(&user_id);
    group_ids.extend(GroupRepository::ids_for_user(&state.db, user_id).await?);

    let user_ids: Vec<i64> = user_ids.into_iter().collect();
    let group_ids: Vec<i64> = group_ids.into_iter().collect();

    let store = state.store.as_ref();
    let users = UserRepository::list_by_ids(&state.db, &user_ids)
        .await?
        .into_iter()
        .map(|u| user_view(store, u))
        .collect();
    let groups = GroupRepository::list_by_ids(&state.db, &group_ids)
        .await?
        .into_iter()
        .map(|g| group_view(store, g))
        .collect();

    Ok(Json(ChatsResponse { users, groups }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FriendsQuery {
    pub group_requests: Option<i64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FriendView {
    #[serde(flatten)]
    pub user: UserView,
    pub group_requests: Vec<GroupRequest>,
}

/// GET /api/users/:userId/friends?groupRequests=<groupId>
///
/// Each friend carries their pending requests to the given group, so a
/// group's creator can see who was already invited.
pub async fn friends(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(user_id): Path<i64>,
    Query(query): Query<FriendsQuery>,
) -> Result<Json<serde_json::Value>, AppError> {
    auth.ensure_is(user_id)?;

    let friends = UserRepository::list_friends(&state.db, user_id).await?;

    let mut requests: HashMap<i64, Vec<GroupRequest>> = HashMap::new();
    if let Some(group_id) = query.group_requests {
        for request in GroupRequestRepository::list(&state.db, Some(group_id), None).await? {
            requests.entry(request.user_id).or_default().push(request);
        }
    }

    let store = state.store.as_ref();
    let friends: Vec<FriendView> = friends
        .into_iter()
        .map(|u| FriendView {
            group_requests: requests.remove(&u.id).unwrap_or_default(),
            user: user_view(store, u),
        })
        .collect();

    Ok(Json(serde_json::json!({ "friends": friends })))
}
