use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use serde::Deserialize;

use crate::api::groups::require_member;
use crate::api::middleware::AuthUser;
use crate::api::state::AppState;
use crate::db::{Group, GroupRepository, GroupRequest, GroupRequestRepository, UserRepository};
use crate::error::AppError;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListQuery {
    pub group_id: Option<i64>,
    pub user_id: Option<i64>,
}

/// GET /api/group-requests?groupId=&userId=
pub async fn list_requests(
    State(state): State<AppState>,
    Extension(AuthUser(current)): Extension<AuthUser>,
    Query(query): Query<ListQuery>,
) -> Result<Json<serde_json::Value>, AppError> {
    match (query.group_id, query.user_id) {
        (Some(group_id), _) => {
            require_member(&state.db, group_id, current).await?;
        }
        (None, Some(user_id)) if user_id == current => {}
        (None, Some(_)) => {
            return Err(AppError::Forbidden("Not your group requests".to_string()));
        }
        (None, None) => {
            return Err(AppError::Validation("groupId or userId is required".to_string()));
        }
    }

    let group_requests =
        GroupRequestRepository::list(&state.db, query.group_id, query.user_id).await?;

    Ok(Json(serde_json::json!({ "groupRequests": group_requests })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateQuery {
    pub user_id: i64,
}

/// POST /api/groups/:groupId/requests?userId=
///
/// Members invite others; anyone may ask to join on their own behalf.
pub async fn create_request(
    State(state): State<AppState>,
    Extension(AuthUser(current)): Extension<AuthUser>,
    Path(group_id): Path<i64>,
    Query(query): Query<CreateQuery>,
) -> Result<Json<serde_json::Value>, AppError> {
    if GroupRepository::get_by_id(&state.db, group_id).await?.is_none() {
        return Err(AppError::NotFound("Group not found".to_string()));
    }
    if query.user_id != current && !GroupRepository::is_member(&state.db, group_id, current).await? {
        return Err(AppError::Forbidden("Only members can invite others".to_string()));
    }
    if UserRepository::get_by_id(&state.db, query.user_id).await?.is_none() {
        return Err(AppError::NotFound("User not found".to_string()));
    }
    if GroupRepository::is_member(&state.db, group_id, query.user_id).await? {
        return Err(AppError::Conflict("User is already a member".to_string()));
    }

    let group_request =
        GroupRequestRepository::create(&state.db, group_id, query.user_id, current).await?;

    Ok(Json(serde_json::json!({ "groupRequest": group_request })))
}

async fn find_request(state: &AppState, id: i64) -> Result<GroupRequest, AppError> {
    GroupRequestRepository::get_by_id(&state.db, id)
        .await?
        .ok_or_else(|| AppError::NotFound("Group request not found".to_string()))
}

/// Invitations are accepted by the invitee; join requests by the group's creator.
fn may_accept(request: &GroupRequest, group: &Group, current: i64) -> bool {
    if request.is_invitation() {
        current == request.user_id
    } else {
        current == group.creator_id
    }
}

/// POST /api/group-requests/:groupRequestId/accept
pub async fn accept_request(
    State(state): State<AppState>,
    Extension(AuthUser(current)): Extension<AuthUser>,
    Path(request_id): Path<i64>,
) -> Result<Json<serde_json::Value>, AppError> {
    let request = find_request(&state, request_id).await?;
    let group = GroupRepository::get_by_id(&state.db, request.group_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Group not found".to_string()))?;

    if !may_accept(&request, &group, current) {
        return Err(AppError::Forbidden("This request is waiting for someone else".to_string()));
    }

    GroupRepository::add_member(&state.db, request.group_id, request.user_id).await?;
    GroupRequestRepository::delete(&state.db, request.id).await?;
    tracing::info!("👥 User {} joined group {}", request.user_id, request.group_id);

    Ok(Json(serde_json::json!({ "message": "OK" })))
}

/// DELETE /api/group-requests/:groupRequestId
pub async fn delete_request(
    State(state): State<AppState>,
    Extension(AuthUser(current)): Extension<AuthUser>,
    Path(request_id): Path<i64>,
) -> Result<Json<serde_json::Value>, AppError> {
    let request = find_request(&state, request_id).await?;

    if current != request.user_id
        && !GroupRepository::is_member(&state.db, request.group_id, current).await?
    {
        return Err(AppError::Forbidden("Not your group request".to_string()));
    }

    GroupRequestRepository::delete(&state.db, request.id).await?;

    Ok(Json(serde_json::json!({ "message": "OK" })))
}
