use axum::{
    extract::{Query, State},
    Extension, Json,
};
use serde::{Deserialize, Serialize};

use crate::api::middleware::AuthUser;
use crate::api::state::AppState;
use crate::db::{FriendRequest, FriendRequestRepository, UserRepository};
use crate::error::AppError;
use crate::friendship::{friendship_status, Friendship};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FriendRequestBody {
    pub user_id: i64,
    pub requested_user_id: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FriendRequestResponse {
    pub friend_request: FriendRequest,
    pub friendship_status: Friendship,
}

/// POST /api/friend-requests
///
/// Sending a request to someone who already asked you accepts theirs.
pub async fn send_request(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Json(req): Json<FriendRequestBody>,
) -> Result<Json<FriendRequestResponse>, AppError> {
    auth.ensure_is(req.user_id)?;

    if req.user_id == req.requested_user_id {
        return Err(AppError::Validation("Cannot send a friend request to yourself".to_string()));
    }

    if UserRepository::get_by_id(&state.db, req.requested_user_id).await?.is_none() {
        return Err(AppError::NotFound("User not found".to_string()));
    }

    let friend_request =
        FriendRequestRepository::create(&state.db, req.user_id, req.requested_user_id)
            .await
            .map_err(|e| match e {
                AppError::Conflict(_) => {
                    AppError::Conflict("Friend request already sent".to_string())
                }
                other => other,
            })?;

    let friendship_status =
        friendship_status(&state.db, req.user_id, req.requested_user_id).await?;
    if friendship_status.is_friend() {
        tracing::info!("🤝 Users {} and {} are now friends", req.user_id, req.requested_user_id);
    } else {
        tracing::debug!("🤝 User {} asked user {} to be friends", req.user_id, req.requested_user_id);
    }

    Ok(Json(FriendRequestResponse {
        friend_request,
        friendship_status,
    }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoveQuery {
    pub user_id: i64,
    pub requested_user_id: i64,
}

/// DELETE /api/friend-requests?userId=&requestedUserId=
///
/// Declines a pending request, withdraws a sent one, or ends a friendship:
/// rows in both directions are removed.
pub async fn remove_request(
    State(state): State<AppState>,
    Extension(AuthUser(current)): Extension<AuthUser>,
    Query(query): Query<RemoveQuery>,
) -> Result<Json<serde_json::Value>, AppError> {
    if current != query.user_id && current != query.requested_user_id {
        return Err(AppError::Forbidden("Not your friend request".to_string()));
    }

    let removed =
        FriendRequestRepository::delete_between(&state.db, query.user_id, query.requested_user_id)
            .await?;
    if removed == 0 {
        return Err(AppError::NotFound("Friend request not found".to_string()));
    }

    Ok(Json(serde_json::json!({ "message": "OK" })))
}
