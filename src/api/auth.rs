use axum::{
    extract::State,
    http::HeaderMap,
    Extension, Json,
};
use serde::{Deserialize, Serialize};

use crate::api::middleware::{bearer_token, AuthUser};
use crate::api::state::AppState;
use crate::crypto::{generate_salt, hash_password, verify_password};
use crate::db::{SessionRepository, User, UserRepository};
use crate::error::AppError;

#[derive(Debug, Deserialize)]
pub struct CredentialsRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionResponse {
    pub user: User,
    pub session_token: String,
    pub expires_at: i64,
}

/// Validate and sanitize username
pub fn validate_username(username: &str) -> Result<String, AppError> {
    let trimmed = username.trim();

    if trimmed.len() < 3 || trimmed.len() > 32 {
        return Err(AppError::Validation("Username must be 3-32 characters".to_string()));
    }

    if !trimmed.chars().all(|c| c.is_alphanumeric() || c == '_' || c == '-') {
        return Err(AppError::Validation(
            "Username must be alphanumeric, underscore, or hyphen".to_string(),
        ));
    }

    Ok(trimmed.to_lowercase())
}

/// POST /api/auth/signup
pub async fn signup(
    State(state): State<AppState>,
    Json(req): Json<CredentialsRequest>,
) -> Result<Json<SessionResponse>, AppError> {
    let username = validate_username(&req.username)?;

    if req.password.chars().count() < 8 {
        return Err(AppError::Validation("Password must be at least 8 characters".to_string()));
    }

    if UserRepository::get_by_username(&state.db, &username).await?.is_some() {
        return Err(AppError::Conflict("Username already exists".to_string()));
    }

    let salt = generate_salt();
    let password_hash = hash_password(&req.password, &salt)?;

    let user = UserRepository::create(&state.db, &username, &password_hash, &salt).await?;
    tracing::info!("🆕 User {} signed up as {}", user.id, user.username);

    let session = SessionRepository::create(
        &state.db,
        user.id,
        state.config.session_expiry_hours,
    ).await?;

    Ok(Json(SessionResponse {
        user,
        session_token: session.token,
        expires_at: session.expires_at,
    }))
}

/// POST /api/auth/login
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<CredentialsRequest>,
) -> Result<Json<SessionResponse>, AppError> {
    let username = validate_username(&req.username)
        .map_err(|_| AppError::Unauthorized("Invalid credentials".to_string()))?;

    let user = UserRepository::get_by_username(&state.db, &username)
        .await?
        .ok_or_else(|| AppError::Unauthorized("Invalid credentials".to_string()))?;

    if !verify_password(&req.password, &user.password_hash, &user.password_salt)? {
        return Err(AppError::Unauthorized("Invalid credentials".to_string()));
    }

    let session = SessionRepository::create(
        &state.db,
        user.id,
        state.config.session_expiry_hours,
    ).await?;

    Ok(Json(SessionResponse {
        user,
        session_token: session.token,
        expires_at: session.expires_at,
    }))
}

/// POST /api/auth/logout (requires auth)
pub async fn logout(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, AppError> {
    let token = bearer_token(&headers)?;
    if SessionRepository::revoke(&state.db, token).await? {
        tracing::debug!("👋 Session revoked");
    }

    Ok(Json(serde_json::json!({"message": "OK"})))
}

/// GET /api/auth/me (requires auth)
pub async fn me(
    State(state): State<AppState>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
) -> Result<Json<User>, AppError> {
    let user = UserRepository::get_by_id(&state.db, user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    Ok(Json(user))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_username() {
        assert_eq!(validate_username("  Alice_01 ").unwrap(), "alice_01");
        assert!(validate_username("ab").is_err());
        assert!(validate_username("bad name").is_err());
        assert!(validate_username(&"x".repeat(33)).is_err());
    }
}
