use axum::{
    extract::{ConnectInfo, Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

use crate::api::state::AppState;
use crate::db::SessionRepository;
use crate::error::AppError;

/// Id of the user owning the request's session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthUser(pub i64);

impl AuthUser {
    /// Rejects requests acting on behalf of another user.
    pub fn ensure_is(&self, user_id: i64) -> Result<(), AppError> {
        if self.0 == user_id {
            Ok(())
        } else {
            Err(AppError::Forbidden("You can only act as yourself".to_string()))
        }
    }
}

pub fn bearer_token(headers: &HeaderMap) -> Result<&str, AppError> {
    let auth_header = headers
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .ok_or_else(|| AppError::Unauthorized("Missing Authorization header".to_string()))?;

    auth_header
        .strip_prefix("Bearer ")
        .ok_or_else(|| AppError::Unauthorized("Invalid Authorization format".to_string()))
}

pub async fn authenticate(state: &AppState, token: &str) -> Result<AuthUser, AppError> {
    SessionRepository::user_for_token(&state.db, token)
        .await?
        .map(AuthUser)
        .ok_or_else(|| AppError::Unauthorized("Invalid or expired session".to_string()))
}

/// Authentication middleware - validates session tokens
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = bearer_token(request.headers())?;
    let user = authenticate(&state, token).await?;

    request.extensions_mut().insert(user);

    Ok(next.run(request).await)
}

/// Fixed-window request counter per client IP.
#[derive(Clone)]
pub struct RateLimiter {
    // IP -> (count, window_start)
    state: Arc<Mutex<HashMap<IpAddr, (u32, Instant)>>>,
    max_requests: u32,
    window: Duration,
}

impl RateLimiter {
    pub fn new(max_requests: u32, window_secs: u64) -> Self {
        Self {
            state: Arc::new(Mutex::new(HashMap::new())),
            max_requests,
            window: Duration::from_secs(window_secs),
        }
    }

    pub async fn check(&self, ip: IpAddr) -> bool {
        let mut state = self.state.lock().await;
        let now = Instant::now();

        let entry = state.entry(ip).or_insert((0, now));

        if now.duration_since(entry.1) > self.window {
            *entry = (1, now);
            return true;
        }

        if entry.0 < self.max_requests {
            entry.0 += 1;
            true
        } else {
            false
        }
    }

    /// Drops entries whose window ended long ago
    pub async fn cleanup(&self) {
        let mut state = self.state.lock().await;
        let now = Instant::now();
        state.retain(|_, (_, time)| now.duration_since(*time) <= self.window * 2);
    }
}

pub async fn rate_limit_middleware(
    limiter: Arc<RateLimiter>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    // Absent when the router is driven without a socket (tests)
    let ip = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip())
        .unwrap_or(IpAddr::V4(Ipv4Addr::LOCALHOST));

    if !limiter.check(ip).await {
        return Err(AppError::RateLimited("Rate limit exceeded - too many requests".to_string()));
    }

    Ok(next.run(request).await)
}
