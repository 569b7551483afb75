pub mod auth;
pub mod friends;
pub mod group_requests;
pub mod groups;
pub mod messages;
pub mod middleware;
pub mod socket;
pub mod state;
pub mod uploads;
pub mod users;

pub use state::AppState;
pub use middleware::RateLimiter;

use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue, Method},
    middleware as axum_middleware,
    routing::{delete, get, patch, post},
    Router,
};
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    services::ServeDir,
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use serde::Serialize;

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

/// Builds the API router. `files_dir`, when given, is served at `/files` so
/// the URLs produced by the local object store resolve.
pub fn create_router(
    state: AppState,
    rate_limiter: Arc<RateLimiter>,
    files_dir: Option<&Path>,
) -> Router {
    let protected = Router::new()
        .route("/api/auth/logout", post(auth::logout))
        .route("/api/auth/me", get(auth::me))

        .route("/api/users", get(users::lookup))
        .route("/api/users/:user_id", delete(users::delete_user))
        .route("/api/users/:user_id/username", patch(users::update_username))
        .route("/api/users/:user_id/profile-picture", patch(users::update_profile_picture))
        .route("/api/users/:user_id/status", patch(users::update_status))
        .route("/api/users/:user_id/chats", get(users::chats))
        .route("/api/users/:user_id/friends", get(users::friends))

        .route(
            "/api/friend-requests",
            post(friends::send_request).delete(friends::remove_request),
        )

        .route("/api/groups", post(groups::create_group))
        .route(
            "/api/groups/:group_id",
            get(groups::get_group)
                .put(groups::rename_group)
                .delete(groups::delete_group),
        )
        .route("/api/groups/:group_id/profile-picture", patch(groups::update_profile_picture))
        .route("/api/groups/:group_id/requests", post(group_requests::create_request))
        .route("/api/group-requests", get(group_requests::list_requests))
        .route("/api/group-requests/:request_id", delete(group_requests::delete_request))
        .route("/api/group-requests/:request_id/accept", post(group_requests::accept_request))

        .route(
            "/api/messages",
            get(messages::list_messages).post(messages::create_message),
        )
        .route(
            "/api/messages/:message_id",
            axum::routing::put(messages::update_message).delete(messages::delete_message),
        )
        .route("/api/messages/:message_id/attachments", post(messages::upload_attachments))
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::auth_middleware,
        ));

    let mut router = Router::new()
        .route("/api/health", get(health))
        .route("/api/auth/signup", post(auth::signup))
        .route("/api/auth/login", post(auth::login))
        .route("/api/socket", get(socket::socket_handler))
        .merge(protected);

    if let Some(dir) = files_dir {
        router = router.nest_service("/files", ServeDir::new(dir));
    }

    // Several attachments may share one request body
    let body_limit = state.config.max_upload_bytes.saturating_mul(10);
    let timeout = Duration::from_secs(state.config.request_timeout_secs);
    let cors = cors_layer(&state.config.client_url);

    router
        .layer(axum_middleware::from_fn(move |req, next| {
            let limiter = rate_limiter.clone();
            middleware::rate_limit_middleware(limiter, req, next)
        }))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TimeoutLayer::new(timeout))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn cors_layer(client_url: &str) -> CorsLayer {
    match client_url.parse::<HeaderValue>() {
        Ok(origin) => CorsLayer::new()
            .allow_origin(AllowOrigin::exact(origin))
            .allow_methods([Method::GET, Method::POST, Method::PUT, Method::PATCH, Method::DELETE])
            .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
            .allow_credentials(true),
        Err(_) => {
            tracing::warn!("⚠️ CLIENT_URL {:?} is not a valid origin, allowing any", client_url);
            CorsLayer::permissive()
        }
    }
}

async fn health() -> axum::Json<HealthResponse> {
    axum::Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}
