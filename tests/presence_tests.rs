mod common;

use axum::http::{Method, StatusCode};
use serde_json::{json, Value};

use chat_server::db::{UserRepository, UserStatus};
use chat_server::hub::Channel;

use common::spawn_app;

#[tokio::test]
async fn subscriber_sees_offline_transition() {
    let app = spawn_app().await;
    let (user, _) = app.signup("grace").await;

    let (conn, mut events) = app.state.hub.connect(user).await;
    app.state.hub.join(conn, Channel::User(user)).await;

    app.state.presence.connected(user).await.unwrap();
    app.state.presence.set_status(user, UserStatus::Offline).await.unwrap();

    let online: Value = serde_json::from_str(&events.recv().await.unwrap()).unwrap();
    assert_eq!(online["event"], "status");
    assert_eq!(online["payload"], "ONLINE");

    let offline: Value = serde_json::from_str(&events.recv().await.unwrap()).unwrap();
    assert_eq!(offline["event"], "status");
    assert_eq!(offline["channel"], format!("user:{}", user));
    assert_eq!(offline["userId"], user);
    assert_eq!(offline["payload"], "OFFLINE");

    let stored = UserRepository::get_by_id(&app.state.db, user).await.unwrap().unwrap();
    assert_eq!(stored.status, UserStatus::Offline);
}

#[tokio::test]
async fn status_endpoint_persists_and_publishes() {
    let app = spawn_app().await;
    let (user, token) = app.signup("grace").await;
    let (other, _) = app.signup("heidi").await;

    let (conn, mut events) = app.state.hub.connect(user).await;
    app.state.hub.join(conn, Channel::User(user)).await;

    let (status, _) = app
        .request(
            Method::PATCH,
            &format!("/api/users/{}/status", user),
            Some(&token),
            Some(json!({ "status": "ONLINE" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let event: Value = serde_json::from_str(&events.try_recv().unwrap()).unwrap();
    assert_eq!(event["payload"], "ONLINE");

    let stored = UserRepository::get_by_id(&app.state.db, user).await.unwrap().unwrap();
    assert_eq!(stored.status, UserStatus::Online);

    // Nobody may set another user's presence
    let (status, _) = app
        .request(
            Method::PATCH,
            &format!("/api/users/{}/status", other),
            Some(&token),
            Some(json!({ "status": "ONLINE" })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn unknown_user_is_not_found() {
    let app = spawn_app().await;
    let result = app.state.presence.set_status(999, UserStatus::Online).await;
    assert!(result.is_err());
}
