mod common;

use axum::http::{Method, StatusCode};
use serde_json::json;

use chat_server::friendship::{friendship_status, Friendship};

use common::spawn_app;

#[tokio::test]
async fn request_then_reciprocate_becomes_mutual() {
    let app = spawn_app().await;
    let (a, token_a) = app.signup("alice").await;
    let (b, token_b) = app.signup("bob").await;
    let db = &app.state.db;

    assert_eq!(friendship_status(db, a, b).await.unwrap(), Friendship::NoRelation);

    let (status, body) = app
        .request(
            Method::POST,
            "/api/friend-requests",
            Some(&token_a),
            Some(json!({ "userId": a, "requestedUserId": b })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["friendshipStatus"], "request sent");

    assert_eq!(friendship_status(db, a, b).await.unwrap(), Friendship::RequestSent);
    assert_eq!(friendship_status(db, b, a).await.unwrap(), Friendship::AwaitingAnswer);

    let (status, body) = app
        .request(
            Method::POST,
            "/api/friend-requests",
            Some(&token_b),
            Some(json!({ "userId": b, "requestedUserId": a })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["friendshipStatus"], "friend");

    assert_eq!(friendship_status(db, a, b).await.unwrap(), Friendship::Friends);
    assert_eq!(friendship_status(db, b, a).await.unwrap(), Friendship::Friends);
}

#[tokio::test]
async fn lookup_reports_status_relative_to_caller() {
    let app = spawn_app().await;
    let (a, token_a) = app.signup("alice").await;
    let (b, token_b) = app.signup("bob").await;

    app.request(
        Method::POST,
        "/api/friend-requests",
        Some(&token_a),
        Some(json!({ "userId": a, "requestedUserId": b })),
    )
    .await;

    let (status, body) = app
        .request(Method::GET, "/api/users?username=alice", Some(&token_b), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["id"], a);
    assert_eq!(body["friendshipStatus"], "waits for your answer");
    assert_eq!(body["pfpUrl"], "http://localhost:5173/placeholder.svg");

    let (status, _) = app
        .request(Method::GET, "/api/users?username=nobody", Some(&token_b), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn invalid_ids_resolve_to_no_relation() {
    let app = spawn_app().await;
    let db = &app.state.db;

    assert_eq!(friendship_status(db, 0, 2).await.unwrap(), Friendship::NoRelation);
    assert_eq!(friendship_status(db, 1, -5).await.unwrap(), Friendship::NoRelation);
}

#[tokio::test]
async fn self_and_duplicate_requests_are_rejected() {
    let app = spawn_app().await;
    let (a, token_a) = app.signup("alice").await;
    let (b, _) = app.signup("bob").await;

    let (status, _) = app
        .request(
            Method::POST,
            "/api/friend-requests",
            Some(&token_a),
            Some(json!({ "userId": a, "requestedUserId": a })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let send = json!({ "userId": a, "requestedUserId": b });
    let (status, _) = app
        .request(Method::POST, "/api/friend-requests", Some(&token_a), Some(send.clone()))
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app
        .request(Method::POST, "/api/friend-requests", Some(&token_a), Some(send))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    // Acting as someone else
    let (status, _) = app
        .request(
            Method::POST,
            "/api/friend-requests",
            Some(&token_a),
            Some(json!({ "userId": b, "requestedUserId": a })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn unfriending_removes_both_rows() {
    let app = spawn_app().await;
    let (a, token_a) = app.signup("alice").await;
    let (b, token_b) = app.signup("bob").await;
    app.befriend((a, &token_a), (b, &token_b)).await;

    let (status, body) = app
        .request(Method::GET, &format!("/api/users/{}/friends", a), Some(&token_a), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["friends"].as_array().unwrap().len(), 1);
    assert_eq!(body["friends"][0]["username"], "bob");

    let (status, _) = app
        .request(
            Method::DELETE,
            &format!("/api/friend-requests?userId={}&requestedUserId={}", b, a),
            Some(&token_a),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    assert_eq!(
        friendship_status(&app.state.db, a, b).await.unwrap(),
        Friendship::NoRelation
    );

    let (_, body) = app
        .request(Method::GET, &format!("/api/users/{}/friends", a), Some(&token_a), None)
        .await;
    assert!(body["friends"].as_array().unwrap().is_empty());
}
