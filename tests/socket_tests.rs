mod common;

use std::net::SocketAddr;
use std::time::Duration;

use axum::http::{Method, StatusCode};
use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use chat_server::db::{UserRepository, UserStatus};
use chat_server::hub::Channel;

use common::{spawn_app, TestApp};

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

async fn serve(app: &TestApp) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let router = app.router.clone();
    tokio::spawn(async move {
        axum::serve(
            listener,
            router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .unwrap();
    });
    addr
}

async fn eventually<F, Fut>(mut check: F)
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    for _ in 0..200 {
        if check().await {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached in time");
}

async fn next_event(client: &mut Client) -> Value {
    loop {
        let frame = tokio::time::timeout(Duration::from_secs(2), client.next())
            .await
            .expect("event before timeout")
            .expect("socket open")
            .expect("valid frame");
        if let Message::Text(text) = frame {
            return serde_json::from_str(&text).expect("event is json");
        }
    }
}

async fn join(client: &mut Client, request: Value) {
    client.send(Message::Text(request.to_string())).await.unwrap();
}

#[tokio::test]
async fn connected_client_receives_messages_and_status() {
    let app = spawn_app().await;
    let (a, token_a) = app.signup("alice").await;
    let (b, token_b) = app.signup("bob").await;
    let addr = serve(&app).await;

    let (mut client, _) = connect_async(format!("ws://{}/api/socket?token={}", addr, token_a))
        .await
        .unwrap();
    join(&mut client, json!({ "type": "join_user", "userId": a })).await;

    let hub = app.state.hub.clone();
    eventually(|| {
        let hub = hub.clone();
        async move { hub.subscriber_count(Channel::User(a)).await == 1 }
    })
    .await;

    let user = UserRepository::get_by_id(&app.state.db, a).await.unwrap().unwrap();
    assert_eq!(user.status, UserStatus::Online);

    let (status, _) = app
        .request(
            Method::POST,
            "/api/messages",
            Some(&token_b),
            Some(json!({ "senderId": b, "recipientId": a, "text": "ping" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let event = next_event(&mut client).await;
    assert_eq!(event["event"], "message");
    assert_eq!(event["action"], "created");
    assert_eq!(event["payload"]["senderId"], b);
    assert_eq!(event["payload"]["text"], "ping");

    app.state.presence.set_status(a, UserStatus::Offline).await.unwrap();

    let event = next_event(&mut client).await;
    assert_eq!(event["event"], "status");
    assert_eq!(event["channel"], format!("user:{}", a));
    assert_eq!(event["payload"], "OFFLINE");

    client.close(None).await.unwrap();
    eventually(|| {
        let hub = hub.clone();
        async move { hub.connection_count().await == 0 }
    })
    .await;
}

#[tokio::test]
async fn disconnect_marks_user_offline() {
    let app = spawn_app().await;
    let (a, token_a) = app.signup("alice").await;
    let addr = serve(&app).await;

    let (mut client, _) = connect_async(format!("ws://{}/api/socket?token={}", addr, token_a))
        .await
        .unwrap();

    let db = app.state.db.clone();
    eventually(|| {
        let db = db.clone();
        async move {
            matches!(
                UserRepository::get_by_id(&db, a).await,
                Ok(Some(user)) if user.status == UserStatus::Online
            )
        }
    })
    .await;

    client.close(None).await.unwrap();

    eventually(|| {
        let db = db.clone();
        async move {
            matches!(
                UserRepository::get_by_id(&db, a).await,
                Ok(Some(user)) if user.status == UserStatus::Offline
            )
        }
    })
    .await;
}

#[tokio::test]
async fn invalid_token_is_refused() {
    let app = spawn_app().await;
    let addr = serve(&app).await;

    let result = connect_async(format!("ws://{}/api/socket?token=not-a-session", addr)).await;
    assert!(result.is_err());
}

#[tokio::test]
async fn hub_shutdown_closes_sockets() {
    let app = spawn_app().await;
    let (a, token_a) = app.signup("alice").await;
    let group_id = app.create_group(a, &token_a, "Closing").await;
    let addr = serve(&app).await;

    let (mut client, _) = connect_async(format!("ws://{}/api/socket?token={}", addr, token_a))
        .await
        .unwrap();
    join(&mut client, json!({ "type": "join_group", "groupId": group_id })).await;

    let hub = app.state.hub.clone();
    eventually(|| {
        let hub = hub.clone();
        async move { hub.subscriber_count(Channel::Group(group_id)).await == 1 }
    })
    .await;

    hub.shutdown().await;

    let closed = tokio::time::timeout(Duration::from_secs(2), async {
        while let Some(frame) = client.next().await {
            match frame {
                Ok(Message::Close(_)) | Err(_) => return true,
                Ok(_) => continue,
            }
        }
        true
    })
    .await
    .expect("socket closed before timeout");
    assert!(closed);
    assert_eq!(hub.connection_count().await, 0);
}

#[tokio::test]
async fn non_member_cannot_follow_a_group() {
    let app = spawn_app().await;
    let (a, token_a) = app.signup("alice").await;
    let (c, token_c) = app.signup("carol").await;
    let group_id = app.create_group(a, &token_a, "Private").await;
    let addr = serve(&app).await;

    let (mut client, _) = connect_async(format!("ws://{}/api/socket?token={}", addr, token_c))
        .await
        .unwrap();
    join(&mut client, json!({ "type": "join_group", "groupId": group_id })).await;
    join(&mut client, json!({ "type": "join_user", "userId": c })).await;

    // Requests are handled in order, so the group join was already decided
    let hub = app.state.hub.clone();
    eventually(|| {
        let hub = hub.clone();
        async move { hub.subscriber_count(Channel::User(c)).await == 1 }
    })
    .await;
    assert_eq!(hub.subscriber_count(Channel::Group(group_id)).await, 0);

    let (status, _) = app
        .request(
            Method::POST,
            "/api/messages",
            Some(&token_a),
            Some(json!({ "senderId": a, "groupId": group_id, "text": "secret" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    app.state.presence.set_status(c, UserStatus::Offline).await.unwrap();

    let event = next_event(&mut client).await;
    assert_eq!(event["event"], "status");
    assert_eq!(event["channel"], format!("user:{}", c));
}

#[tokio::test]
async fn other_users_channel_shows_presence_but_not_messages() {
    let app = spawn_app().await;
    let (a, _) = app.signup("alice").await;
    let (b, token_b) = app.signup("bob").await;
    let (_, token_c) = app.signup("carol").await;
    let addr = serve(&app).await;

    let (mut client, _) = connect_async(format!("ws://{}/api/socket?token={}", addr, token_c))
        .await
        .unwrap();
    join(&mut client, json!({ "type": "join_user", "userId": a })).await;

    let hub = app.state.hub.clone();
    eventually(|| {
        let hub = hub.clone();
        async move { hub.subscriber_count(Channel::User(a)).await == 1 }
    })
    .await;

    let (status, _) = app
        .request(
            Method::POST,
            "/api/messages",
            Some(&token_b),
            Some(json!({ "senderId": b, "recipientId": a, "text": "for alice only" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    app.state.presence.set_status(a, UserStatus::Online).await.unwrap();

    let event = next_event(&mut client).await;
    assert_eq!(event["event"], "status");
    assert_eq!(event["userId"], a);
    assert_eq!(event["payload"], "ONLINE");
}
