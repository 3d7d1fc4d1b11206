//! Shared harness: a real server on an ephemeral port backed by a throwaway
//! SQLite file.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use serde_json::{json, Value};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use social_api::api::{create_router, AppState, RateLimiter};
use social_api::config::Config;

pub type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

pub struct TestServer {
    pub base_url: String,
    pub addr: SocketAddr,
    pub state: AppState,
    pub client: reqwest::Client,
    _tmp: tempfile::TempDir,
}

pub struct TestUser {
    pub id: i64,
    pub username: String,
    pub token: String,
}

pub async fn start_test_server() -> TestServer {
    let tmp = tempfile::tempdir().expect("Failed to create temp dir");
    let root = tmp.path().to_str().unwrap().to_string();

    let config = Config {
        database_url: format!("sqlite://{}/test.db", root),
        upload_dir: format!("{}/uploads", root),
        jwt_secret: "test-secret".to_string(),
        max_upload_bytes: 1024 * 1024,
        rate_limit_max_requests: 10_000,
        ..Config::default()
    };

    let pool = social_api::db::connect(&config).await.expect("Failed to init DB");
    let state = AppState::new(pool, config);
    let limiter = Arc::new(RateLimiter::new(10_000, 60));

    let app = create_router(state.clone(), limiter);
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .unwrap();
    });

    TestServer {
        base_url: format!("http://{}", addr),
        addr,
        state,
        client: reqwest::Client::new(),
        _tmp: tmp,
    }
}

impl TestServer {
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub fn ws_url(&self, peer_id: i64, token: Option<&str>) -> String {
        match token {
            Some(token) => format!("ws://{}/ws/chat/{}?token={}", self.addr, peer_id, token),
            None => format!("ws://{}/ws/chat/{}", self.addr, peer_id),
        }
    }

    /// Register and log in; returns the id and a bearer token.
    pub async fn signup(&self, username: &str) -> TestUser {
        let email = format!("{}@example.com", username);
        let password = "correct horse battery staple";

        let resp = self
            .client
            .post(self.url("/auth/register"))
            .json(&json!({ "username": username, "email": email, "password": password }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 201, "register {}", username);
        let body: Value = resp.json().await.unwrap();
        let id = body["id"].as_i64().unwrap();

        let resp = self
            .client
            .post(self.url("/auth/login"))
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
        let body: Value = resp.json().await.unwrap();

        TestUser {
            id,
            username: username.to_string(),
            token: body["access_token"].as_str().unwrap().to_string(),
        }
    }

    pub async fn get(&self, path: &str, user: &TestUser) -> reqwest::Response {
        self.client
            .get(self.url(path))
            .bearer_auth(&user.token)
            .send()
            .await
            .unwrap()
    }

    pub async fn post_json(&self, path: &str, user: &TestUser, body: Value) -> reqwest::Response {
        self.client
            .post(self.url(path))
            .bearer_auth(&user.token)
            .json(&body)
            .send()
            .await
            .unwrap()
    }

    pub async fn connect(&self, user: &TestUser, peer_id: i64) -> Socket {
        let (socket, _) = tokio_tungstenite::connect_async(self.ws_url(peer_id, Some(&user.token)))
            .await
            .expect("ws handshake");
        socket
    }

    /// Registration happens after the handshake; poll until it lands.
    pub async fn wait_online(&self, user_id: i64) {
        for _ in 0..100 {
            if self.state.registry.is_online(user_id) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        panic!("user {} never came online", user_id);
    }

    pub async fn wait_offline(&self, user_id: i64) {
        for _ in 0..100 {
            if !self.state.registry.is_online(user_id) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        panic!("user {} never went offline", user_id);
    }
}

/// Next JSON text frame, skipping control frames.
pub async fn next_json(socket: &mut Socket) -> Value {
    loop {
        let frame = tokio::time::timeout(Duration::from_secs(2), socket.next())
            .await
            .expect("timed out waiting for frame")
            .expect("stream ended")
            .expect("ws error");

        match frame {
            Message::Text(text) => return serde_json::from_str(text.as_str()).unwrap(),
            Message::Ping(_) | Message::Pong(_) => continue,
            other => panic!("unexpected frame: {:?}", other),
        }
    }
}

/// Wait for the server's close frame and return its code.
pub async fn close_code(socket: &mut Socket) -> u16 {
    loop {
        let frame = tokio::time::timeout(Duration::from_secs(2), socket.next())
            .await
            .expect("timed out waiting for close")
            .expect("stream ended without close frame")
            .expect("ws error");

        match frame {
            Message::Close(Some(frame)) => return u16::from(frame.code),
            Message::Close(None) => panic!("close frame without code"),
            _ => continue,
        }
    }
}

/// Assert nothing arrives for a short while.
pub async fn assert_silent(socket: &mut Socket) {
    let result = tokio::time::timeout(Duration::from_millis(200), socket.next()).await;
    assert!(result.is_err(), "expected no frame, got {:?}", result);
}
