//! Mock Slack Web API for integration tests.
//!
//! Serves `users.list`, `conversations.info`, `chat.postMessage` and
//! `files.upload` from in-memory state and records every call.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{Value, json};
use tokio::net::TcpListener;

/// Maximum time any test is allowed to run before we consider it hung.
pub const TEST_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Default)]
pub struct MockSlack {
    /// Pages of `users.list` members; page N is served for cursor "pN".
    pub user_pages: Mutex<Vec<Vec<Value>>>,
    /// channel id -> `conversations.info` channel object.
    pub conversations: Mutex<HashMap<String, Value>>,
    pub info_calls: Mutex<Vec<String>>,
    pub posted: Mutex<Vec<Value>>,
    pub uploads: Mutex<Vec<String>>,
    pub fail_posts: Mutex<bool>,
    /// `conversations.info` accepts the request and never answers.
    pub hang_info: AtomicBool,
}

impl MockSlack {
    pub fn add_user(&self, id: &str, name: &str, is_bot: bool) {
        let mut pages = self.user_pages.lock().unwrap();
        if pages.is_empty() {
            pages.push(Vec::new());
        }
        pages
            .last_mut()
            .unwrap()
            .push(json!({ "id": id, "name": name, "is_bot": is_bot }));
    }

    pub fn new_user_page(&self) {
        self.user_pages.lock().unwrap().push(Vec::new());
    }

    pub fn add_public(&self, id: &str, name: &str) {
        self.conversations.lock().unwrap().insert(
            id.to_string(),
            json!({ "id": id, "name": name, "is_channel": true, "is_private": false }),
        );
    }

    pub fn add_private(&self, id: &str, name: &str) {
        self.conversations.lock().unwrap().insert(
            id.to_string(),
            json!({ "id": id, "name": name, "is_group": true, "is_private": true }),
        );
    }

    pub fn add_im(&self, id: &str) {
        self.conversations
            .lock()
            .unwrap()
            .insert(id.to_string(), json!({ "id": id, "is_im": true }));
    }

    pub fn hang_conversation_lookups(&self) {
        self.hang_info.store(true, Ordering::SeqCst);
    }

    pub fn info_calls(&self) -> Vec<String> {
        self.info_calls.lock().unwrap().clone()
    }

    pub fn posted(&self) -> Vec<Value> {
        self.posted.lock().unwrap().clone()
    }

    pub fn uploads(&self) -> Vec<String> {
        self.uploads.lock().unwrap().clone()
    }
}

async fn users_list(
    State(mock): State<Arc<MockSlack>>,
    Query(query): Query<HashMap<String, String>>,
) -> Json<Value> {
    let pages = mock.user_pages.lock().unwrap();
    let index = query
        .get("cursor")
        .and_then(|c| c.strip_prefix('p'))
        .and_then(|n| n.parse::<usize>().ok())
        .unwrap_or(0);
    let members = pages.get(index).cloned().unwrap_or_default();
    let next_cursor = if index + 1 < pages.len() {
        format!("p{}", index + 1)
    } else {
        String::new()
    };
    Json(json!({
        "ok": true,
        "members": members,
        "response_metadata": { "next_cursor": next_cursor },
    }))
}

async fn conversations_info(
    State(mock): State<Arc<MockSlack>>,
    Query(query): Query<HashMap<String, String>>,
) -> Json<Value> {
    let id = query.get("channel").cloned().unwrap_or_default();
    mock.info_calls.lock().unwrap().push(id.clone());
    if mock.hang_info.load(Ordering::SeqCst) {
        std::future::pending::<()>().await;
    }
    match mock.conversations.lock().unwrap().get(&id) {
        Some(channel) => Json(json!({ "ok": true, "channel": channel })),
        None => Json(json!({ "ok": false, "error": "channel_not_found" })),
    }
}

async fn chat_post_message(
    State(mock): State<Arc<MockSlack>>,
    Json(body): Json<Value>,
) -> Json<Value> {
    if *mock.fail_posts.lock().unwrap() {
        return Json(json!({ "ok": false, "error": "not_in_channel" }));
    }
    mock.posted.lock().unwrap().push(body);
    Json(json!({ "ok": true, "ts": "1700000000.000100" }))
}

async fn files_upload(State(mock): State<Arc<MockSlack>>, body: Bytes) -> Json<Value> {
    mock.uploads
        .lock()
        .unwrap()
        .push(String::from_utf8_lossy(&body).into_owned());
    Json(json!({ "ok": true }))
}

/// Start the mock on a random port, return (api base URL, state).
pub async fn start_mock_slack() -> (String, Arc<MockSlack>) {
    let mock = Arc::new(MockSlack::default());
    let app = Router::new()
        .route("/users.list", get(users_list))
        .route("/conversations.info", get(conversations_info))
        .route("/chat.postMessage", post(chat_post_message))
        .route("/files.upload", post(files_upload))
        .with_state(Arc::clone(&mock));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    // Give the server a moment to start accepting connections.
    tokio::time::sleep(Duration::from_millis(50)).await;

    (format!("http://127.0.0.1:{port}"), mock)
}
