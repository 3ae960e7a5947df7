//! Slack Web API client over HTTPS.
//!
//! Every request is bounded by the client's request timeout. Conversation
//! lookups are cached for `CONVERSATION_CACHE_TTL`; `conversation_info(..,
//! true)` always goes to Slack and refreshes the cache.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::multipart::Form;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::debug;

use super::api::{Attachment, ConversationInfo, FileUpload, SlackApi, SlackUser};
use crate::error::TransportError;

/// Page size requested from `users.list`.
const USERS_PAGE_LIMIT: u32 = 200;

/// How long a conversation lookup is trusted before it is fetched again.
pub const CONVERSATION_CACHE_TTL: Duration = Duration::from_secs(300);

#[derive(Debug, Clone)]
struct CachedConversation {
    info: ConversationInfo,
    fetched_at: Instant,
}

#[derive(Debug, Deserialize)]
struct UsersPage {
    #[serde(default)]
    members: Vec<SlackUser>,
    #[serde(default)]
    response_metadata: Option<ResponseMetadata>,
}

#[derive(Debug, Deserialize)]
struct ResponseMetadata {
    #[serde(default)]
    next_cursor: String,
}

/// HTTPS implementation of [`SlackApi`].
pub struct SlackWebClient {
    http: reqwest::Client,
    token: SecretString,
    api_base: String,
    request_timeout: Duration,
    cache_ttl: Duration,
    conversations: RwLock<HashMap<String, CachedConversation>>,
}

impl SlackWebClient {
    pub fn new(
        token: SecretString,
        api_base: impl Into<String>,
        request_timeout: Duration,
    ) -> Result<Self, TransportError> {
        Ok(Self {
            http: build_http_client(request_timeout)?,
            token,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            request_timeout,
            cache_ttl: CONVERSATION_CACHE_TTL,
            conversations: RwLock::new(HashMap::new()),
        })
    }

    /// Override how long conversation lookups stay cached.
    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    fn api_url(&self, method: &str) -> String {
        format!("{}/{method}", self.api_base)
    }

    async fn get(&self, method: &str, query: &[(&str, &str)]) -> Result<Value, TransportError> {
        let resp = self
            .http
            .get(self.api_url(method))
            .bearer_auth(self.token.expose_secret())
            .query(query)
            .send()
            .await
            .map_err(|e| self.http_error(method, e))?;
        read_body(method, resp).await
    }

    async fn post_json(&self, method: &str, body: &Value) -> Result<Value, TransportError> {
        let resp = self
            .http
            .post(self.api_url(method))
            .bearer_auth(self.token.expose_secret())
            .json(body)
            .send()
            .await
            .map_err(|e| self.http_error(method, e))?;
        read_body(method, resp).await
    }

    async fn fetch_conversation(&self, channel_id: &str) -> Result<ConversationInfo, TransportError> {
        let method = "conversations.info";
        let body = self.get(method, &[("channel", channel_id)]).await?;
        let info: ConversationInfo = serde_json::from_value(body["channel"].clone())
            .map_err(|e| TransportError::InvalidResponse {
                method: method.into(),
                reason: e.to_string(),
            })?;

        let now = Instant::now();
        let mut cache = self.conversations.write().await;
        cache.retain(|_, entry| now.duration_since(entry.fetched_at) < self.cache_ttl);
        cache.insert(
            channel_id.to_string(),
            CachedConversation {
                info: info.clone(),
                fetched_at: now,
            },
        );
        Ok(info)
    }

    /// Cached lookup, ignoring entries older than the cache TTL.
    async fn cached(&self, channel_id: &str) -> Option<ConversationInfo> {
        self.conversations
            .read()
            .await
            .get(channel_id)
            .filter(|entry| entry.fetched_at.elapsed() < self.cache_ttl)
            .map(|entry| entry.info.clone())
    }

    fn http_error(&self, method: &str, e: reqwest::Error) -> TransportError {
        if e.is_timeout() {
            return TransportError::Timeout {
                method: method.to_string(),
                timeout: self.request_timeout,
            };
        }
        TransportError::Http {
            method: method.to_string(),
            reason: e.to_string(),
        }
    }
}

#[async_trait]
impl SlackApi for SlackWebClient {
    async fn list_users(&self) -> Result<Vec<SlackUser>, TransportError> {
        let method = "users.list";
        let limit = USERS_PAGE_LIMIT.to_string();
        let mut users = Vec::new();
        let mut cursor = String::new();

        loop {
            let mut query = vec![("limit", limit.as_str())];
            if !cursor.is_empty() {
                query.push(("cursor", cursor.as_str()));
            }
            let body = self.get(method, &query).await?;
            let page: UsersPage =
                serde_json::from_value(body).map_err(|e| TransportError::InvalidResponse {
                    method: method.into(),
                    reason: e.to_string(),
                })?;
            users.extend(page.members);

            match page.response_metadata {
                Some(meta) if !meta.next_cursor.is_empty() => cursor = meta.next_cursor,
                _ => break,
            }
        }

        debug!(count = users.len(), "Listed workspace users");
        Ok(users)
    }

    async fn channel_info(&self, channel_id: &str) -> Result<ConversationInfo, TransportError> {
        let info = match self.cached(channel_id).await {
            Some(info) => info,
            None => self.fetch_conversation(channel_id).await?,
        };
        if !info.is_public() {
            return Err(TransportError::NotPublic {
                id: channel_id.to_string(),
            });
        }
        Ok(info)
    }

    async fn conversation_info(
        &self,
        channel_id: &str,
        bypass_cache: bool,
    ) -> Result<ConversationInfo, TransportError> {
        if !bypass_cache && let Some(info) = self.cached(channel_id).await {
            return Ok(info);
        }
        self.fetch_conversation(channel_id).await
    }

    async fn send_message(&self, channel_id: &str, text: &str) -> Result<(), TransportError> {
        let body = serde_json::json!({ "channel": channel_id, "text": text });
        self.post_json("chat.postMessage", &body).await?;
        Ok(())
    }

    async fn post_attachments(
        &self,
        channel_id: &str,
        username: &str,
        attachments: &[Attachment],
    ) -> Result<(), TransportError> {
        let body = serde_json::json!({
            "channel": channel_id,
            "username": username,
            "attachments": attachments,
        });
        self.post_json("chat.postMessage", &body).await?;
        Ok(())
    }

    async fn upload_file(&self, upload: FileUpload) -> Result<(), TransportError> {
        let method = "files.upload";
        let form = Form::new()
            .text("filename", upload.filename)
            .text("content", upload.content)
            .text("filetype", upload.filetype)
            .text("channels", upload.channels.join(","));

        let resp = self
            .http
            .post(self.api_url(method))
            .bearer_auth(self.token.expose_secret())
            .multipart(form)
            .send()
            .await
            .map_err(|e| self.http_error(method, e))?;
        read_body(method, resp).await?;
        Ok(())
    }
}

/// HTTP client whose every request, body included, is bounded by `timeout`.
pub(crate) fn build_http_client(timeout: Duration) -> Result<reqwest::Client, TransportError> {
    reqwest::Client::builder()
        .timeout(timeout.max(Duration::from_millis(1)))
        .build()
        .map_err(|e| TransportError::ClientBuild(e.to_string()))
}

/// Decode a Web API response and turn `"ok": false` into an error.
async fn read_body(method: &str, resp: reqwest::Response) -> Result<Value, TransportError> {
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(TransportError::Http {
            method: method.to_string(),
            reason: format!("{status} {body}"),
        });
    }

    let body: Value = resp.json().await.map_err(|e| TransportError::InvalidResponse {
        method: method.to_string(),
        reason: e.to_string(),
    })?;

    if body["ok"].as_bool() != Some(true) {
        return Err(TransportError::Api {
            method: method.to_string(),
            error: body["error"].as_str().unwrap_or("unknown").to_string(),
        });
    }
    Ok(body)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_url_joins_method() {
        let client = SlackWebClient::new(
            SecretString::from("xoxb"),
            "https://slack.com/api/",
            Duration::from_secs(1),
        )
        .unwrap();
        assert_eq!(
            client.api_url("users.list"),
            "https://slack.com/api/users.list"
        );
    }

    #[tokio::test]
    async fn unreachable_server_is_http_error() {
        let client = SlackWebClient::new(
            SecretString::from("xoxb"),
            "http://127.0.0.1:1",
            Duration::from_secs(1),
        )
        .unwrap();
        let err = client.list_users().await.unwrap_err();
        assert!(matches!(err, TransportError::Http { ref method, .. } if method == "users.list"));
    }
}
