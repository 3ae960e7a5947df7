//! Socket Mode transport. Owns the websocket to Slack and turns frames
//! into `TransportEvent`s for the bot's processing task.
//!
//! The task reconnects on its own; the router never sees connection state
//! beyond the `Connected` and `Error` events.

use std::time::Duration;

use futures::{SinkExt, StreamExt};
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::client::build_http_client;
use super::router::InboundEvent;
use crate::error::TransportError;

/// Delay between reconnect attempts.
const RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// Slack error codes that mean the token will never work.
const AUTH_ERRORS: &[&str] = &["invalid_auth", "not_authed", "account_inactive", "token_revoked"];

/// Events the transport delivers to the bot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    Hello,
    Connected,
    Message(InboundEvent),
    PresenceChange,
    Error(String),
    InvalidAuth,
    /// Any other event type, by name.
    Other(String),
}

/// What a single websocket frame asks of the transport.
#[derive(Debug, Default, PartialEq, Eq)]
pub(crate) struct Frame {
    /// Envelope to acknowledge before doing anything else.
    pub ack: Option<String>,
    pub event: Option<TransportEvent>,
    /// Slack asked us to reconnect.
    pub reconnect: bool,
}

/// Parse a Socket Mode text frame.
pub(crate) fn parse_frame(text: &str) -> Frame {
    let value: Value = match serde_json::from_str(text) {
        Ok(v) => v,
        Err(e) => {
            return Frame {
                event: Some(TransportEvent::Error(format!("invalid frame: {e}"))),
                ..Default::default()
            };
        }
    };

    let frame_type = value["type"].as_str().unwrap_or_default();
    let ack = value["envelope_id"].as_str().map(str::to_string);

    match frame_type {
        "hello" => Frame {
            ack,
            event: Some(TransportEvent::Hello),
            reconnect: false,
        },
        "disconnect" => Frame {
            ack,
            event: None,
            reconnect: true,
        },
        "events_api" => Frame {
            ack,
            event: Some(parse_event(&value["payload"]["event"])),
            reconnect: false,
        },
        other => Frame {
            ack,
            event: Some(TransportEvent::Other(other.to_string())),
            reconnect: false,
        },
    }
}

fn parse_event(event: &Value) -> TransportEvent {
    let str_field = |key: &str| event[key].as_str().unwrap_or_default().to_string();

    match event["type"].as_str().unwrap_or_default() {
        "message" => TransportEvent::Message(InboundEvent {
            text: str_field("text"),
            sender_id: str_field("user"),
            channel_id: str_field("channel"),
            bot_id: str_field("bot_id"),
            subtype: str_field("subtype"),
        }),
        "presence_change" => TransportEvent::PresenceChange,
        other => TransportEvent::Other(other.to_string()),
    }
}

/// Socket Mode connection owner.
pub struct SocketModeTransport {
    http: reqwest::Client,
    app_token: SecretString,
    api_base: String,
    /// Bounds `apps.connections.open` and the websocket handshake.
    connect_timeout: Duration,
}

impl SocketModeTransport {
    pub fn new(
        app_token: SecretString,
        api_base: impl Into<String>,
        connect_timeout: Duration,
    ) -> Result<Self, TransportError> {
        Ok(Self {
            http: build_http_client(connect_timeout)?,
            app_token,
            api_base: api_base.into(),
            connect_timeout,
        })
    }

    /// Spawn the connection loop. It stops when `cancel` fires, when the
    /// event receiver is dropped, or after reporting `InvalidAuth`.
    pub fn spawn(
        self,
        events: mpsc::Sender<TransportEvent>,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            self.run(events, cancel).await;
            info!("Slack Socket Mode transport stopped");
        })
    }

    async fn run(&self, events: mpsc::Sender<TransportEvent>, cancel: CancellationToken) {
        let mut attempt: u32 = 0;

        loop {
            if attempt > 0 {
                info!(attempt, delay = ?RECONNECT_DELAY, "Reconnecting to Slack Socket Mode");
                tokio::select! {
                    _ = cancel.cancelled() => return,
                    _ = tokio::time::sleep(RECONNECT_DELAY) => {}
                }
            }
            attempt += 1;

            let url = match self.open_connection().await {
                Ok(url) => url,
                Err(TransportError::Api { error, .. }) if AUTH_ERRORS.contains(&error.as_str()) => {
                    error!(error = %error, "Slack rejected the app token");
                    let _ = events.send(TransportEvent::InvalidAuth).await;
                    return;
                }
                Err(e) => {
                    warn!(error = %e, "Failed to open Socket Mode connection");
                    if events.send(TransportEvent::Error(e.to_string())).await.is_err() {
                        return;
                    }
                    continue;
                }
            };

            let connect = tokio::time::timeout(
                self.connect_timeout,
                tokio_tungstenite::connect_async(url.as_str()),
            );
            let stream = match connect.await {
                Ok(Ok((stream, _))) => stream,
                Ok(Err(e)) => {
                    warn!(error = %e, "Socket Mode websocket connect failed");
                    if events.send(TransportEvent::Error(e.to_string())).await.is_err() {
                        return;
                    }
                    continue;
                }
                Err(_) => {
                    warn!(timeout = ?self.connect_timeout, "Socket Mode websocket connect timed out");
                    let reason = format!("websocket connect timed out after {:?}", self.connect_timeout);
                    if events.send(TransportEvent::Error(reason)).await.is_err() {
                        return;
                    }
                    continue;
                }
            };

            info!("Connected to Slack Socket Mode");
            attempt = 0;
            if events.send(TransportEvent::Connected).await.is_err() {
                return;
            }

            let (mut write, mut read) = stream.split();

            loop {
                let msg = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => {
                        let _ = write.send(WsMessage::Close(None)).await;
                        return;
                    }
                    msg = read.next() => msg,
                };

                match msg {
                    Some(Ok(WsMessage::Text(text))) => {
                        let frame = parse_frame(text.as_str());
                        if let Some(envelope_id) = frame.ack {
                            let ack = serde_json::json!({ "envelope_id": envelope_id }).to_string();
                            if let Err(e) = write.send(WsMessage::Text(ack.into())).await {
                                warn!(error = %e, "Failed to acknowledge envelope");
                            }
                        }
                        if let Some(event) = frame.event
                            && events.send(event).await.is_err()
                        {
                            debug!("Event receiver dropped, stopping transport");
                            return;
                        }
                        if frame.reconnect {
                            info!("Slack requested a reconnect");
                            break;
                        }
                    }
                    Some(Ok(WsMessage::Ping(data))) => {
                        let _ = write.send(WsMessage::Pong(data)).await;
                    }
                    Some(Ok(WsMessage::Close(_))) | None => {
                        info!("Slack websocket closed");
                        break;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        warn!(error = %e, "Slack websocket error");
                        if events.send(TransportEvent::Error(e.to_string())).await.is_err() {
                            return;
                        }
                        break;
                    }
                }
            }
        }
    }

    /// `apps.connections.open`: get a fresh websocket URL.
    async fn open_connection(&self) -> Result<String, TransportError> {
        let method = "apps.connections.open";
        let resp = self
            .http
            .post(format!("{}/{method}", self.api_base))
            .bearer_auth(self.app_token.expose_secret())
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    TransportError::Timeout {
                        method: method.into(),
                        timeout: self.connect_timeout,
                    }
                } else {
                    TransportError::Http {
                        method: method.into(),
                        reason: e.to_string(),
                    }
                }
            })?;

        let body: Value = resp.json().await.map_err(|e| TransportError::InvalidResponse {
            method: method.into(),
            reason: e.to_string(),
        })?;

        if body["ok"].as_bool() != Some(true) {
            return Err(TransportError::Api {
                method: method.into(),
                error: body["error"].as_str().unwrap_or("unknown").to_string(),
            });
        }

        body["url"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| TransportError::InvalidResponse {
                method: method.into(),
                reason: "no url in response".into(),
            })
    }
}
