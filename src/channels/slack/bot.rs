//! Slack bot. Wires identity, classifier, responder and router together
//! and runs the event-processing task.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use super::SOURCE_NAME;
use super::api::SlackApi;
use super::classifier::ChannelClassifier;
use super::client::SlackWebClient;
use super::identity::BotIdentity;
use super::responder::Responder;
use super::router::EventRouter;
use super::socket::{SocketModeTransport, TransportEvent};
use crate::bot::{ApprovalNotice, Bot, BotContext, DispatchQueues, VoteParser};
use crate::config::SlackConfig;
use crate::error::{ChannelError, Error, IdentityError, TransportError};

/// Buffer between the transport task and the processing task.
const TRANSPORT_BUFFER: usize = 256;

/// Slack approvals bot.
pub struct SlackBot {
    config: SlackConfig,
    api: Arc<dyn SlackApi>,
    responder: Arc<Responder>,
    queues: DispatchQueues,
    vote_parser: Arc<dyn VoteParser>,
}

impl SlackBot {
    pub fn new(config: SlackConfig, api: Arc<dyn SlackApi>, ctx: &BotContext) -> Self {
        let responder = Arc::new(Responder::new(
            Arc::clone(&api),
            config.bot_name.clone(),
            config.approvals_channel.clone(),
        ));
        Self {
            config,
            api,
            responder,
            queues: ctx.queues.clone(),
            vote_parser: Arc::clone(&ctx.vote_parser),
        }
    }

    /// Factory for the bot table: builds the bot from `SLACK_*` variables,
    /// or returns `None` when Slack is not configured. Invalid values are
    /// reported by `start`.
    pub fn factory(ctx: &BotContext) -> Option<Box<dyn Bot>> {
        let config = SlackConfig::from_env()?;
        let api = match SlackWebClient::new(
            config.bot_token.clone(),
            config.api_base.clone(),
            config.request_timeout,
        ) {
            Ok(api) => Arc::new(api),
            Err(e) => {
                error!(error = %e, "Failed to create Slack Web API client");
                return None;
            }
        };
        Some(Box::new(Self::new(config, api, ctx)))
    }

    /// Find our own user record in the workspace.
    pub async fn resolve_identity(&self) -> Result<BotIdentity, IdentityError> {
        let users = self.api.list_users().await?;
        BotIdentity::resolve(&self.config.bot_name, &users)
    }

    /// Resolve the identity and start processing events from `events`.
    ///
    /// `start` calls this with the Socket Mode transport's receiver; tests
    /// feed events directly.
    pub async fn start_with_events(
        &self,
        events: mpsc::Receiver<TransportEvent>,
        cancel: CancellationToken,
    ) -> Result<JoinHandle<Result<(), ChannelError>>, Error> {
        self.config.validate()?;
        let identity = self.resolve_identity().await?;

        let router = EventRouter::new(
            identity,
            ChannelClassifier::new(Arc::clone(&self.api), self.config.approvals_channel.clone()),
            Arc::clone(&self.responder),
            Arc::clone(&self.vote_parser),
            self.queues.clone(),
            self.config.enqueue_timeout,
            cancel.clone(),
        );

        info!(
            bot_name = %self.config.bot_name,
            approvals_channel = %self.config.approvals_channel,
            "Slack bot started"
        );
        Ok(tokio::spawn(run_events(router, events, cancel)))
    }
}

#[async_trait]
impl Bot for SlackBot {
    fn name(&self) -> &str {
        SOURCE_NAME
    }

    async fn start(
        &self,
        cancel: CancellationToken,
    ) -> Result<JoinHandle<Result<(), ChannelError>>, Error> {
        let app_token = self
            .config
            .app_token
            .clone()
            .ok_or_else(|| ChannelError::StartupFailed {
                name: SOURCE_NAME.into(),
                reason: "SLACK_APP_TOKEN is required for Socket Mode".into(),
            })?;

        let transport = SocketModeTransport::new(
            app_token,
            self.config.api_base.clone(),
            self.config.request_timeout,
        )?;

        // Resolve identity before connecting so a misconfigured bot never
        // opens a socket.
        let (events_tx, events_rx) = mpsc::channel(TRANSPORT_BUFFER);
        let handle = self.start_with_events(events_rx, cancel.clone()).await?;
        transport.spawn(events_tx, cancel);

        Ok(handle)
    }

    async fn respond(&self, text: &str, channel_id: &str) {
        self.responder.respond(text, channel_id).await;
    }

    async fn notify(&self, notice: &ApprovalNotice) -> Result<(), TransportError> {
        self.responder.post_notice(notice).await
    }
}

/// Consume transport events in order until cancelled.
///
/// Cancellation is checked before each event; an event already taken is
/// always handled to the end.
pub async fn run_events(
    router: EventRouter,
    mut events: mpsc::Receiver<TransportEvent>,
    cancel: CancellationToken,
) -> Result<(), ChannelError> {
    loop {
        let event = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                info!("Slack event loop cancelled");
                return Ok(());
            }
            event = events.recv() => event,
        };

        let Some(event) = event else {
            return Err(ChannelError::Disconnected {
                name: SOURCE_NAME.into(),
                reason: "transport event stream ended".into(),
            });
        };

        match event {
            TransportEvent::Message(message) => {
                let disposition = router.handle(message).await;
                debug!(?disposition, "Message handled");
            }
            TransportEvent::Error(e) => {
                error!(error = %e, "Slack transport error");
            }
            TransportEvent::InvalidAuth => {
                error!("Invalid credentials");
                return Err(ChannelError::AuthFailed {
                    name: SOURCE_NAME.into(),
                    reason: "invalid credentials".into(),
                });
            }
            TransportEvent::Hello
            | TransportEvent::Connected
            | TransportEvent::PresenceChange
            | TransportEvent::Other(_) => {}
        }
    }
}
