//! Event router: classifies inbound Slack messages and dispatches them.
//!
//! Every message ends in exactly one of:
//! 1. dropped as noise (bots, our own messages, senderless events)
//! 2. dropped as not addressed to the bot
//! 3. an `ApprovalVote` on the approvals queue (vote in the approvals channel)
//! 4. a redirect notice in the originating channel (vote anywhere else)
//! 5. a `BotMessage` on the commands queue (everything else)
//!
//! The router holds no state between events apart from the bot identity
//! and the approvals channel name. Every await in `handle` is raced against
//! the shutdown token; an event abandoned at shutdown is dropped before
//! anything has been queued.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::SendTimeoutError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::SOURCE_NAME;
use super::classifier::ChannelClassifier;
use super::identity::BotIdentity;
use super::responder::Responder;
use crate::bot::{BotMessage, DispatchQueues, VoteParser};

/// Subtype Slack sets on messages posted by integrations.
const BOT_MESSAGE_SUBTYPE: &str = "bot_message";

/// Direct-message conversation ids start with this character.
const DIRECT_MESSAGE_PREFIX: char = 'D';

/// A message event as delivered by the transport.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InboundEvent {
    pub text: String,
    pub sender_id: String,
    pub channel_id: String,
    /// Set when a bot authored the message; empty for humans.
    pub bot_id: String,
    pub subtype: String,
}

impl InboundEvent {
    pub fn new(
        text: impl Into<String>,
        sender_id: impl Into<String>,
        channel_id: impl Into<String>,
    ) -> Self {
        Self {
            text: text.into(),
            sender_id: sender_id.into(),
            channel_id: channel_id.into(),
            ..Default::default()
        }
    }

    pub fn is_direct_message(&self) -> bool {
        self.channel_id.starts_with(DIRECT_MESSAGE_PREFIX)
    }
}

/// Terminal state of a handled event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Authored by a bot, by nobody, or by an integration.
    Ignored,
    /// Not a mention, not prefixed with the bot name, not a DM.
    NotAddressed,
    /// Vote queued for the approvals pipeline.
    Vote,
    /// Vote received outside the approvals channel; user was redirected.
    Redirected,
    /// Command queued for the command pipeline.
    Command,
    /// Output queue full past the enqueue timeout or closed, or the event
    /// was abandoned at shutdown.
    Dropped,
}

/// Routes messages to the approvals and command queues.
pub struct EventRouter {
    identity: BotIdentity,
    /// Lower-cased bot name, matched against normalized text.
    name_prefix: String,
    classifier: ChannelClassifier,
    responder: Arc<Responder>,
    vote_parser: Arc<dyn VoteParser>,
    queues: DispatchQueues,
    enqueue_timeout: Duration,
    cancel: CancellationToken,
}

impl EventRouter {
    pub fn new(
        identity: BotIdentity,
        classifier: ChannelClassifier,
        responder: Arc<Responder>,
        vote_parser: Arc<dyn VoteParser>,
        queues: DispatchQueues,
        enqueue_timeout: Duration,
        cancel: CancellationToken,
    ) -> Self {
        let name_prefix = identity.name.to_lowercase();
        Self {
            identity,
            name_prefix,
            classifier,
            responder,
            vote_parser,
            queues,
            enqueue_timeout,
            cancel,
        }
    }

    /// Classify and dispatch one event. Never fails: transport errors are
    /// logged where they happen.
    pub async fn handle(&self, event: InboundEvent) -> Disposition {
        if is_noise(&event) {
            debug!(
                event_bot_id = %event.bot_id,
                event_user = %event.sender_id,
                event_subtype = %event.subtype,
                "handle: ignoring message"
            );
            return Disposition::Ignored;
        }

        let text = normalize(&event.text);

        if !self.is_addressed(&event, &text) {
            return Disposition::NotAddressed;
        }

        let text = strip_addressing(&text, &self.identity.mention_prefix, &self.name_prefix);

        if let Some(vote) = self.vote_parser.parse(&event.sender_id, &text) {
            let lookup = self.classifier.is_approvals_channel(&event.channel_id);
            let Some(in_approvals_channel) = self.unless_cancelled(lookup).await else {
                warn!(
                    channel_id = %event.channel_id,
                    "Shutting down during channel lookup, dropping vote"
                );
                return Disposition::Dropped;
            };

            if in_approvals_channel {
                info!(
                    voter = %vote.voter_id,
                    decision = ?vote.decision,
                    subject = %vote.subject,
                    "Approval vote received"
                );
                return if self.enqueue(&self.queues.approvals, vote, "approvals").await {
                    Disposition::Vote
                } else {
                    Disposition::Dropped
                };
            }

            warn!(
                received_on = %event.channel_id,
                approvals_channel = %self.classifier.approvals_channel(),
                "Vote was received outside the approvals channel"
            );
            let notice = format!(
                "please use approvals channel '{}'",
                self.classifier.approvals_channel()
            );
            let reply = self.responder.respond(&notice, &event.channel_id);
            if self.unless_cancelled(reply).await.is_none() {
                warn!(
                    channel_id = %event.channel_id,
                    "Shutting down before the redirect notice was sent"
                );
                return Disposition::Dropped;
            }
            return Disposition::Redirected;
        }

        let message = BotMessage {
            text,
            sender_id: event.sender_id,
            channel_id: event.channel_id,
            source_name: SOURCE_NAME.to_string(),
        };
        if self.enqueue(&self.queues.commands, message, "commands").await {
            Disposition::Command
        } else {
            Disposition::Dropped
        }
    }

    fn is_addressed(&self, event: &InboundEvent, text: &str) -> bool {
        text.starts_with(&self.identity.mention_prefix)
            || (!self.name_prefix.is_empty() && text.starts_with(&self.name_prefix))
            || event.is_direct_message()
    }

    /// Run `fut` unless shutdown is requested first.
    async fn unless_cancelled<F: Future>(&self, fut: F) -> Option<F::Output> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => None,
            out = fut => Some(out),
        }
    }

    /// Hand `item` to a queue, waiting at most `enqueue_timeout` for room
    /// and never past shutdown.
    async fn enqueue<T>(&self, tx: &mpsc::Sender<T>, item: T, queue: &'static str) -> bool {
        let send = tx.send_timeout(item, self.enqueue_timeout);
        let Some(sent) = self.unless_cancelled(send).await else {
            warn!(queue, "Shutting down while waiting for queue space, dropping message");
            return false;
        };
        match sent {
            Ok(()) => true,
            Err(SendTimeoutError::Timeout(_)) => {
                warn!(
                    queue,
                    timeout = ?self.enqueue_timeout,
                    "Output queue full, dropping message"
                );
                false
            }
            Err(SendTimeoutError::Closed(_)) => {
                error!(queue, "Output queue closed, dropping message");
                false
            }
        }
    }
}

/// Messages from bots (including ourselves) and senderless events.
fn is_noise(event: &InboundEvent) -> bool {
    !event.bot_id.is_empty() || event.sender_id.is_empty() || event.subtype == BOT_MESSAGE_SUBTYPE
}

/// Lower-case and trim surrounding whitespace.
pub fn normalize(text: &str) -> String {
    text.to_lowercase().trim().to_string()
}

/// Remove one leading mention, or failing that one leading bot name, then
/// trim separators. Expects normalized text.
pub fn strip_addressing(text: &str, mention_prefix: &str, name: &str) -> String {
    let rest = text
        .strip_prefix(mention_prefix)
        .or_else(|| (!name.is_empty()).then(|| text.strip_prefix(name)).flatten())
        .unwrap_or(text);
    rest.trim_matches(|c: char| c == ':' || c.is_whitespace())
        .to_string()
}
