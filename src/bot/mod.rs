//! Bot abstraction: the records a chat integration hands to the approvals
//! and command pipelines, and the trait every integration implements.

pub mod approval;
pub mod registry;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error::{ChannelError, Error, TransportError};

pub use approval::{KeywordVoteParser, VoteParser};
pub use registry::{BotContext, BotFactories, BotFactory};

// ── Records ─────────────────────────────────────────────────────────

/// Decision carried by an approval vote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Approve,
    Reject,
    Unknown,
}

/// A vote cast by a chat user on a pending approval.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalVote {
    /// Chat user that cast the vote.
    pub voter_id: String,
    pub decision: Decision,
    /// Identifier of the approval being voted on.
    pub subject: String,
}

/// A bot-directed message that is not a vote. Consumed by the command
/// pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BotMessage {
    pub text: String,
    pub sender_id: String,
    pub channel_id: String,
    /// Tag of the integration that produced the message ("slack").
    pub source_name: String,
}

/// Approval request posted into the approvals channel.
#[derive(Debug, Clone, Default)]
pub struct ApprovalNotice {
    pub title: String,
    pub message: String,
    /// Attachment colour, e.g. "good", "warning" or a hex value.
    pub color: String,
    pub fields: Vec<NoticeField>,
}

#[derive(Debug, Clone, Default)]
pub struct NoticeField {
    pub title: String,
    pub value: String,
    pub short: bool,
}

// ── Dispatch queues ─────────────────────────────────────────────────

/// Sending halves of the two output queues, shared by every bot.
#[derive(Debug, Clone)]
pub struct DispatchQueues {
    pub approvals: mpsc::Sender<ApprovalVote>,
    pub commands: mpsc::Sender<BotMessage>,
}

/// Receiving halves handed to the approvals and command pipelines.
#[derive(Debug)]
pub struct DispatchReceivers {
    pub approvals: mpsc::Receiver<ApprovalVote>,
    pub commands: mpsc::Receiver<BotMessage>,
}

/// Create both bounded output queues with the same capacity.
pub fn dispatch_queues(capacity: usize) -> (DispatchQueues, DispatchReceivers) {
    let (approvals_tx, approvals_rx) = mpsc::channel(capacity);
    let (commands_tx, commands_rx) = mpsc::channel(capacity);
    (
        DispatchQueues {
            approvals: approvals_tx,
            commands: commands_tx,
        },
        DispatchReceivers {
            approvals: approvals_rx,
            commands: commands_rx,
        },
    )
}

// ── Bot trait ───────────────────────────────────────────────────────

/// A running chat integration.
#[async_trait]
pub trait Bot: Send + Sync {
    /// Integration name (e.g. "slack").
    fn name(&self) -> &str;

    /// Resolve the bot identity and spawn the event-processing task.
    ///
    /// Identity failures are returned here and the bot never starts. The
    /// returned task ends when `cancel` fires or the transport reports
    /// invalid credentials.
    async fn start(
        &self,
        cancel: CancellationToken,
    ) -> Result<JoinHandle<Result<(), ChannelError>>, Error>;

    /// Reply to a channel. Failures are logged, never returned.
    async fn respond(&self, text: &str, channel_id: &str);

    /// Post an approval request into the approvals channel.
    async fn notify(&self, notice: &ApprovalNotice) -> Result<(), TransportError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decision_serializes_snake_case() {
        let vote = ApprovalVote {
            voter_id: "U1".into(),
            decision: Decision::Approve,
            subject: "payment-1".into(),
        };
        let json = serde_json::to_value(&vote).unwrap();
        assert_eq!(json["decision"], "approve");
        assert_eq!(json["voter_id"], "U1");
    }

    #[tokio::test]
    async fn dispatch_queues_are_bounded() {
        let (queues, mut receivers) = dispatch_queues(1);
        let msg = BotMessage {
            text: "status".into(),
            sender_id: "U1".into(),
            channel_id: "C1".into(),
            source_name: "slack".into(),
        };
        queues.commands.try_send(msg.clone()).unwrap();
        assert!(queues.commands.try_send(msg.clone()).is_err());
        assert_eq!(receivers.commands.recv().await, Some(msg));
        assert!(receivers.approvals.try_recv().is_err());
    }
}
