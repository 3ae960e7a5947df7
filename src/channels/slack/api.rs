//! Slack Web API surface used by the bot, and the records it returns.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::TransportError;

/// A workspace member as returned by `users.list`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SlackUser {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub is_bot: bool,
}

/// A conversation (public channel, private channel, DM) as returned by
/// `conversations.info`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ConversationInfo {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub is_private: bool,
    #[serde(default)]
    pub is_im: bool,
    #[serde(default)]
    pub is_mpim: bool,
}

impl ConversationInfo {
    /// True for channels every workspace member can see.
    pub fn is_public(&self) -> bool {
        !self.is_private && !self.is_im && !self.is_mpim
    }
}

/// Content uploaded with `files.upload`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileUpload {
    pub filename: String,
    pub content: String,
    pub filetype: String,
    pub channels: Vec<String>,
}

/// Legacy message attachment.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Attachment {
    pub fallback: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub color: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub title: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<AttachmentField>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub footer: String,
    pub ts: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AttachmentField {
    pub title: String,
    pub value: String,
    pub short: bool,
}

/// Operations the bot performs against Slack.
#[async_trait]
pub trait SlackApi: Send + Sync {
    /// Snapshot of every workspace member, in the order Slack returns them.
    async fn list_users(&self) -> Result<Vec<SlackUser>, TransportError>;

    /// Look up a public channel. Fails for private channels and direct
    /// conversations.
    async fn channel_info(&self, channel_id: &str) -> Result<ConversationInfo, TransportError>;

    /// Look up any conversation the bot is a member of, optionally
    /// skipping cached results.
    async fn conversation_info(
        &self,
        channel_id: &str,
        bypass_cache: bool,
    ) -> Result<ConversationInfo, TransportError>;

    /// Post a plain text message.
    async fn send_message(&self, channel_id: &str, text: &str) -> Result<(), TransportError>;

    /// Post a message made of attachments, shown under `username`.
    async fn post_attachments(
        &self,
        channel_id: &str,
        username: &str,
        attachments: &[Attachment],
    ) -> Result<(), TransportError>;

    /// Upload text content as a file.
    async fn upload_file(&self, upload: FileUpload) -> Result<(), TransportError>;
}
