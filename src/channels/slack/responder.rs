//! Outbound replies: short text inline, long text as an uploaded file.

use std::sync::Arc;

use tracing::{debug, error};

use super::api::{Attachment, AttachmentField, FileUpload, SlackApi};
use crate::bot::ApprovalNotice;
use crate::error::TransportError;

/// Replies at or above this many characters are uploaded as a file.
pub const INLINE_REPLY_LIMIT: usize = 3000;

/// Name of the file used for long replies.
pub const RESPONSE_FILENAME: &str = "keel response";

/// Footer link shown under approval notices.
const NOTICE_FOOTER_URL: &str = "https://keel.sh";

/// Sends replies and approval notices back into Slack.
pub struct Responder {
    api: Arc<dyn SlackApi>,
    bot_name: String,
    approvals_channel: String,
}

impl Responder {
    pub fn new(
        api: Arc<dyn SlackApi>,
        bot_name: impl Into<String>,
        approvals_channel: impl Into<String>,
    ) -> Self {
        Self {
            api,
            bot_name: bot_name.into(),
            approvals_channel: approvals_channel.into(),
        }
    }

    /// Reply to `channel_id`. Failures are logged and swallowed so the
    /// caller's event loop keeps going.
    pub async fn respond(&self, text: &str, channel_id: &str) {
        if text.chars().count() < INLINE_REPLY_LIMIT {
            if let Err(e) = self.api.send_message(channel_id, &format_as_snippet(text)).await {
                error!(channel_id, error = %e, "Respond: failed to send message");
            }
            return;
        }

        debug!(
            channel_id,
            chars = text.chars().count(),
            "Reply too long for inline message, uploading as file"
        );
        let upload = FileUpload {
            filename: RESPONSE_FILENAME.to_string(),
            content: text.to_string(),
            filetype: "text".to_string(),
            channels: vec![channel_id.to_string()],
        };
        if let Err(e) = self.api.upload_file(upload).await {
            error!(channel_id, error = %e, "Respond: failed to upload response");
        }
    }

    /// Post an approval request to the approvals channel.
    pub async fn post_notice(&self, notice: &ApprovalNotice) -> Result<(), TransportError> {
        let attachment = Attachment {
            fallback: notice.message.clone(),
            color: notice.color.clone(),
            title: notice.title.clone(),
            fields: notice
                .fields
                .iter()
                .map(|f| AttachmentField {
                    title: f.title.clone(),
                    value: f.value.clone(),
                    short: f.short,
                })
                .collect(),
            footer: format!("{NOTICE_FOOTER_URL} {}", env!("CARGO_PKG_VERSION")),
            ts: chrono::Utc::now().timestamp(),
        };

        self.api
            .post_attachments(&self.approvals_channel, &self.bot_name, &[attachment])
            .await
            .inspect_err(|e| {
                error!(
                    approvals_channel = %self.approvals_channel,
                    error = %e,
                    "Failed to post approval notice"
                );
            })
    }
}

/// Wrap text in a verbatim block.
pub fn format_as_snippet(text: &str) -> String {
    format!("```{text}```")
}
