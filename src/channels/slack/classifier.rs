//! Channel classification: is this the approvals channel?

use std::sync::Arc;

use tracing::{debug, warn};

use super::api::SlackApi;

/// Decides whether a channel id names the configured approvals channel.
///
/// Lookups go to the public-channel namespace first, then to private and
/// direct conversations with the cache bypassed. A channel that neither
/// lookup can resolve is never the approvals channel.
pub struct ChannelClassifier {
    api: Arc<dyn SlackApi>,
    approvals_channel: String,
}

impl ChannelClassifier {
    pub fn new(api: Arc<dyn SlackApi>, approvals_channel: impl Into<String>) -> Self {
        Self {
            api,
            approvals_channel: approvals_channel.into(),
        }
    }

    pub fn approvals_channel(&self) -> &str {
        &self.approvals_channel
    }

    pub async fn is_approvals_channel(&self, channel_id: &str) -> bool {
        match self.api.channel_info(channel_id).await {
            Ok(channel) => {
                debug!(
                    channel = %channel.name,
                    approvals_channel = %self.approvals_channel,
                    "Checking if approvals channel"
                );
                if channel.name == self.approvals_channel {
                    return true;
                }
                debug!(
                    channel = %channel.name,
                    "Message was not received on the approvals channel"
                );
                false
            }
            Err(public_err) => {
                debug!(
                    channel_id,
                    error = %public_err,
                    "Not a public channel, looking amongst private conversations"
                );
                match self.api.conversation_info(channel_id, true).await {
                    Ok(conversation) => conversation.name == self.approvals_channel,
                    Err(e) => {
                        warn!(
                            channel_id,
                            error = %e,
                            "Channel could not be retrieved, treating as non-approvals"
                        );
                        false
                    }
                }
            }
        }
    }
}
