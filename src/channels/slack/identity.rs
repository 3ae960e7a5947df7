//! Bot identity: which workspace user is us, and how messages mention us.

use tracing::info;

use super::api::SlackUser;
use crate::error::IdentityError;

/// The bot's own user record. Built once at startup, immutable afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BotIdentity {
    pub id: String,
    pub name: String,
    /// Lower-cased `<@id>`, the text Slack injects for an @-mention.
    pub mention_prefix: String,
}

impl BotIdentity {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        let id = id.into();
        let mention_prefix = format!("<@{id}>").to_lowercase();
        Self {
            id,
            name: name.into(),
            mention_prefix,
        }
    }

    /// Find the bot account called `configured_name`.
    ///
    /// The name match is case-sensitive and only bot accounts qualify. When
    /// several bot accounts share the name, the first in `users` wins.
    pub fn resolve(configured_name: &str, users: &[SlackUser]) -> Result<Self, IdentityError> {
        let user = users
            .iter()
            .find(|u| u.is_bot && u.name == configured_name)
            .ok_or_else(|| IdentityError::NotFound {
                name: configured_name.to_string(),
            })?;

        let identity = Self::new(&user.id, configured_name);
        info!(
            bot_id = %identity.id,
            bot_name = %identity.name,
            "Resolved bot identity"
        );
        Ok(identity)
    }
}
