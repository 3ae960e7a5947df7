//! Configuration types.

use std::time::Duration;

use secrecy::SecretString;

use crate::error::ConfigError;

/// Default bot display name.
pub const DEFAULT_BOT_NAME: &str = "keel";

/// Default approvals channel name.
pub const DEFAULT_APPROVALS_CHANNEL: &str = "general";

/// Default Slack Web API base URL.
pub const DEFAULT_SLACK_API_BASE: &str = "https://slack.com/api";

/// Default capacity of each output queue.
pub const DEFAULT_QUEUE_CAPACITY: usize = 100;

/// Default time the processing task waits on a full output queue.
pub const DEFAULT_ENQUEUE_TIMEOUT: Duration = Duration::from_secs(5);

/// Default upper bound on a single Slack HTTP request.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Slack bot configuration.
#[derive(Debug, Clone)]
pub struct SlackConfig {
    /// Bot user token (`xoxb-...`) used for the Web API.
    pub bot_token: SecretString,
    /// App-level token (`xapp-...`) used to open Socket Mode connections.
    pub app_token: Option<SecretString>,
    /// Display name of the bot user in the workspace.
    pub bot_name: String,
    /// Name of the channel where approval votes are accepted.
    pub approvals_channel: String,
    /// Web API base URL.
    pub api_base: String,
    /// Maximum time to wait for room on a full queue before dropping.
    pub enqueue_timeout: Duration,
    /// Maximum time for any single Web API request.
    pub request_timeout: Duration,
}

impl SlackConfig {
    /// Build a config with defaults for everything but the token.
    pub fn new(bot_token: impl Into<String>) -> Self {
        Self {
            bot_token: SecretString::from(bot_token.into()),
            app_token: None,
            bot_name: DEFAULT_BOT_NAME.to_string(),
            approvals_channel: DEFAULT_APPROVALS_CHANNEL.to_string(),
            api_base: DEFAULT_SLACK_API_BASE.to_string(),
            enqueue_timeout: DEFAULT_ENQUEUE_TIMEOUT,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    /// Load from environment variables. Returns `None` when `SLACK_TOKEN`
    /// is not set.
    pub fn from_env() -> Option<Self> {
        let token = std::env::var("SLACK_TOKEN").ok().filter(|t| !t.is_empty());
        let Some(token) = token else {
            tracing::info!("Slack approval bot is not configured");
            return None;
        };

        let mut config = Self::new(token);

        if let Ok(app_token) = std::env::var("SLACK_APP_TOKEN")
            && !app_token.is_empty()
        {
            config.app_token = Some(SecretString::from(app_token));
        }

        if let Ok(name) = std::env::var("SLACK_BOT_NAME")
            && !name.is_empty()
        {
            config.bot_name = name;
        }

        if let Ok(channel) = std::env::var("SLACK_APPROVALS_CHANNEL")
            && !channel.is_empty()
        {
            config.approvals_channel = normalize_channel_name(&channel);
        }

        if let Ok(base) = std::env::var("SLACK_API_BASE")
            && !base.is_empty()
        {
            config.api_base = base.trim_end_matches('/').to_string();
        }

        config.enqueue_timeout =
            secs_from_env("SLACK_ENQUEUE_TIMEOUT_SECS").unwrap_or(DEFAULT_ENQUEUE_TIMEOUT);

        config.request_timeout = secs_from_env("SLACK_REQUEST_TIMEOUT_SECS")
            .filter(|t| !t.is_zero())
            .unwrap_or(DEFAULT_REQUEST_TIMEOUT);

        Some(config)
    }

    pub fn with_bot_name(mut self, name: impl Into<String>) -> Self {
        self.bot_name = name.into();
        self
    }

    pub fn with_approvals_channel(mut self, channel: &str) -> Self {
        self.approvals_channel = normalize_channel_name(channel);
        self
    }

    pub fn with_api_base(mut self, base: impl Into<String>) -> Self {
        self.api_base = base.into();
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Check values that would make the bot misbehave at runtime.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.bot_name.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "SLACK_BOT_NAME".into(),
                message: "bot name must not be empty".into(),
            });
        }
        if self.approvals_channel.is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "SLACK_APPROVALS_CHANNEL".into(),
                message: "approvals channel must not be empty".into(),
            });
        }
        if self.request_timeout.is_zero() {
            return Err(ConfigError::InvalidValue {
                key: "SLACK_REQUEST_TIMEOUT_SECS".into(),
                message: "request timeout must be greater than zero".into(),
            });
        }
        Ok(())
    }
}

/// Capacity of the shared output queues, from `BOT_QUEUE_CAPACITY`.
/// Zero and unparsable values fall back to the default.
pub fn queue_capacity_from_env() -> usize {
    std::env::var("BOT_QUEUE_CAPACITY")
        .ok()
        .and_then(|s| s.parse().ok())
        .filter(|&n: &usize| n > 0)
        .unwrap_or(DEFAULT_QUEUE_CAPACITY)
}

fn secs_from_env(key: &str) -> Option<Duration> {
    std::env::var(key)
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .map(Duration::from_secs)
}

/// Strip a leading channel marker (`#general` -> `general`).
pub fn normalize_channel_name(channel: &str) -> String {
    let channel = channel.trim();
    channel.strip_prefix('#').unwrap_or(channel).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_uses_defaults() {
        let config = SlackConfig::new("xoxb-test");
        assert_eq!(config.bot_name, "keel");
        assert_eq!(config.approvals_channel, "general");
        assert_eq!(config.enqueue_timeout, DEFAULT_ENQUEUE_TIMEOUT);
        assert_eq!(config.request_timeout, DEFAULT_REQUEST_TIMEOUT);
        assert!(config.app_token.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn approvals_channel_marker_is_trimmed() {
        assert_eq!(normalize_channel_name("#deploys"), "deploys");
        assert_eq!(normalize_channel_name("deploys"), "deploys");
        // Only one marker is removed.
        assert_eq!(normalize_channel_name("##deploys"), "#deploys");

        let config = SlackConfig::new("t").with_approvals_channel("#ops");
        assert_eq!(config.approvals_channel, "ops");
    }

    #[test]
    fn validate_rejects_empty_name() {
        let config = SlackConfig::new("t").with_bot_name("  ");
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("SLACK_BOT_NAME"));
    }

    #[test]
    fn validate_rejects_bare_marker_channel() {
        let config = SlackConfig::new("t").with_approvals_channel("#");
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_zero_request_timeout() {
        let config = SlackConfig::new("t").with_request_timeout(Duration::ZERO);
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("SLACK_REQUEST_TIMEOUT_SECS"));
    }

    #[test]
    fn queue_capacity_ignores_zero() {
        // SAFETY: no other test reads BOT_QUEUE_CAPACITY.
        unsafe { std::env::set_var("BOT_QUEUE_CAPACITY", "0") };
        assert_eq!(queue_capacity_from_env(), DEFAULT_QUEUE_CAPACITY);
        unsafe { std::env::set_var("BOT_QUEUE_CAPACITY", "16") };
        assert_eq!(queue_capacity_from_env(), 16);
        unsafe { std::env::remove_var("BOT_QUEUE_CAPACITY") };
    }

    #[test]
    fn from_env_returns_none_without_token() {
        // SAFETY: no other test reads SLACK_TOKEN.
        unsafe { std::env::remove_var("SLACK_TOKEN") };
        assert!(SlackConfig::from_env().is_none());
    }
}
