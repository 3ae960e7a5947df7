//! Error types for the Keel bot.

use std::time::Duration;

/// Top-level error type for the bot.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Identity error: {0}")]
    Identity(#[from] IdentityError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Bot identity resolution errors. Always fatal at startup.
#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
    #[error("could not find bot in the list of names, check if the bot is called \"{name}\"")]
    NotFound { name: String },

    #[error("Failed to list workspace users: {0}")]
    Directory(#[from] TransportError),
}

/// Failures talking to the chat service. Recoverable: callers log and
/// fail closed.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("HTTP error calling {method}: {reason}")]
    Http { method: String, reason: String },

    #[error("Slack API {method} returned error: {error}")]
    Api { method: String, error: String },

    #[error("Invalid response from {method}: {reason}")]
    InvalidResponse { method: String, reason: String },

    #[error("Channel {id} is not a public channel")]
    NotPublic { id: String },

    #[error("Request to {method} timed out after {timeout:?}")]
    Timeout { method: String, timeout: Duration },

    #[error("Failed to create HTTP client: {0}")]
    ClientBuild(String),
}

/// Bot lifecycle errors.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("Bot {name} failed to start: {reason}")]
    StartupFailed { name: String, reason: String },

    #[error("Bot {name} disconnected: {reason}")]
    Disconnected { name: String, reason: String },

    #[error("Authentication failed for bot {name}: {reason}")]
    AuthFailed { name: String, reason: String },
}
