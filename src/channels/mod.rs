//! Chat integrations.

pub mod slack;

pub use slack::SlackBot;
