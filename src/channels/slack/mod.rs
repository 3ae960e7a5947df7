//! Slack integration.
//!
//! The event router is the core: it classifies each inbound message as
//! noise, an approval vote or an operator command and dispatches it. The
//! remaining modules are the collaborators it calls (identity, channel
//! classification, replies) and the transport that feeds it.

pub mod api;
pub mod bot;
pub mod classifier;
pub mod client;
pub mod identity;
pub mod responder;
pub mod router;
pub mod socket;

#[cfg(test)]
pub(crate) mod testing;

pub use api::{Attachment, AttachmentField, ConversationInfo, FileUpload, SlackApi, SlackUser};
pub use bot::SlackBot;
pub use classifier::ChannelClassifier;
pub use client::SlackWebClient;
pub use identity::BotIdentity;
pub use responder::Responder;
pub use router::{Disposition, EventRouter, InboundEvent};
pub use socket::TransportEvent;

/// Source tag attached to every `BotMessage` produced by this integration.
pub const SOURCE_NAME: &str = "slack";
