//! Keel bot: chat approvals for automated deployments.
//!
//! Chat integrations classify inbound messages into approval votes and
//! operator commands and hand them to the approvals and command pipelines
//! through two bounded queues.

pub mod bot;
pub mod channels;
pub mod config;
pub mod error;
