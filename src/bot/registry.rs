//! Bot factory table: constructors keyed by integration name, built once at
//! application wiring time.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{info, warn};

use super::{Bot, DispatchQueues, VoteParser};

/// Everything a bot needs from the application at construction time.
#[derive(Clone)]
pub struct BotContext {
    pub queues: DispatchQueues,
    pub vote_parser: Arc<dyn VoteParser>,
}

/// Builds a bot, or returns `None` when the integration is not configured.
pub type BotFactory = fn(&BotContext) -> Option<Box<dyn Bot>>;

/// Table of bot constructors.
#[derive(Default)]
pub struct BotFactories {
    factories: BTreeMap<String, BotFactory>,
}

impl BotFactories {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a factory. A second registration under the same name
    /// replaces the first.
    pub fn register(&mut self, name: impl Into<String>, factory: BotFactory) -> &mut Self {
        let name = name.into();
        if self.factories.insert(name.clone(), factory).is_some() {
            warn!(bot = %name, "Bot factory registered twice; keeping the latest");
        }
        self
    }

    pub fn names(&self) -> Vec<&str> {
        self.factories.keys().map(String::as_str).collect()
    }

    /// Run every factory and keep the bots that are configured.
    pub fn configure(&self, ctx: &BotContext) -> Vec<Box<dyn Bot>> {
        self.factories
            .iter()
            .filter_map(|(name, factory)| {
                let bot = factory(ctx);
                if bot.is_none() {
                    info!(bot = %name, "Bot is not configured, skipping");
                }
                bot
            })
            .collect()
    }
}
