use std::sync::Arc;

use anyhow::Context;
use tokio_util::sync::CancellationToken;

use keel_bot::bot::{Bot, BotContext, BotFactories, KeywordVoteParser, dispatch_queues};
use keel_bot::channels::SlackBot;
use keel_bot::config::queue_capacity_from_env;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Install rustls crypto provider before any TLS usage
    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        eprintln!("Warning: a rustls crypto provider was already installed");
    }

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    eprintln!("🚢 Keel bot v{}", env!("CARGO_PKG_VERSION"));

    // ── Queues ───────────────────────────────────────────────────────────
    let capacity = queue_capacity_from_env();
    let (queues, mut receivers) = dispatch_queues(capacity);
    eprintln!("   Queue capacity: {}", capacity);

    // ── Bots ─────────────────────────────────────────────────────────────
    let mut factories = BotFactories::new();
    factories.register("slack", SlackBot::factory);

    let ctx = BotContext {
        queues,
        vote_parser: Arc::new(KeywordVoteParser),
    };
    let bots: Vec<Arc<dyn Bot>> = factories
        .configure(&ctx)
        .into_iter()
        .map(Arc::from)
        .collect();
    drop(ctx);

    if bots.is_empty() {
        anyhow::bail!("no bots configured (set SLACK_TOKEN and SLACK_APP_TOKEN)");
    }

    let cancel = CancellationToken::new();
    let mut handles = Vec::with_capacity(bots.len());
    for bot in &bots {
        let handle = bot
            .start(cancel.clone())
            .await
            .with_context(|| format!("failed to start {} bot", bot.name()))?;
        eprintln!("   Bot: {}", bot.name());
        handles.push((bot.name().to_string(), handle));
    }

    // ── Consumers ────────────────────────────────────────────────────────
    // Approvals and commands are handed to the pipelines attached here.
    tokio::spawn(async move {
        while let Some(vote) = receivers.approvals.recv().await {
            tracing::info!(
                voter = %vote.voter_id,
                decision = ?vote.decision,
                subject = %vote.subject,
                "Approval vote"
            );
        }
    });
    tokio::spawn(async move {
        while let Some(message) = receivers.commands.recv().await {
            tracing::info!(
                source = %message.source_name,
                channel = %message.channel_id,
                sender = %message.sender_id,
                text = %message.text,
                "Bot command"
            );
        }
    });

    // ── Shutdown ─────────────────────────────────────────────────────────
    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for ctrl-c")?;
    tracing::info!("Shutting down");
    cancel.cancel();

    for (name, handle) in handles {
        match handle.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::error!(bot = %name, error = %e, "Bot stopped with error"),
            Err(e) => tracing::error!(bot = %name, error = %e, "Bot task panicked"),
        }
    }

    Ok(())
}
