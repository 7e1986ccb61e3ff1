//! Relaybot CLI entry point.

use anyhow::Context as _;
use clap::Parser;
use futures::StreamExt as _;
use relaybot::completion::OpenAiClient;
use relaybot::config::Config;
use relaybot::handler::MessageHandler;
use relaybot::history::RedisHistoryStore;
use relaybot::messaging::Messaging as _;
use relaybot::messaging::discord::DiscordAdapter;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "relaybot")]
#[command(about = "A Discord bot that relays messages to an LLM completion API")]
struct Cli {
    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::fmt().with_env_filter(filter).init();

    tracing::info!("Starting relaybot...");

    let config = Config::load().with_context(|| "failed to load configuration from environment")?;

    let store = RedisHistoryStore::connect(
        &config.redis.host,
        config.redis.port,
        config.redis.db,
        config.conversation.max_turns,
    )
    .await
    .with_context(|| {
        format!(
            "failed to connect to Redis at {}:{}",
            config.redis.host, config.redis.port
        )
    })?;

    tracing::info!(host = %config.redis.host, port = config.redis.port, "History store connected");

    let completion = OpenAiClient::new(
        config.openai.base_url.clone(),
        config.openai.api_key.clone(),
        config.openai.params.clone(),
    )
    .with_context(|| "failed to build completion client")?;

    let handler = Arc::new(MessageHandler::new(
        Arc::new(store),
        Arc::new(completion),
        config.discord.allowed_channel.clone(),
        config.conversation.prompt_budget,
    ));

    let adapter = Arc::new(DiscordAdapter::new(config.discord.bot_token.clone()));
    let mut inbound = adapter
        .start()
        .await
        .with_context(|| "failed to start Discord adapter")?;

    tracing::info!("Relaybot started");

    let dispatch = {
        let adapter = adapter.clone();
        tokio::spawn(async move {
            while let Some(message) = inbound.next().await {
                let handler = handler.clone();
                let adapter = adapter.clone();
                // One task per event: a slow completion or a fault in one
                // conversation never blocks another.
                tokio::spawn(async move {
                    let Some(response) = handler.handle(&message).await else {
                        return;
                    };
                    if let Err(error) = adapter.respond(&message, response).await {
                        tracing::error!(%error, channel_id = %message.channel_id, "failed to send reply");
                    }
                });
            }
        })
    };

    tokio::select! {
        _ = dispatch => {
            tracing::info!("Inbound stream ended");
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutdown signal received");
        }
    }

    tracing::info!("Relaybot stopped");
    Ok(())
}
