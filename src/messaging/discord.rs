//! Discord messaging adapter (serenity gateway client).

use crate::error::Result;
use crate::messaging::traits::{InboundStream, Messaging};
use crate::{InboundMessage, OutboundResponse};
use anyhow::Context as _;
use serenity::all::{ChannelId, EventHandler, GatewayIntents, Message, Ready};
use serenity::async_trait;
use serenity::client::Context as SerenityContext;
use std::sync::{Arc, OnceLock};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

/// Discord adapter state. The HTTP handle is populated once the gateway
/// client has been built in `start`.
pub struct DiscordAdapter {
    token: String,
    http: OnceLock<Arc<serenity::http::Http>>,
}

impl DiscordAdapter {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            http: OnceLock::new(),
        }
    }
}

/// Gateway event handler that forwards message events into the inbound
/// channel.
struct Forwarder {
    sender: mpsc::Sender<InboundMessage>,
}

#[async_trait]
impl EventHandler for Forwarder {
    async fn ready(&self, _ctx: SerenityContext, ready: Ready) {
        tracing::info!(user = %ready.user.name, "Discord gateway connected");
    }

    async fn message(&self, _ctx: SerenityContext, message: Message) {
        // The bot's own replies (and other bots) never become events.
        if message.author.bot {
            return;
        }

        let timestamp = chrono::DateTime::from_timestamp(message.timestamp.unix_timestamp(), 0)
            .unwrap_or_else(chrono::Utc::now);

        let inbound = InboundMessage {
            sender_id: message.author.id.to_string(),
            channel_id: message.channel_id.to_string(),
            text: message.content.clone(),
            timestamp,
        };

        if self.sender.send(inbound).await.is_err() {
            tracing::warn!("inbound channel closed, dropping Discord message");
        }
    }
}

impl Messaging for DiscordAdapter {
    fn name(&self) -> &str {
        "discord"
    }

    async fn start(&self) -> Result<InboundStream> {
        let (sender, receiver) = mpsc::channel(64);

        let intents = GatewayIntents::GUILDS
            | GatewayIntents::GUILD_MESSAGES
            | GatewayIntents::DIRECT_MESSAGES
            | GatewayIntents::MESSAGE_CONTENT;

        let mut client = serenity::Client::builder(&self.token, intents)
            .event_handler(Forwarder { sender })
            .await
            .with_context(|| "failed to build Discord client")?;

        let _ = self.http.set(client.http.clone());

        tokio::spawn(async move {
            if let Err(error) = client.start().await {
                tracing::error!(%error, "Discord client stopped");
            }
        });

        Ok(Box::pin(ReceiverStream::new(receiver)) as InboundStream)
    }

    async fn respond(&self, message: &InboundMessage, response: OutboundResponse) -> Result<()> {
        let http = self
            .http
            .get()
            .ok_or_else(|| anyhow::anyhow!("Discord adapter not started"))?;

        let channel_id: u64 = message
            .channel_id
            .parse()
            .with_context(|| format!("invalid Discord channel id: {}", message.channel_id))?;

        let OutboundResponse::Text(text) = response;
        ChannelId::new(channel_id)
            .say(http.as_ref(), text)
            .await
            .with_context(|| "failed to send Discord reply")?;

        Ok(())
    }
}
