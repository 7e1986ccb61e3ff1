//! Relaybot: a Discord bot that relays messages to an LLM completion API,
//! keeping a rolling per-conversation transcript in Redis for continuity.

pub mod completion;
pub mod config;
pub mod error;
pub mod handler;
pub mod history;
pub mod messaging;
pub mod prompt;
pub mod transcript;

pub use error::{Error, Result};

use serde::{Deserialize, Serialize};

/// Inbound message event from the messaging platform.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboundMessage {
    pub sender_id: String,
    pub channel_id: String,
    pub text: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

impl InboundMessage {
    /// Key grouping this message's turns into one ongoing conversation.
    /// Scoped to channel and sender so the same user talking in two channels
    /// gets two independent histories.
    pub fn conversation_key(&self) -> String {
        format!("{}:{}", self.channel_id, self.sender_id)
    }
}

/// Outbound reply sent back into the originating channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum OutboundResponse {
    Text(String),
}
