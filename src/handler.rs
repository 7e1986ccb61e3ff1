//! Per-event orchestration: history fetch, prompt assembly, completion, reply.

use crate::completion::CompletionClient;
use crate::history::TranscriptStore;
use crate::prompt;
use crate::transcript::{Transcript, Turn};
use crate::{InboundMessage, OutboundResponse};
use std::sync::Arc;

/// Reply sent when the completion API fails.
pub const FAILURE_REPLY: &str =
    "Sorry, I couldn't come up with a reply just now. Please try again in a moment.";

/// Handles one inbound event end to end. Holds no per-conversation state of
/// its own; the transcript lives in the store and is only borrowed for the
/// duration of a request.
#[derive(Clone)]
pub struct MessageHandler {
    store: Arc<dyn TranscriptStore>,
    completion: Arc<dyn CompletionClient>,
    /// When set, events from any other channel are ignored.
    allowed_channel: Option<String>,
    prompt_budget: usize,
}

impl MessageHandler {
    pub fn new(
        store: Arc<dyn TranscriptStore>,
        completion: Arc<dyn CompletionClient>,
        allowed_channel: Option<String>,
        prompt_budget: usize,
    ) -> Self {
        Self {
            store,
            completion,
            allowed_channel,
            prompt_budget,
        }
    }

    /// Process one inbound event. Returns `None` for out-of-scope events,
    /// otherwise the reply to send back into the originating channel.
    pub async fn handle(&self, message: &InboundMessage) -> Option<OutboundResponse> {
        if let Some(allowed) = &self.allowed_channel
            && *allowed != message.channel_id
        {
            tracing::debug!(channel_id = %message.channel_id, "ignoring out-of-scope event");
            return None;
        }

        let key = message.conversation_key();

        // An unreachable store must not kill the request: degrade to an
        // empty transcript for this one event and keep the failure visible
        // in the logs, so it can't be mistaken for a genuinely new user.
        let transcript = match self.store.get_transcript(&key).await {
            Ok(transcript) => transcript,
            Err(error) => {
                tracing::warn!(%error, key = %key, "history unavailable, proceeding without it");
                Transcript::new()
            }
        };

        let rendered = prompt::render(&transcript, &message.text, self.prompt_budget);
        tracing::debug!(key = %key, prompt_chars = rendered.chars().count(), "prompt assembled");

        let reply = match self.completion.complete(&rendered).await {
            Ok(reply) => reply,
            Err(error) => {
                // Failed exchanges must not pollute the transcript, so
                // nothing is appended on this path.
                tracing::error!(%error, key = %key, "completion request failed");
                return Some(OutboundResponse::Text(FAILURE_REPLY.to_string()));
            }
        };

        // User turn first, bot turn second: the stored transcript reads in
        // conversation order. If the user turn fails to persist the bot turn
        // is skipped so the pair never ends up half-written out of order.
        if let Err(error) = self
            .store
            .append_turn(&key, Turn::user(message.text.clone()))
            .await
        {
            tracing::warn!(%error, key = %key, "failed to append user turn");
        } else if let Err(error) = self.store.append_turn(&key, Turn::bot(reply.clone())).await {
            tracing::warn!(%error, key = %key, "failed to append bot turn");
        }

        Some(OutboundResponse::Text(reply))
    }
}
