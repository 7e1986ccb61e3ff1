//! Conversation history persistence (Redis).

use crate::error::{Result, StoreError};
use crate::transcript::{Transcript, Turn};
use async_trait::async_trait;
use redis::AsyncCommands as _;
use std::time::Duration;

/// Per-operation timeout against the backing cache. A slow Redis must fail
/// the single request, not wedge the event task.
const OP_TIMEOUT: Duration = Duration::from_secs(5);

/// Storage seam for conversation transcripts.
///
/// A missing key is an empty transcript, not an error. Concurrent appends to
/// the same key are not coordinated: two in-flight events may interleave
/// their read-modify-write cycles and the later write wins. That lost-update
/// window is accepted; no per-key locking or versioning here.
#[async_trait]
pub trait TranscriptStore: Send + Sync {
    /// Load the transcript for a conversation key.
    async fn get_transcript(&self, key: &str) -> Result<Transcript>;

    /// Append a turn, evicting the oldest turns beyond the configured bound.
    async fn append_turn(&self, key: &str, turn: Turn) -> Result<()>;
}

/// Redis-backed transcript store. Cloning shares the underlying multiplexed
/// connection; no in-process cache sits in front of the server.
#[derive(Clone)]
pub struct RedisHistoryStore {
    connection: redis::aio::ConnectionManager,
    max_turns: usize,
}

impl RedisHistoryStore {
    /// Connect to Redis at `host:port` using the given database index.
    pub async fn connect(host: &str, port: u16, db: i64, max_turns: usize) -> Result<Self> {
        let url = format!("redis://{host}:{port}/{db}");
        let client =
            redis::Client::open(url).map_err(|error| StoreError::Unavailable(error.to_string()))?;
        let connection = client
            .get_connection_manager()
            .await
            .map_err(|error| StoreError::Unavailable(error.to_string()))?;

        Ok(Self {
            connection,
            max_turns,
        })
    }

    fn storage_key(key: &str) -> String {
        format!("transcript:{key}")
    }

    async fn load(&self, storage_key: &str) -> Result<Transcript> {
        let mut connection = self.connection.clone();
        let raw: Option<String> = tokio::time::timeout(OP_TIMEOUT, connection.get(storage_key))
            .await
            .map_err(|_| StoreError::Unavailable("read timed out".into()))?
            .map_err(|error| StoreError::Unavailable(error.to_string()))?;

        match raw {
            Some(raw) => Ok(Transcript::decode(&raw).map_err(StoreError::Decode)?),
            None => Ok(Transcript::new()),
        }
    }
}

#[async_trait]
impl TranscriptStore for RedisHistoryStore {
    async fn get_transcript(&self, key: &str) -> Result<Transcript> {
        self.load(&Self::storage_key(key)).await
    }

    async fn append_turn(&self, key: &str, turn: Turn) -> Result<()> {
        let storage_key = Self::storage_key(key);

        let mut transcript = self.load(&storage_key).await?;
        transcript.push_bounded(turn, self.max_turns);
        let raw = transcript.encode().map_err(StoreError::Encode)?;

        let mut connection = self.connection.clone();
        tokio::time::timeout(OP_TIMEOUT, connection.set::<_, _, ()>(&storage_key, raw))
            .await
            .map_err(|_| StoreError::Unavailable("write timed out".into()))?
            .map_err(|error| StoreError::Unavailable(error.to_string()))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_keys_are_namespaced() {
        assert_eq!(
            RedisHistoryStore::storage_key("1138:42"),
            "transcript:1138:42"
        );
    }
}
