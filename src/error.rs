//! Top-level error types for relaybot.

/// Crate-wide result type alias.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error enum wrapping domain-specific errors.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Completion(#[from] CompletionError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Configuration loading errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required config key: {0}")]
    MissingKey(String),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// History store errors.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Redis could not be reached or the operation timed out. Kept distinct
    /// from a genuinely empty history, which is not an error at all.
    #[error("history store unavailable: {0}")]
    Unavailable(String),

    #[error("failed to encode transcript: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("failed to decode transcript: {0}")]
    Decode(#[source] serde_json::Error),
}

/// Completion API errors. `retryable()` is a hint for callers; the bot
/// itself never retries a request.
#[derive(Debug, thiserror::Error)]
pub enum CompletionError {
    #[error("completion API rate limited: {0}")]
    RateLimited(String),

    #[error("completion request timed out")]
    Timeout,

    #[error("completion API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("malformed completion response: {0}")]
    MalformedResponse(String),

    #[error("completion returned no non-empty choices")]
    EmptyCompletion,

    #[error("completion request failed: {0}")]
    Transport(String),
}

impl CompletionError {
    /// Whether repeating the request could plausibly succeed.
    pub fn retryable(&self) -> bool {
        match self {
            CompletionError::RateLimited(_)
            | CompletionError::Timeout
            | CompletionError::Transport(_) => true,
            CompletionError::Api { status, .. } => *status >= 500,
            CompletionError::MalformedResponse(_) | CompletionError::EmptyCompletion => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_limit_and_server_errors_are_retryable() {
        assert!(CompletionError::RateLimited("quota".into()).retryable());
        assert!(CompletionError::Timeout.retryable());
        assert!(
            CompletionError::Api {
                status: 503,
                message: "overloaded".into()
            }
            .retryable()
        );
    }

    #[test]
    fn client_errors_and_bad_responses_are_not_retryable() {
        assert!(
            !CompletionError::Api {
                status: 400,
                message: "bad request".into()
            }
            .retryable()
        );
        assert!(!CompletionError::MalformedResponse("not json".into()).retryable());
        assert!(!CompletionError::EmptyCompletion.retryable());
    }
}
