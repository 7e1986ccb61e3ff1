//! Configuration loading and validation.

use crate::completion::ModelParams;
use crate::error::{ConfigError, Result};

/// Relaybot configuration. Built once at startup and passed in explicitly,
/// so tests (or a second bot in the same process) can construct their own
/// instance instead of reaching for process-wide globals.
#[derive(Debug, Clone)]
pub struct Config {
    pub discord: DiscordConfig,
    pub openai: OpenAiConfig,
    pub redis: RedisConfig,
    pub conversation: ConversationConfig,
}

/// Discord connection settings.
#[derive(Debug, Clone)]
pub struct DiscordConfig {
    pub bot_token: String,
    /// When set, events from any other channel are ignored.
    pub allowed_channel: Option<String>,
}

/// Completion API settings.
#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    pub api_key: String,
    pub base_url: String,
    pub params: ModelParams,
}

/// Backing-store connection settings.
#[derive(Debug, Clone)]
pub struct RedisConfig {
    pub host: String,
    pub port: u16,
    pub db: i64,
}

/// Transcript behavior settings.
#[derive(Debug, Clone, Copy)]
pub struct ConversationConfig {
    /// Maximum turns retained per conversation key.
    pub max_turns: usize,
    /// Character budget for the rendered prompt.
    pub prompt_budget: usize,
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self {
            max_turns: 20,
            prompt_budget: 4096,
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self> {
        let discord = DiscordConfig {
            bot_token: require_env("DISCORD_BOT_TOKEN")?,
            allowed_channel: std::env::var("RELAYBOT_CHANNEL_ID").ok(),
        };

        let openai = OpenAiConfig {
            api_key: require_env("OPENAI_API_KEY")?,
            base_url: std::env::var("OPENAI_BASE_URL")
                .unwrap_or_else(|_| "https://api.openai.com".into()),
            params: ModelParams {
                model: std::env::var("RELAYBOT_MODEL")
                    .unwrap_or_else(|_| ModelParams::default().model),
                ..ModelParams::default()
            },
        };

        let redis = RedisConfig {
            host: std::env::var("REDIS_HOST").unwrap_or_else(|_| "redis".into()),
            port: parse_env("REDIS_PORT", 6379)?,
            db: parse_env("REDIS_DB", 0)?,
        };

        let defaults = ConversationConfig::default();
        let conversation = ConversationConfig {
            max_turns: parse_env("RELAYBOT_MAX_TURNS", defaults.max_turns)?,
            prompt_budget: parse_env("RELAYBOT_PROMPT_BUDGET", defaults.prompt_budget)?,
        };

        Ok(Self {
            discord,
            openai,
            redis,
            conversation,
        })
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).map_err(|_| ConfigError::MissingKey(key.into()).into())
}

fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> Result<T> {
    match std::env::var(key) {
        Ok(raw) => raw
            .parse()
            .map_err(|_| ConfigError::Invalid(format!("{key} must be a number, got '{raw}'")).into()),
        Err(_) => Ok(default),
    }
}
