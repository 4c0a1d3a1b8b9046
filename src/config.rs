//! Runtime configuration
//!
//! Everything comes from the process environment, after an optional
//! `.env` file has been merged in by the binary. Parsing goes through a
//! lookup closure so it can be exercised without mutating the real
//! environment.

use crate::error::{BotError, Result};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_MODEL: &str = "arcee-ai/trinity-large-preview:free";
pub const DEFAULT_LLM_URL: &str = "https://openrouter.ai/api/v1/chat/completions";

#[derive(Debug, Clone)]
pub struct Config {
    /// Only `serve` needs the chat transport.
    pub telegram: Option<TelegramSettings>,
    pub llm: LlmSettings,
    pub database: DatabaseSettings,
    pub log_file: Option<PathBuf>,
}

#[derive(Clone)]
pub struct TelegramSettings {
    pub token: String,
}

#[derive(Clone)]
pub struct LlmSettings {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
    pub max_tokens: u32,
}

#[derive(Clone)]
pub struct DatabaseSettings {
    pub url: String,
    pub max_connections: u32,
    pub acquire_timeout: Duration,
    pub max_lifetime: Duration,
    /// Applied per statement, server-side and client-side.
    pub statement_timeout: Duration,
}

// Secrets stay out of logs.
impl std::fmt::Debug for TelegramSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramSettings").field("token", &"***").finish()
    }
}

impl std::fmt::Debug for LlmSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmSettings")
            .field("api_key", &"***")
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("max_tokens", &self.max_tokens)
            .finish()
    }
}

impl std::fmt::Debug for DatabaseSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let host = self.url.split('@').nth(1).unwrap_or("database");
        f.debug_struct("DatabaseSettings")
            .field("host", &host)
            .field("max_connections", &self.max_connections)
            .field("acquire_timeout", &self.acquire_timeout)
            .field("max_lifetime", &self.max_lifetime)
            .field("statement_timeout", &self.statement_timeout)
            .finish()
    }
}

impl Config {
    /// Load from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Env { lookup };

        let telegram = env
            .optional("TELEGRAM_TOKEN")
            .map(|token| TelegramSettings { token });

        let llm = LlmSettings {
            api_key: env.required("OPENROUTER_API_KEY")?,
            model: env.optional("LLM_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            base_url: env
                .optional("LLM_BASE_URL")
                .unwrap_or_else(|| DEFAULT_LLM_URL.to_string()),
            max_tokens: env.parsed("LLM_MAX_TOKENS", 1000)?,
        };

        let database = DatabaseSettings::read(&env)?;

        let log_file = match env.optional("LOG_FILE") {
            Some(path) if path.is_empty() => None,
            Some(path) => Some(PathBuf::from(path)),
            None => Some(PathBuf::from("bot.log")),
        };

        Ok(Self {
            telegram,
            llm,
            database,
            log_file,
        })
    }

    /// The chat transport settings, which are mandatory when serving.
    pub fn require_telegram(&self) -> Result<&TelegramSettings> {
        self.telegram
            .as_ref()
            .ok_or_else(|| BotError::Config("TELEGRAM_TOKEN is not set".to_string()))
    }
}

impl DatabaseSettings {
    /// Database settings alone, for tools that never talk to the model.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        Self::read(&Env { lookup })
    }

    fn read<F>(env: &Env<F>) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let settings = Self {
            url: env.required("DATABASE_URL")?,
            max_connections: env.parsed("DB_MAX_CONNECTIONS", 30)?,
            acquire_timeout: Duration::from_secs(env.parsed("DB_ACQUIRE_TIMEOUT_SECS", 30)?),
            max_lifetime: Duration::from_secs(env.parsed("DB_MAX_LIFETIME_SECS", 3600)?),
            statement_timeout: Duration::from_secs(env.parsed("DB_STATEMENT_TIMEOUT_SECS", 15)?),
        };

        if settings.max_connections == 0 {
            return Err(BotError::Config(
                "DB_MAX_CONNECTIONS must be at least 1".to_string(),
            ));
        }
        Ok(settings)
    }
}

struct Env<F> {
    lookup: F,
}

impl<F> Env<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn optional(&self, key: &str) -> Option<String> {
        (self.lookup)(key).map(|v| v.trim().to_string())
    }

    fn required(&self, key: &str) -> Result<String> {
        match self.optional(key) {
            Some(value) if !value.is_empty() => Ok(value),
            _ => Err(BotError::Config(format!("{} is not set", key))),
        }
    }

    fn parsed<T>(&self, key: &str, default: T) -> Result<T>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        match self.optional(key) {
            None => Ok(default),
            Some(raw) if raw.is_empty() => Ok(default),
            Some(raw) => raw
                .parse()
                .map_err(|e| BotError::Config(format!("{} has invalid value '{}': {}", key, raw, e))),
        }
    }
}
