use anyhow::{Context, Result};

use crate::evaluation::evaluator::DEFAULT_MAX_RETRIES;
use crate::evaluation::key_store::DEFAULT_COOLDOWN_SECS;
use crate::notifications::DEFAULT_QUEUE_CAPACITY;

const DEFAULT_LLM_BASE_URL: &str = "https://openrouter.ai/api/v1";
const DEFAULT_LLM_MODEL: &str = "openai/gpt-oss-20b:free";
const DEFAULT_EMAIL_FROM: &str = "Acme <onboarding@resend.dev>";
const DEFAULT_INTERVIEW_BASE_URL: &str = "http://agent.hostmyidea.me";
const DEFAULT_MAX_UPLOAD_SIZE: usize = 10 * 1024 * 1024;
const DEFAULT_MAX_BATCH_SIZE: usize = 100 * 1024 * 1024;

/// Application configuration loaded from environment variables.
/// Startup fails if required variables are missing.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    /// Comma-separated in `LLM_KEYS`; blank entries are dropped.
    pub llm_keys: Vec<String>,
    pub llm_base_url: String,
    pub llm_model: String,
    pub llm_max_retries: u32,
    pub llm_key_cooldown_secs: i64,
    pub resend_api_key: Option<String>,
    pub email_from: String,
    pub livekit_api_key: Option<String>,
    pub livekit_api_secret: Option<String>,
    pub interview_base_url: String,
    pub max_upload_size: usize,
    pub max_batch_size: usize,
    pub allowed_extensions: Vec<String>,
    pub notify_queue_capacity: usize,
    pub port: u16,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            database_url: require_env("DATABASE_URL")?,
            jwt_secret: require_env("JWT_SECRET")?,
            llm_keys: split_list(&require_env("LLM_KEYS")?),
            llm_base_url: env_or("LLM_BASE_URL", DEFAULT_LLM_BASE_URL),
            llm_model: env_or("LLM_MODEL", DEFAULT_LLM_MODEL),
            llm_max_retries: parse_env("LLM_MAX_RETRIES", DEFAULT_MAX_RETRIES)?,
            llm_key_cooldown_secs: parse_env("LLM_KEY_COOLDOWN_SECS", DEFAULT_COOLDOWN_SECS)?,
            resend_api_key: optional_env("RESEND_API_KEY"),
            email_from: env_or("EMAIL_FROM", DEFAULT_EMAIL_FROM),
            livekit_api_key: optional_env("LIVEKIT_API_KEY"),
            livekit_api_secret: optional_env("LIVEKIT_API_SECRET"),
            interview_base_url: env_or("INTERVIEW_BASE_URL", DEFAULT_INTERVIEW_BASE_URL),
            max_upload_size: parse_env("MAX_UPLOAD_SIZE", DEFAULT_MAX_UPLOAD_SIZE)?,
            max_batch_size: parse_env("MAX_BATCH_SIZE", DEFAULT_MAX_BATCH_SIZE)?,
            allowed_extensions: split_list(&env_or("ALLOWED_EXTENSIONS", "pdf,txt"))
                .into_iter()
                .map(|ext| ext.to_lowercase())
                .collect(),
            notify_queue_capacity: parse_env("NOTIFY_QUEUE_CAPACITY", DEFAULT_QUEUE_CAPACITY)?,
            port: parse_env("PORT", 8080)?,
            rust_log: env_or("RUST_LOG", "info"),
        })
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn env_or(key: &str, default: &str) -> String {
    optional_env(key).unwrap_or_else(|| default.to_string())
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match optional_env(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("Environment variable '{key}' has an invalid value")),
        None => Ok(default),
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_list_drops_blank_entries() {
        assert_eq!(
            split_list("sk-one, ,sk-two,,"),
            vec!["sk-one".to_string(), "sk-two".to_string()]
        );
    }

    #[test]
    fn test_split_list_empty() {
        assert!(split_list("").is_empty());
    }
}
