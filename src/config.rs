use anyhow::{Context, Result};
use std::env;
use std::time::Duration;

/// Runtime configuration, read once at startup.
#[derive(Clone)]
pub struct Config {
    pub bot_token: String,
    pub google_client_id: String,
    pub google_client_secret: String,
    /// Public base URL used to build the OAuth redirect.
    pub base_url: String,
    pub bind_addr: String,
    pub gmail_base_url: String,
    /// Fixed period between poll cycles.
    pub poll_interval: Duration,
    /// How far back unread messages are considered.
    pub lookback: Duration,
    /// Per-cycle cap on listed messages per subscriber.
    pub max_results: u32,
    /// Delay before a delivered notification is auto-deleted.
    pub delete_after: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let bot_token =
            env::var("TELEGRAM_BOT_TOKEN").context("TELEGRAM_BOT_TOKEN must be set")?;
        let google_client_id =
            env::var("GOOGLE_CLIENT_ID").context("GOOGLE_CLIENT_ID must be set")?;
        let google_client_secret =
            env::var("GOOGLE_CLIENT_SECRET").context("GOOGLE_CLIENT_SECRET must be set")?;

        let base_url =
            env::var("BASE_URL").unwrap_or_else(|_| "http://localhost:5000".to_string());
        let bind_addr = env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:5000".to_string());
        let gmail_base_url = env::var("GMAIL_BASE_URL")
            .unwrap_or_else(|_| "https://gmail.googleapis.com".to_string());

        Ok(Config {
            bot_token,
            google_client_id,
            google_client_secret,
            base_url,
            bind_addr,
            gmail_base_url,
            poll_interval: Duration::from_secs(env_u64("POLL_INTERVAL_SECONDS", 15)),
            lookback: Duration::from_secs(env_u64("LOOKBACK_SECONDS", 3600)),
            max_results: env_u64("POLL_MAX_RESULTS", 3) as u32,
            delete_after: Duration::from_secs(env_u64("DELETE_AFTER_SECONDS", 120)),
        })
    }
}

fn env_u64(key: &str, default: u64) -> u64 {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
