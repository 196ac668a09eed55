use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clipqueue::{DEFAULT_POLL_COOLDOWN, DEFAULT_POLL_TIMEOUT, DEFAULT_TICK_INTERVAL};

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub api_url: String,
    pub api_token: String,
    pub bind_addr: String,
    pub journal_path: PathBuf,
    pub poll_cooldown: Duration,
    pub poll_timeout: Duration,
    pub tick_interval: Duration,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        let api_url = get("TTS_API_URL")?;
        let api_token = get("TTS_API_TOKEN")?;
        let bind_addr =
            std::env::var("SYNTHD_BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string());
        let journal_path = std::env::var("SYNTHD_JOURNAL_PATH")
            .unwrap_or_else(|_| "synthd_jobs.json".to_string())
            .into();
        let poll_cooldown = millis("SYNTHD_POLL_COOLDOWN_MS", DEFAULT_POLL_COOLDOWN)?;
        let poll_timeout = millis("SYNTHD_POLL_TIMEOUT_MS", DEFAULT_POLL_TIMEOUT)?;
        let tick_interval = millis("SYNTHD_TICK_INTERVAL_MS", DEFAULT_TICK_INTERVAL)?;

        // Fail fast, fail loud.
        if !api_url.starts_with("http://") && !api_url.starts_with("https://") {
            bail!("TTS_API_URL must start with http:// or https://");
        }

        Ok(Self {
            api_url,
            api_token,
            bind_addr,
            journal_path,
            poll_cooldown,
            poll_timeout,
            tick_interval,
        })
    }
}

fn get(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Missing required env var: {key}"))
}

fn millis(key: &str, default: Duration) -> Result<Duration> {
    match std::env::var(key) {
        Ok(raw) => {
            let ms: u64 = raw
                .parse()
                .with_context(|| format!("{key} must be an integer millisecond count"))?;
            Ok(Duration::from_millis(ms))
        }
        Err(_) => Ok(default),
    }
}
