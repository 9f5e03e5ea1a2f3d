use anyhow::{Context, Result};
use dotenvy::dotenv;
use std::env;
use std::time::Duration;

const DEFAULT_DATABASE_URL: &str = "sqlite://jobs.db?mode=rwc";
const DEFAULT_MODEL: &str = "gpt-4o-mini";
const DEFAULT_OPENAI_TIMEOUT_SECS: u64 = 60;

#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    pub openai_api_key: Option<String>,
    pub openai_base_url: Option<String>,
    pub openai_model: String,
    pub openai_timeout: Duration,
    pub requests_per_second: Option<u32>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        // Load .env file if present (development)
        let _ = dotenv();

        Ok(Self {
            database_url: env::var("DATABASE_URL")
                .unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string()),
            openai_api_key: env::var("OPENAI_API_KEY").ok().filter(|k| !k.is_empty()),
            openai_base_url: env::var("OPENAI_BASE_URL").ok().filter(|u| !u.is_empty()),
            openai_model: env::var("OPENAI_MODEL")
                .unwrap_or_else(|_| DEFAULT_MODEL.to_string()),
            openai_timeout: Duration::from_secs(
                env::var("OPENAI_TIMEOUT_SECS")
                    .ok()
                    .map(|v| v.parse())
                    .transpose()
                    .context("OPENAI_TIMEOUT_SECS must be a whole number")?
                    .unwrap_or(DEFAULT_OPENAI_TIMEOUT_SECS),
            ),
            requests_per_second: env::var("FETCH_REQUESTS_PER_SECOND")
                .ok()
                .map(|v| v.parse())
                .transpose()
                .context("FETCH_REQUESTS_PER_SECOND must be a whole number")?,
        })
    }

    /// The API key, required only by commands that call the LLM.
    pub fn require_openai_key(&self) -> Result<&str> {
        self.openai_api_key
            .as_deref()
            .context("OPENAI_API_KEY must be set")
    }
}
