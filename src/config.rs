use crate::reconciler::RetryPolicy;
use crate::utils::day_bucket::DEFAULT_MODERN_CUTOFF_SEASON;
use crate::utils::parlay::ScoringRules;
use anyhow::{Context, Result};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

const DEFAULT_DATA_FILE: &str = "data/league.json";
const DEFAULT_WEB_ADDR: &str = "127.0.0.1:3000";

/// Runtime settings, read from the environment (and `.env`)
#[derive(Debug, Clone)]
pub struct Config {
    pub data_file: PathBuf,
    pub rules: ScoringRules,
    pub retry: RetryPolicy,
    pub web_addr: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_file: PathBuf::from(DEFAULT_DATA_FILE),
            rules: ScoringRules::default(),
            retry: RetryPolicy::default(),
            web_addr: DEFAULT_WEB_ADDR.to_string(),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        // Load .env file
        dotenv::dotenv().ok();
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Config::default();

        let data_file = lookup("PARLAY_DATA_FILE")
            .map(PathBuf::from)
            .unwrap_or(defaults.data_file);
        let modern_cutoff_season = parse_var(
            &lookup,
            "PARLAY_MODERN_CUTOFF_SEASON",
            DEFAULT_MODERN_CUTOFF_SEASON,
        )?;
        let timeout_ms = parse_var(
            &lookup,
            "PARLAY_STORE_TIMEOUT_MS",
            defaults.retry.timeout.as_millis() as u64,
        )?;
        let attempts = parse_var(&lookup, "PARLAY_STORE_RETRIES", defaults.retry.attempts)?;
        let backoff_ms = parse_var(
            &lookup,
            "PARLAY_RETRY_BACKOFF_MS",
            defaults.retry.base_backoff.as_millis() as u64,
        )?;
        let web_addr = lookup("PARLAY_WEB_ADDR").unwrap_or(defaults.web_addr);

        if attempts == 0 {
            anyhow::bail!("PARLAY_STORE_RETRIES must be at least 1");
        }

        Ok(Self {
            data_file,
            rules: ScoringRules {
                modern_cutoff_season,
            },
            retry: RetryPolicy {
                attempts,
                timeout: Duration::from_millis(timeout_ms),
                base_backoff: Duration::from_millis(backoff_ms),
                ..defaults.retry
            },
            web_addr,
        })
    }
}

fn parse_var<T>(lookup: &impl Fn(&str) -> Option<String>, name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(name) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("Invalid value for {}: {:?}", name, raw)),
        None => Ok(default),
    }
}
