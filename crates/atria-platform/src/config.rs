use std::time::Duration;

use anyhow::{Context, Result};

const DEFAULT_ALEGEUS_TIMEOUT_MS: u64 = 2_000;

#[derive(Clone, Debug)]
pub struct ServiceConfig {
    pub redis_url: String,
    pub alegeus_api_url: String,
    /// Applied to the employee-activity call only; a timed-out wallet is a
    /// recoverable per-wallet failure, not fatal to a batch.
    pub alegeus_timeout: Duration,
}

impl ServiceConfig {
    pub fn from_env() -> Result<Self> {
        let redis_url = std::env::var("REDIS_URL").context("REDIS_URL is required")?;
        let alegeus_api_url =
            std::env::var("ALEGEUS_API_URL").context("ALEGEUS_API_URL is required")?;
        let alegeus_timeout = std::env::var("ALEGEUS_TIMEOUT_MS")
            .ok()
            .and_then(|raw| raw.parse().ok())
            .map(Duration::from_millis)
            .unwrap_or(Duration::from_millis(DEFAULT_ALEGEUS_TIMEOUT_MS));

        Ok(Self {
            redis_url,
            alegeus_api_url,
            alegeus_timeout,
        })
    }
}
