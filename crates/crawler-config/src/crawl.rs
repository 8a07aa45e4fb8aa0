// ============================================================================
// Crawl Configuration
// ============================================================================

use crate::constants::*;
use anyhow::{Context, Result};
use std::time::Duration;
use url::Url;

/// Settings for fetching pages and extracting links
#[derive(Clone, Debug)]
pub struct CrawlConfig {
    /// Root of the site being mirrored; its host bounds link extraction
    pub root_url: Url,
    pub user_agent: String,
    pub fetch_timeout_secs: u64,
    /// Deliveries processed concurrently by one worker
    pub concurrency: usize,
}

impl CrawlConfig {
    pub(crate) fn from_env() -> Result<Self> {
        let root_url = std::env::var("CRAWL_ROOT_URL").context("CRAWL_ROOT_URL must be set")?;
        let root_url = Url::parse(&root_url)
            .with_context(|| format!("CRAWL_ROOT_URL is not a valid URL: {}", root_url))?;
        if root_url.host_str().is_none() {
            anyhow::bail!("CRAWL_ROOT_URL must include a host");
        }

        Ok(Self {
            root_url,
            user_agent: std::env::var("CRAWL_USER_AGENT").unwrap_or_else(|_| {
                concat!("crawler-worker/", env!("CARGO_PKG_VERSION")).to_string()
            }),
            fetch_timeout_secs: std::env::var("CRAWL_FETCH_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_FETCH_TIMEOUT_SECS),
            concurrency: std::env::var("CRAWL_CONCURRENCY")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|n| *n > 0)
                .unwrap_or(DEFAULT_CONCURRENCY),
        })
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    /// Host whose links are followed
    pub fn host(&self) -> &str {
        self.root_url.host_str().unwrap_or_default()
    }
}
