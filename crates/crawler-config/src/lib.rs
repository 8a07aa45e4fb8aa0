// ============================================================================
// Crawler Config - Centralized configuration management
// ============================================================================
//
// Configuration for the crawler worker, loaded from environment variables
// (and an optional .env file) with sensible defaults.
//
// ============================================================================

mod broker;
mod constants;
mod crawl;
mod dedup;

pub use broker::BrokerConfig;
pub use constants::SECONDS_PER_HOUR;
pub use crawl::CrawlConfig;
pub use dedup::DedupConfig;

use anyhow::Result;
use constants::DEFAULT_HEALTH_PORT;

/// Main configuration structure for the crawler worker
#[derive(Clone, Debug)]
pub struct Config {
    pub broker: BrokerConfig,
    pub dedup: DedupConfig,
    pub crawl: CrawlConfig,

    /// Port for /health and /metrics; 0 disables the endpoint
    pub health_port: u16,
    pub rust_log: String,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        Ok(Self {
            broker: BrokerConfig::from_env(),
            dedup: DedupConfig::from_env(),
            crawl: CrawlConfig::from_env()?,

            health_port: std::env::var("HEALTH_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(DEFAULT_HEALTH_PORT),

            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        })
    }
}
