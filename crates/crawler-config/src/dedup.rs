// ============================================================================
// Dedup Store Configuration
// ============================================================================

use crate::constants::*;
use std::time::Duration;

/// Settings for the TTL-keyed "already seen" store
#[derive(Clone, Debug)]
pub struct DedupConfig {
    /// "host:port" or a full redis:// / rediss:// URL
    pub address: String,
    /// Namespace prefix; keys are stored as "{prefix}:{key}"
    pub prefix: String,
    /// How long a page stays "seen"
    pub ttl_secs: u64,
    /// Delay between re-dial attempts while reconnecting
    pub reconnect_interval_ms: u64,
    pub dial_timeout_ms: u64,
    /// A command exceeding this is treated as a transport failure
    pub command_timeout_ms: u64,
}

impl DedupConfig {
    pub(crate) fn from_env() -> Self {
        Self {
            address: std::env::var("REDIS_ADDRESS")
                .unwrap_or_else(|_| DEFAULT_REDIS_ADDRESS.to_string()),
            prefix: std::env::var("DEDUP_PREFIX")
                .unwrap_or_else(|_| DEFAULT_DEDUP_PREFIX.to_string()),
            ttl_secs: std::env::var("DEDUP_TTL_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_DEDUP_TTL_SECS),
            reconnect_interval_ms: std::env::var("DEDUP_RECONNECT_INTERVAL_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|ms| *ms > 0)
                .unwrap_or(DEFAULT_RECONNECT_INTERVAL_MS),
            dial_timeout_ms: std::env::var("DEDUP_DIAL_TIMEOUT_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_DIAL_TIMEOUT_MS),
            command_timeout_ms: std::env::var("DEDUP_COMMAND_TIMEOUT_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_COMMAND_TIMEOUT_MS),
        }
    }

    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    pub fn reconnect_interval(&self) -> Duration {
        Duration::from_millis(self.reconnect_interval_ms)
    }

    pub fn dial_timeout(&self) -> Duration {
        Duration::from_millis(self.dial_timeout_ms)
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_millis(self.command_timeout_ms)
    }
}
