//! Tunables for the dedup store client

use std::time::Duration;

/// Timing configuration for [`crate::DedupStore`]
#[derive(Clone, Debug)]
pub struct StoreOptions {
    /// Lifetime of a "seen" marker
    pub ttl: Duration,
    /// Delay between failed re-dial attempts
    pub reconnect_interval: Duration,
    /// Bound on a single dial, initial or supervised
    pub dial_timeout: Duration,
    /// Bound on a single command; exceeding it counts as a transport failure
    pub command_timeout: Duration,
}

impl StoreOptions {
    /// TTL in whole seconds as sent with SET ... EX (never zero)
    pub(crate) fn ttl_secs(&self) -> u64 {
        self.ttl.as_secs().max(1)
    }
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(12 * 60 * 60),
            reconnect_interval: Duration::from_millis(100),
            dial_timeout: Duration::from_secs(2),
            command_timeout: Duration::from_secs(2),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ttl_secs_never_zero() {
        let options = StoreOptions {
            ttl: Duration::from_millis(300),
            ..StoreOptions::default()
        };
        assert_eq!(options.ttl_secs(), 1);
        assert_eq!(StoreOptions::default().ttl_secs(), 43_200);
    }
}
