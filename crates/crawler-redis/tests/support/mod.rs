//! In-process stand-ins for a Redis server and the network between us and it

#![allow(dead_code)]

pub mod proxy;
pub mod resp;

use crawler_redis::StoreOptions;
use std::time::Duration;

pub use proxy::TcpProxy;
pub use resp::FakeRedis;

/// Options with short timings so outage tests finish quickly
pub fn fast_options() -> StoreOptions {
    StoreOptions {
        ttl: Duration::from_secs(60),
        reconnect_interval: Duration::from_millis(100),
        dial_timeout: Duration::from_millis(500),
        command_timeout: Duration::from_millis(500),
    }
}
