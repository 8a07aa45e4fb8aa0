//! # Crawler Redis
//!
//! Client for the crawler's "already seen" store: a TTL-keyed existence set
//! kept in Redis.
//!
//! ## Design Principles
//!
//! - **No business logic** - knows about namespaced keys and TTLs, not URLs
//! - **No dependencies** on the broker side of the worker
//! - **Fail fast** - a call never waits for a reconnect; it returns
//!   [`DedupError::Reconnecting`] instead
//!
//! ## Reconnection
//!
//! The first call that hits a transport failure (reset, EOF, broken pipe,
//! timeout) returns that error and hands the connection over to a background
//! supervisor. The supervisor re-dials at a fixed interval until it succeeds;
//! meanwhile every call fails immediately. Once re-dialed, calls succeed
//! again with no other signal. The supervisor is started by
//! [`DedupStore::open`] and stopped by [`DedupStore::close`].
//!
//! ## Example
//!
//! ```rust,no_run
//! use crawler_redis::{DedupStore, StoreOptions};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = DedupStore::open("crawler", "127.0.0.1:6379", StoreOptions::default()).await?;
//!
//!     if store.add("https://www.example.org/").await? {
//!         // first time this page was seen
//!     }
//!     assert!(store.exists("https://www.example.org/").await?);
//!
//!     store.close().await?;
//!     Ok(())
//! }
//! ```

mod error;
mod options;
mod store;
mod supervisor;

pub use error::DedupError;
pub use options::StoreOptions;
pub use store::DedupStore;

pub use crawler_types::ConnectionState;
pub use redis::RedisError;

/// Result type for dedup store operations
pub type Result<T> = std::result::Result<T, DedupError>;

/// Reply to PING from a healthy store
pub const PING_REPLY: &str = "PONG";
