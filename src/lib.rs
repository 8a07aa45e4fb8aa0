//! Crawler worker
//!
//! Consumes crawl jobs (one URL per message) from an AMQP queue, skips pages
//! seen within the dedup TTL, fetches the rest, and publishes every new
//! same-host link back to the exchange with publisher confirms.
//!
//! The dedup store client lives in `crawler-redis`; this crate holds the
//! broker connection, crawling, the worker loop, and the binary's HTTP
//! surface.

pub mod crawler;
pub mod error;
pub mod health;
pub mod metrics;
pub mod queue;
pub mod routes;
pub mod worker;

pub use error::{Disposition, ProcessError};
