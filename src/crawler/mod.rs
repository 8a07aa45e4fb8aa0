// ============================================================================
// Crawling
// ============================================================================
//
// - fetch.rs - HTTP client for page bodies
// - extract.rs - same-host link extraction from HTML
//
// ============================================================================

pub mod extract;
pub mod fetch;

pub use extract::extract_urls;
pub use fetch::{FetchError, FetchedPage, Fetcher};
