// ============================================================================
// Crawler Types - Shared Vocabulary
// ============================================================================
//
// Types shared by the broker connection and the dedup store client.
// NO I/O and no dependencies on the other crawler crates.
//
// Contents:
// - Connection lifecycle states
// - Publisher-confirm delivery tags
// - Credential masking for connection strings in logs
//
// ============================================================================

pub mod connection;
pub mod delivery;
pub mod redact;

pub use connection::ConnectionState;
pub use delivery::DeliveryTag;
pub use redact::mask_url;
