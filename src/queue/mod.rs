// ============================================================================
// Broker Connection
// ============================================================================
//
// AMQP 0-9-1 connection with publisher confirms.
//
// - connection.rs - BrokerConnection: connect, declare, publish, consume, close
// - confirms.rs - pending-confirm table keyed by delivery tag
// - topology.rs - exchange kinds and the exchange/queue/binding descriptor
// - error.rs - BrokerError
//
// Every publish waits for its own confirm. Confirms for concurrent publishes
// may arrive in any order; each one is routed to the call that published it.
//
// ============================================================================

pub mod confirms;
pub mod connection;
pub mod error;
pub mod topology;

pub use confirms::{ConfirmOutcome, ConfirmWaiter, PendingConfirms, Registration};
pub use connection::{BrokerConnection, QueueInfo, publish_properties};
pub use error::BrokerError;
pub use topology::{CATCH_ALL_BINDING, Topology, parse_exchange_kind};
