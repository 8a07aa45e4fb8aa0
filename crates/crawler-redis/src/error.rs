//! Dedup store error taxonomy

use redis::RedisError;
use thiserror::Error;

/// Errors returned by [`crate::DedupStore`]
///
/// `Transport` and `Reconnecting` are transient: the supervisor is already
/// working on them and a later call may succeed. The others are not.
#[derive(Error, Debug)]
pub enum DedupError {
    /// Initial dial failed; no client was created
    #[error("failed to connect to dedup store at {address}: {source}")]
    Connection {
        address: String,
        #[source]
        source: RedisError,
    },

    /// The established connection broke during this call
    #[error("dedup store transport failure: {0}")]
    Transport(#[source] RedisError),

    /// The connection is being re-dialed; the call was not attempted
    #[error("dedup store is reconnecting")]
    Reconnecting,

    /// The store answered with an error or an unexpected reply
    #[error("unexpected reply from dedup store: {0}")]
    Protocol(String),

    #[error("dedup store client is closed")]
    Closed,

    #[error("dedup store supervisor failed: {0}")]
    Supervisor(#[from] tokio::task::JoinError),
}

impl DedupError {
    /// Get error code for logs and metrics labels
    pub fn error_code(&self) -> &'static str {
        match self {
            DedupError::Connection { .. } => "CONNECTION_ERROR",
            DedupError::Transport(_) => "TRANSPORT_ERROR",
            DedupError::Reconnecting => "RECONNECTING",
            DedupError::Protocol(_) => "PROTOCOL_ERROR",
            DedupError::Closed => "CLOSED",
            DedupError::Supervisor(_) => "SUPERVISOR_ERROR",
        }
    }

    /// Whether retrying the same call later may succeed
    pub fn is_transient(&self) -> bool {
        matches!(self, DedupError::Transport(_) | DedupError::Reconnecting)
    }

    /// Sort a failed command into transport vs protocol failure
    pub(crate) fn from_command(err: RedisError) -> Self {
        if is_transport_failure(&err) {
            DedupError::Transport(err)
        } else {
            DedupError::Protocol(err.to_string())
        }
    }
}

/// Failures of the socket itself, as opposed to error replies
pub(crate) fn is_transport_failure(err: &RedisError) -> bool {
    err.is_io_error()
        || err.is_connection_dropped()
        || err.is_connection_refusal()
        || err.is_timeout()
}

pub(crate) fn timed_out(what: &'static str) -> RedisError {
    RedisError::from(std::io::Error::new(std::io::ErrorKind::TimedOut, what))
}
