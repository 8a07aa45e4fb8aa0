use crawler_types::DeliveryTag;
use thiserror::Error;

/// Errors returned by [`super::BrokerConnection`]
///
/// Confirm failures are values, never panics: the caller decides whether the
/// job behind a failed publish is retried or dropped.
#[derive(Error, Debug)]
pub enum BrokerError {
    /// Connect, channel open or confirm.select failed; no connection was created
    #[error("failed to connect to broker at {uri}: {source}")]
    Connection {
        uri: String,
        #[source]
        source: lapin::Error,
    },

    #[error("broker transport failure: {0}")]
    Transport(#[source] lapin::Error),

    /// The broker refused an operation (channel or connection exception)
    #[error("broker refused operation: {0}")]
    Protocol(String),

    #[error("broker rejected publish {tag}")]
    Nacked { tag: DeliveryTag },

    #[error("no confirm for publish {tag} within the confirm timeout")]
    ConfirmTimeout { tag: DeliveryTag },

    /// The confirm can no longer arrive (channel closed or connection lost)
    #[error("confirm for publish {tag} was dropped")]
    ConfirmDropped { tag: DeliveryTag },

    #[error("broker connection is closed")]
    Closed,
}

impl BrokerError {
    /// Get error code for logs and metrics labels
    pub fn error_code(&self) -> &'static str {
        match self {
            BrokerError::Connection { .. } => "CONNECTION_ERROR",
            BrokerError::Transport(_) => "TRANSPORT_ERROR",
            BrokerError::Protocol(_) => "PROTOCOL_ERROR",
            BrokerError::Nacked { .. } => "PUBLISH_NACKED",
            BrokerError::ConfirmTimeout { .. } => "CONFIRM_TIMEOUT",
            BrokerError::ConfirmDropped { .. } => "CONFIRM_DROPPED",
            BrokerError::Closed => "CLOSED",
        }
    }

    /// Whether republishing later may succeed
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            BrokerError::Transport(_)
                | BrokerError::Nacked { .. }
                | BrokerError::ConfirmTimeout { .. }
                | BrokerError::ConfirmDropped { .. }
        )
    }

    /// Sort a lapin failure into broker refusal vs transport failure
    pub(crate) fn from_lapin(err: lapin::Error) -> Self {
        match err {
            lapin::Error::ProtocolError(amqp) => BrokerError::Protocol(amqp.to_string()),
            other => BrokerError::Transport(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_confirm_failures_are_transient() {
        let tag = DeliveryTag::new(7);

        assert!(BrokerError::Nacked { tag }.is_transient());
        assert!(BrokerError::ConfirmTimeout { tag }.is_transient());
        assert!(BrokerError::ConfirmDropped { tag }.is_transient());
        assert!(!BrokerError::Closed.is_transient());
        assert!(!BrokerError::Protocol("PRECONDITION_FAILED".into()).is_transient());
    }

    #[test]
    fn test_error_codes() {
        let tag = DeliveryTag::new(1);

        assert_eq!(BrokerError::Nacked { tag }.error_code(), "PUBLISH_NACKED");
        assert_eq!(BrokerError::ConfirmTimeout { tag }.error_code(), "CONFIRM_TIMEOUT");
        assert_eq!(BrokerError::Closed.error_code(), "CLOSED");
    }

    #[test]
    fn test_message_names_tag() {
        let err = BrokerError::Nacked { tag: DeliveryTag::new(42) };
        assert_eq!(err.to_string(), "broker rejected publish 42");
    }

    #[test]
    fn test_io_failure_is_transport() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset");
        let err = BrokerError::from_lapin(lapin::Error::IOError(std::sync::Arc::new(io)));
        assert!(matches!(err, BrokerError::Transport(_)));
    }
}
