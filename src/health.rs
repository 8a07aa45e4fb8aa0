use crate::queue::BrokerConnection;
use anyhow::{Result, bail};
use crawler_redis::{DedupStore, PING_REPLY};
use crawler_types::ConnectionState;

pub async fn health_check(store: &DedupStore, broker: &BrokerConnection) -> Result<()> {
    let ping = store.ping().await.map_err(anyhow::Error::from);
    evaluate(ping, broker.state())
}

/// Healthy when the store answers PONG and the broker connection is open
pub fn evaluate(ping: Result<String>, broker: ConnectionState) -> Result<()> {
    let reply = ping?;
    if reply != PING_REPLY {
        bail!("dedup store replied {:?} to PING", reply);
    }
    if broker != ConnectionState::Connected {
        bail!("broker connection is {}", broker);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_healthy() {
        assert!(evaluate(Ok("PONG".into()), ConnectionState::Connected).is_ok());
    }

    #[test]
    fn test_unexpected_ping_reply() {
        let err = evaluate(Ok("LOADING".into()), ConnectionState::Connected).unwrap_err();
        assert!(err.to_string().contains("LOADING"));
    }

    #[test]
    fn test_store_down() {
        let ping = Err(crawler_redis::DedupError::Reconnecting.into());
        assert!(evaluate(ping, ConnectionState::Connected).is_err());
    }

    #[test]
    fn test_broker_down() {
        for state in [ConnectionState::Disconnected, ConnectionState::Closed] {
            let err = evaluate(Ok("PONG".into()), state).unwrap_err();
            assert!(err.to_string().contains(state.as_str()));
        }
    }
}
