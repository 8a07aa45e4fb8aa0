// ============================================================================
// Reconnect Supervisor
// ============================================================================
//
// Background task owned by a DedupStore. Sleeps until a caller reports a
// dead connection, then re-dials at a fixed interval until a dial succeeds
// and swaps the new connection in. Dialing happens without holding the slot
// lock, so callers keep failing fast with Reconnecting instead of queueing
// behind the dial.
//
// Lifecycle: spawned by DedupStore::open, cancelled and joined by
// DedupStore::close (aborted if the store is dropped without close).
//
// ============================================================================

use crate::store::Shared;
use crawler_types::ConnectionState;
use std::sync::Arc;
use tokio::task::{JoinError, JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

pub(crate) struct Supervisor {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl Supervisor {
    pub(crate) fn spawn(shared: Arc<Shared>) -> Self {
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(run(shared, cancel.clone()));
        Self { cancel, handle }
    }

    /// Cancel the task and wait until it has exited
    pub(crate) async fn stop(self) -> Result<(), JoinError> {
        self.cancel.cancel();
        self.handle.await
    }

    pub(crate) fn abort(self) {
        self.cancel.cancel();
        self.handle.abort();
    }
}

async fn run(shared: Arc<Shared>, cancel: CancellationToken) {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = shared.wake.notified() => {}
        }

        if shared.slot.read().await.state() != ConnectionState::Reconnecting {
            continue;
        }

        if !reconnect(&shared, &cancel).await {
            break;
        }
    }

    debug!(address = %shared.address, "Dedup store supervisor stopped");
}

/// Re-dial until a connection is installed. Returns false when cancelled.
async fn reconnect(shared: &Shared, cancel: &CancellationToken) -> bool {
    let mut attempt: u32 = 0;

    loop {
        attempt = attempt.saturating_add(1);

        let dialed = tokio::select! {
            _ = cancel.cancelled() => return false,
            dialed = shared.dial() => dialed,
        };

        match dialed {
            Ok(conn) => {
                if shared.install(conn).await {
                    info!(
                        address = %shared.address,
                        attempts = attempt,
                        "Reconnected to dedup store"
                    );
                }
                return true;
            }
            Err(e) => {
                debug!(
                    address = %shared.address,
                    attempt = attempt,
                    error = %e,
                    "Dedup store re-dial failed"
                );
            }
        }

        tokio::select! {
            _ = cancel.cancelled() => return false,
            _ = tokio::time::sleep(shared.options.reconnect_interval) => {}
        }
    }
}
