//! TTL-keyed existence set with self-healing connection

use crate::error::{DedupError, is_transport_failure, timed_out};
use crate::options::StoreOptions;
use crate::supervisor::Supervisor;
use crate::Result;
use crawler_types::{ConnectionState, mask_url};
use redis::aio::MultiplexedConnection;
use redis::{RedisResult, cmd};
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{Mutex, Notify, RwLock};
use tracing::{debug, info, warn};

/// Single connection slot shared by callers and the supervisor
pub(crate) enum Slot {
    Connected {
        conn: MultiplexedConnection,
        generation: u64,
    },
    Reconnecting,
    Closed,
}

impl Slot {
    pub(crate) fn state(&self) -> ConnectionState {
        match self {
            Slot::Connected { .. } => ConnectionState::Connected,
            Slot::Reconnecting => ConnectionState::Reconnecting,
            Slot::Closed => ConnectionState::Closed,
        }
    }
}

/// State shared between [`DedupStore`] and its supervisor task
pub(crate) struct Shared {
    pub(crate) client: redis::Client,
    pub(crate) address: String,
    pub(crate) options: StoreOptions,
    /// Callers hold a read guard for the duration of a command; the
    /// supervisor takes the write guard only to swap connections.
    pub(crate) slot: RwLock<Slot>,
    /// Wakes the supervisor after Connected -> Reconnecting
    pub(crate) wake: Notify,
    generation: AtomicU64,
    reconnects: AtomicU64,
}

impl Shared {
    /// Dial a fresh multiplexed connection, bounded by the dial timeout
    pub(crate) async fn dial(&self) -> RedisResult<MultiplexedConnection> {
        match tokio::time::timeout(
            self.options.dial_timeout,
            self.client.get_multiplexed_async_connection(),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(timed_out("dial timed out")),
        }
    }

    /// Put a freshly dialed connection in place of a Reconnecting slot.
    ///
    /// Returns false if the store was closed in the meantime.
    pub(crate) async fn install(&self, conn: MultiplexedConnection) -> bool {
        let mut slot = self.slot.write().await;
        if !slot.state().can_transition_to(ConnectionState::Connected) {
            return false;
        }

        let generation = self.generation.fetch_add(1, Ordering::SeqCst).saturating_add(1);
        *slot = Slot::Connected { conn, generation };
        self.reconnects.fetch_add(1, Ordering::Relaxed);
        true
    }

    /// Record that the connection of `generation` is dead.
    ///
    /// Only the first report per connection flips the slot to Reconnecting
    /// and wakes the supervisor; reports about an older connection that has
    /// already been replaced are ignored.
    async fn connection_lost(
        &self,
        generation: u64,
        operation: &'static str,
        error: &redis::RedisError,
    ) {
        let mut slot = self.slot.write().await;
        let current = match &*slot {
            Slot::Connected { generation: current, .. } => *current,
            _ => return,
        };
        if current != generation {
            return;
        }

        // Dropping the old handle closes our side of the dead socket
        *slot = Slot::Reconnecting;
        drop(slot);

        warn!(
            operation = operation,
            address = %self.address,
            error = %error,
            "Dedup store connection lost, reconnecting in background"
        );
        self.wake.notify_one();
    }
}

/// Client for the "already seen" store
///
/// Keys are namespaced as `{prefix}:{key}` and stored with a TTL. Presence
/// means "seen within the last TTL"; absence means never seen or forgotten.
pub struct DedupStore {
    prefix: String,
    shared: Arc<Shared>,
    supervisor: Mutex<Option<Supervisor>>,
}

impl DedupStore {
    /// Connect to the store and start the reconnect supervisor.
    ///
    /// `address` is either `host:port` or a `redis://` / `rediss://` URL.
    /// Exactly one dial is attempted; if it fails no client is returned.
    pub async fn open(
        prefix: impl Into<String>,
        address: &str,
        options: StoreOptions,
    ) -> Result<Self> {
        let prefix = prefix.into();
        let url = connection_url(address);
        let safe_address = mask_url(&url);

        let client = redis::Client::open(url.as_str()).map_err(|source| DedupError::Connection {
            address: safe_address.clone(),
            source,
        })?;

        let shared = Arc::new(Shared {
            client,
            address: safe_address.clone(),
            options,
            slot: RwLock::new(Slot::Reconnecting),
            wake: Notify::new(),
            generation: AtomicU64::new(0),
            reconnects: AtomicU64::new(0),
        });

        debug!(address = %safe_address, "Opening dedup store connection...");
        let conn = shared.dial().await.map_err(|source| DedupError::Connection {
            address: safe_address.clone(),
            source,
        })?;
        *shared.slot.write().await = Slot::Connected { conn, generation: 0 };

        let supervisor = Supervisor::spawn(shared.clone());

        info!(address = %safe_address, prefix = %prefix, "Connected to dedup store");

        Ok(Self {
            prefix,
            shared,
            supervisor: Mutex::new(Some(supervisor)),
        })
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Full key as stored: `{prefix}:{key}`
    pub fn namespaced_key(&self, key: &str) -> String {
        format!("{}:{}", self.prefix, key)
    }

    pub async fn state(&self) -> ConnectionState {
        self.shared.slot.read().await.state()
    }

    /// Number of completed supervised reconnects since open
    pub fn reconnect_count(&self) -> u64 {
        self.shared.reconnects.load(Ordering::Relaxed)
    }

    /// Insert the key with the configured TTL if it is absent.
    ///
    /// Returns `true` on a fresh insert and `false` if the key was already
    /// present; the existing TTL is left untouched.
    pub async fn add(&self, key: &str) -> Result<bool> {
        let key = self.namespaced_key(key);
        let ttl = self.shared.options.ttl_secs();

        let reply: Option<String> = self
            .execute("add", move |mut conn| async move {
                cmd("SET")
                    .arg(&key)
                    .arg(1)
                    .arg("NX")
                    .arg("EX")
                    .arg(ttl)
                    .query_async(&mut conn)
                    .await
            })
            .await?;

        match reply.as_deref() {
            Some("OK") => Ok(true),
            None => Ok(false),
            Some(other) => Err(DedupError::Protocol(format!("SET NX replied {:?}", other))),
        }
    }

    /// Whether the key is currently stored and unexpired
    pub async fn exists(&self, key: &str) -> Result<bool> {
        let key = self.namespaced_key(key);

        let count: i64 = self
            .execute("exists", move |mut conn| async move {
                cmd("EXISTS").arg(&key).query_async(&mut conn).await
            })
            .await?;

        Ok(count > 0)
    }

    /// Remaining lifetime in seconds.
    ///
    /// Negative values are results, not errors: `-2` means the key is
    /// absent and `-1` that it has no expiry.
    pub async fn ttl(&self, key: &str) -> Result<i64> {
        let key = self.namespaced_key(key);

        self.execute("ttl", move |mut conn| async move {
            cmd("TTL").arg(&key).query_async(&mut conn).await
        })
        .await
    }

    /// Liveness probe; a healthy store replies [`crate::PING_REPLY`]
    pub async fn ping(&self) -> Result<String> {
        self.execute("ping", |mut conn| async move { cmd("PING").query_async(&mut conn).await })
            .await
    }

    /// Delete every key in this store's namespace.
    ///
    /// Uses KEYS, so it is meant for tests and maintenance only.
    pub async fn purge(&self) -> Result<usize> {
        let pattern = format!("{}:*", self.prefix);

        let keys: Vec<String> = self
            .execute("purge_scan", move |mut conn| async move {
                cmd("KEYS").arg(&pattern).query_async(&mut conn).await
            })
            .await?;

        if keys.is_empty() {
            return Ok(0);
        }

        let deleted: usize = self
            .execute("purge_delete", move |mut conn| async move {
                cmd("DEL").arg(&keys).query_async(&mut conn).await
            })
            .await?;

        info!(prefix = %self.prefix, deleted, "Purged dedup namespace");
        Ok(deleted)
    }

    /// Stop the supervisor and release the connection.
    ///
    /// Waits for the supervisor task to finish before returning. Calling it
    /// again is a no-op; any other call after close returns
    /// [`DedupError::Closed`].
    pub async fn close(&self) -> Result<()> {
        let Some(supervisor) = self.supervisor.lock().await.take() else {
            return Ok(());
        };

        let stopped = supervisor.stop().await;
        *self.shared.slot.write().await = Slot::Closed;
        info!(address = %self.shared.address, "Dedup store closed");

        stopped.map_err(DedupError::from)
    }

    /// Run one command against the live connection.
    ///
    /// Never waits for a reconnect: if the slot is not Connected the call
    /// fails immediately. The slot lock is released before the command is
    /// sent, so close and connection_lost never queue behind a slow reply.
    async fn execute<T, F, Fut>(&self, operation: &'static str, command: F) -> Result<T>
    where
        F: FnOnce(MultiplexedConnection) -> Fut,
        Fut: Future<Output = RedisResult<T>>,
    {
        let (conn, generation) = match &*self.shared.slot.read().await {
            Slot::Connected { conn, generation } => (conn.clone(), *generation),
            Slot::Reconnecting => return Err(DedupError::Reconnecting),
            Slot::Closed => return Err(DedupError::Closed),
        };

        let command_timeout = self.shared.options.command_timeout;
        let outcome = tokio::time::timeout(command_timeout, command(conn)).await;

        let err = match outcome {
            Ok(Ok(value)) => return Ok(value),
            Ok(Err(err)) => err,
            Err(_) => timed_out("command timed out"),
        };

        if is_transport_failure(&err) {
            self.shared.connection_lost(generation, operation, &err).await;
        } else {
            debug!(operation = operation, error = %err, "Dedup store returned an error reply");
        }
        Err(DedupError::from_command(err))
    }
}

impl Drop for DedupStore {
    fn drop(&mut self) {
        if let Some(supervisor) = self.supervisor.get_mut().take() {
            supervisor.abort();
        }
    }
}

/// Accept "host:port" as well as full redis URLs
pub(crate) fn connection_url(address: &str) -> String {
    if address.contains("://") {
        address.to_string()
    } else {
        format!("redis://{}", address)
    }
}
