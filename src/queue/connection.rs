// ============================================================================
// Broker Connection
// ============================================================================
//
// One AMQP connection and one channel in confirm mode.
//
// Publish path:
// 1. Take the publish lock
// 2. Register in PendingConfirms -> (registration, waiter)
// 3. basic.publish, hand (tag, confirm future) to the dispatcher
// 4. Release the lock, wait on the waiter (bounded by confirm_timeout)
//
// The lock covers only steps 2-3, so tags follow the channel's publish
// sequence while confirms are awaited concurrently. The dispatcher task
// resolves table entries in whatever order the broker confirms them.
// The registration lives until publish returns or is dropped, so an
// abandoned publish never leaves its tag in the table.
//
// ============================================================================

use super::confirms::{ConfirmOutcome, ConfirmWaiter, PendingConfirms};
use super::error::BrokerError;
use super::topology::{CATCH_ALL_BINDING, Topology};
use crate::metrics;
use crawler_types::{ConnectionState, DeliveryTag, mask_url};
use futures_util::stream::{FuturesUnordered, StreamExt};
use lapin::options::{
    BasicConsumeOptions, BasicPublishOptions, BasicQosOptions, ConfirmSelectOptions,
    ExchangeDeclareOptions, ExchangeDeleteOptions, QueueBindOptions, QueueDeclareOptions,
    QueueDeleteOptions,
};
use lapin::publisher_confirm::{Confirmation, PublisherConfirm};
use lapin::types::{FieldTable, ShortString};
use lapin::{BasicProperties, Channel, Connection, ConnectionProperties, Consumer, ExchangeKind};
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Persistent delivery mode (survives a broker restart on a durable queue)
const DELIVERY_MODE_PERSISTENT: u8 = 2;

const CLOSE_REPLY_SUCCESS: u16 = 200;

/// Properties stamped on every publish
pub fn publish_properties(content_type: &str) -> BasicProperties {
    BasicProperties::default()
        .with_delivery_mode(DELIVERY_MODE_PERSISTENT)
        .with_priority(0)
        .with_content_type(ShortString::from(content_type.to_string()))
}

/// Result of a queue declaration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueInfo {
    pub name: String,
    pub message_count: u32,
    pub consumer_count: u32,
}

struct Dispatcher {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

pub struct BrokerConnection {
    connection: Connection,
    channel: Channel,
    uri: String,
    confirm_timeout: Duration,
    pending: Arc<PendingConfirms>,
    publish_lock: Mutex<()>,
    confirms: mpsc::UnboundedSender<(DeliveryTag, PublisherConfirm)>,
    dispatcher: Mutex<Option<Dispatcher>>,
    closed: AtomicBool,
}

impl BrokerConnection {
    /// Open a connection and a confirm-mode channel.
    ///
    /// Any failure along the way returns [`BrokerError::Connection`] and
    /// leaves nothing open.
    pub async fn connect(uri: &str, confirm_timeout: Duration) -> Result<Self, BrokerError> {
        let safe_uri = mask_url(uri);
        let connection_error = |source| BrokerError::Connection {
            uri: safe_uri.clone(),
            source,
        };

        debug!(uri = %safe_uri, "Connecting to broker...");
        let connection = Connection::connect(uri, ConnectionProperties::default())
            .await
            .map_err(connection_error)?;

        let channel = match open_confirm_channel(&connection).await {
            Ok(channel) => channel,
            Err(e) => {
                let _ = connection.close(CLOSE_REPLY_SUCCESS, "setup failed").await;
                return Err(connection_error(e));
            }
        };

        let pending = Arc::new(PendingConfirms::new());
        let (confirms, rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(dispatch_confirms(rx, pending.clone(), cancel.clone()));

        info!(uri = %safe_uri, "Connected to broker (publisher confirms enabled)");

        Ok(Self {
            connection,
            channel,
            uri: safe_uri,
            confirm_timeout,
            pending,
            publish_lock: Mutex::new(()),
            confirms,
            dispatcher: Mutex::new(Some(Dispatcher { cancel, handle })),
            closed: AtomicBool::new(false),
        })
    }

    /// Connected only while both the connection and its channel are up.
    ///
    /// A broker-side channel close (e.g. a 406 on a conflicting declare)
    /// leaves the connection open but the channel unusable.
    pub fn state(&self) -> ConnectionState {
        if self.closed.load(Ordering::SeqCst) {
            ConnectionState::Closed
        } else if self.connection.status().connected() && self.channel.status().connected() {
            ConnectionState::Connected
        } else {
            ConnectionState::Disconnected
        }
    }

    /// Declare a durable exchange; repeating it with the same arguments is a no-op
    pub async fn declare_exchange(
        &self,
        name: &str,
        kind: ExchangeKind,
    ) -> Result<(), BrokerError> {
        let channel = self.live_channel()?;
        let options = ExchangeDeclareOptions {
            durable: true,
            ..ExchangeDeclareOptions::default()
        };

        channel
            .exchange_declare(name, kind.clone(), options, FieldTable::default())
            .await
            .map_err(BrokerError::from_lapin)?;

        debug!(exchange = %name, kind = ?kind, "Exchange declared");
        Ok(())
    }

    /// Declare a durable queue; repeating it with the same arguments is a no-op
    pub async fn declare_queue(&self, name: &str) -> Result<QueueInfo, BrokerError> {
        let channel = self.live_channel()?;
        let options = QueueDeclareOptions {
            durable: true,
            ..QueueDeclareOptions::default()
        };

        let queue = channel
            .queue_declare(name, options, FieldTable::default())
            .await
            .map_err(BrokerError::from_lapin)?;

        let info = QueueInfo {
            name: queue.name().as_str().to_string(),
            message_count: queue.message_count(),
            consumer_count: queue.consumer_count(),
        };
        debug!(
            queue = %info.name,
            messages = info.message_count,
            consumers = info.consumer_count,
            "Queue declared"
        );
        Ok(info)
    }

    /// Bind `queue` to `exchange` with the catch-all key
    pub async fn bind_queue(&self, queue: &str, exchange: &str) -> Result<(), BrokerError> {
        let channel = self.live_channel()?;

        channel
            .queue_bind(
                queue,
                exchange,
                CATCH_ALL_BINDING,
                QueueBindOptions::default(),
                FieldTable::default(),
            )
            .await
            .map_err(BrokerError::from_lapin)?;

        debug!(queue = %queue, exchange = %exchange, "Queue bound");
        Ok(())
    }

    /// Exchange, queue, then binding
    pub async fn declare_topology(&self, topology: &Topology) -> Result<QueueInfo, BrokerError> {
        self.declare_exchange(&topology.exchange, topology.kind.clone()).await?;
        let info = self.declare_queue(&topology.queue).await?;
        self.bind_queue(&topology.queue, &topology.exchange).await?;

        info!(
            exchange = %topology.exchange,
            queue = %topology.queue,
            pending_messages = info.message_count,
            "Broker topology ready"
        );
        Ok(info)
    }

    /// Delete a queue and its bindings; returns the number of messages dropped.
    ///
    /// Maintenance only; the worker never deletes topology.
    pub async fn delete_queue(&self, name: &str) -> Result<u32, BrokerError> {
        self.live_channel()?
            .queue_delete(name, QueueDeleteOptions::default())
            .await
            .map_err(BrokerError::from_lapin)
    }

    pub async fn delete_exchange(&self, name: &str) -> Result<(), BrokerError> {
        self.live_channel()?
            .exchange_delete(name, ExchangeDeleteOptions::default())
            .await
            .map_err(BrokerError::from_lapin)
    }

    pub async fn set_prefetch(&self, count: u16) -> Result<(), BrokerError> {
        self.live_channel()?
            .basic_qos(count, BasicQosOptions::default())
            .await
            .map_err(BrokerError::from_lapin)
    }

    /// Start consuming `queue` with manual acknowledgement
    pub async fn consume(&self, queue: &str) -> Result<Consumer, BrokerError> {
        let channel = self.live_channel()?;
        let consumer_tag = format!("crawler-worker-{}", uuid::Uuid::new_v4());
        let options = BasicConsumeOptions {
            no_local: true,
            no_ack: false,
            exclusive: false,
            nowait: false,
        };

        let consumer = channel
            .basic_consume(queue, &consumer_tag, options, FieldTable::default())
            .await
            .map_err(BrokerError::from_lapin)?;

        info!(queue = %queue, consumer_tag = %consumer_tag, "Consuming");
        Ok(consumer)
    }

    /// Publish one persistent message and wait for its confirm.
    ///
    /// # Returns
    /// * `Ok(tag)` - the broker acked this publish
    /// * `Err(Nacked)` - the broker rejected it; the message was not stored
    /// * `Err(ConfirmTimeout)` - no confirm within the confirm timeout
    pub async fn publish(
        &self,
        exchange: &str,
        routing_key: &str,
        content_type: &str,
        body: &[u8],
    ) -> Result<DeliveryTag, BrokerError> {
        let started = Instant::now();

        let sequence = self.publish_lock.lock().await;
        let channel = self.live_channel()?;
        let (registration, waiter) = self.pending.register_guarded();
        let tag = registration.tag();

        let confirm = channel
            .basic_publish(
                exchange,
                routing_key,
                BasicPublishOptions::default(),
                body,
                publish_properties(content_type),
            )
            .await
            .map_err(BrokerError::from_lapin)?;

        if self.confirms.send((tag, confirm)).is_err() {
            return Err(BrokerError::Closed);
        }
        drop(sequence);

        let confirmed = wait_for_confirm(waiter, self.confirm_timeout, started).await;
        if confirmed.is_ok() {
            debug!(
                tag = %tag,
                exchange = %exchange,
                routing_key = %routing_key,
                "Publish confirmed"
            );
        }
        confirmed
    }

    /// Close channel then connection.
    ///
    /// Idempotent. Outstanding publishes resolve with `ConfirmDropped`. A
    /// channel close failure is returned after the connection close has
    /// still been attempted.
    pub async fn close(&self) -> Result<(), BrokerError> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        if let Some(dispatcher) = self.dispatcher.lock().await.take() {
            dispatcher.cancel.cancel();
            let _ = dispatcher.handle.await;
        }
        let dropped = self.pending.fail_all();
        if dropped > 0 {
            warn!(dropped, "Closing broker connection with unconfirmed publishes");
        }

        let channel_result = self
            .channel
            .close(CLOSE_REPLY_SUCCESS, "closing")
            .await
            .map_err(BrokerError::from_lapin);
        let connection_result = self
            .connection
            .close(CLOSE_REPLY_SUCCESS, "closing")
            .await
            .map_err(BrokerError::from_lapin);

        info!(uri = %self.uri, "Broker connection closed");
        channel_result.and(connection_result)
    }

    fn live_channel(&self) -> Result<&Channel, BrokerError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(BrokerError::Closed);
        }
        Ok(&self.channel)
    }
}

async fn open_confirm_channel(connection: &Connection) -> Result<Channel, lapin::Error> {
    let channel = connection.create_channel().await?;
    channel.confirm_select(ConfirmSelectOptions::default()).await?;
    Ok(channel)
}

/// Wait for the outcome of one registered publish, bounded by `confirm_timeout`
async fn wait_for_confirm(
    waiter: ConfirmWaiter,
    confirm_timeout: Duration,
    started: Instant,
) -> Result<DeliveryTag, BrokerError> {
    let tag = waiter.tag();
    let Ok(outcome) = tokio::time::timeout(confirm_timeout, waiter).await else {
        warn!(
            tag = %tag,
            timeout_ms = confirm_timeout.as_millis() as u64,
            "Publish confirm timed out"
        );
        return Err(BrokerError::ConfirmTimeout { tag });
    };

    metrics::PUBLISH_CONFIRM_LATENCY.observe(started.elapsed().as_secs_f64());
    match outcome {
        ConfirmOutcome::Ack => {
            metrics::PUBLISH_CONFIRMED.inc();
            Ok(tag)
        }
        ConfirmOutcome::Nack => {
            metrics::PUBLISH_NACKED.inc();
            warn!(tag = %tag, "Publish nacked by broker");
            Err(BrokerError::Nacked { tag })
        }
        ConfirmOutcome::Dropped => Err(BrokerError::ConfirmDropped { tag }),
    }
}

/// Route per-publish confirms into the pending table as they arrive.
///
/// Generic over the confirm future so the routing can be driven without a
/// broker; in production `F` is lapin's `PublisherConfirm`.
pub(crate) async fn dispatch_confirms<F>(
    mut rx: mpsc::UnboundedReceiver<(DeliveryTag, F)>,
    pending: Arc<PendingConfirms>,
    cancel: CancellationToken,
) where
    F: Future<Output = lapin::Result<Confirmation>>,
{
    let mut in_flight = FuturesUnordered::new();

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            received = rx.recv() => match received {
                Some((tag, confirm)) => in_flight.push(async move { (tag, confirm.await) }),
                None => break,
            },
            Some((tag, confirmation)) = in_flight.next(), if !in_flight.is_empty() => {
                let outcome = match confirmation {
                    Ok(Confirmation::Ack(_)) => ConfirmOutcome::Ack,
                    Ok(Confirmation::Nack(_)) => ConfirmOutcome::Nack,
                    Ok(Confirmation::NotRequested) => {
                        warn!(tag = %tag, "Channel is not in confirm mode");
                        ConfirmOutcome::Dropped
                    }
                    Err(e) => {
                        debug!(tag = %tag, error = %e, "Confirm lost");
                        ConfirmOutcome::Dropped
                    }
                };

                if pending.resolve(tag, false, outcome) == 0 {
                    debug!(tag = %tag, "Confirm arrived after publish gave up waiting");
                }
            }
        }
    }

    debug!(in_flight = in_flight.len(), "Confirm dispatcher stopped");
}
