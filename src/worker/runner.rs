// ============================================================================
// Consume Loop
// ============================================================================
//
// Pulls deliveries from the job queue and processes up to
// `crawl.concurrency` of them at once. Each delivery is settled by its own
// outcome:
//
// - Crawled / Skipped -> ack
// - InvalidJob, 4xx fetch, protocol errors -> reject, no requeue
// - everything else -> nack with requeue
//
// On shutdown the loop stops taking deliveries and waits for in-flight jobs.
// Unacked deliveries still on the channel go back to the queue when the
// broker connection closes.
//
// ============================================================================

use crate::error::{Disposition, ProcessError};
use crate::metrics;
use crate::worker::processor::{JOB_CONTENT_TYPE, ProcessResult, process_delivery};
use crate::worker::state::WorkerState;
use anyhow::{Context, Result};
use futures_util::stream::StreamExt;
use lapin::message::Delivery;
use lapin::options::{BasicAckOptions, BasicNackOptions, BasicRejectOptions};
use std::sync::Arc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Publish the root URL as the first job unless it was crawled recently
pub async fn seed_root(state: &WorkerState) -> Result<bool> {
    let root = state.config.crawl.root_url.as_str();
    if state.store.exists(root).await.context("Failed to check root URL")? {
        debug!(url = %root, "Root URL already crawled, not seeding");
        return Ok(false);
    }

    let broker = &state.config.broker;
    state
        .broker
        .publish(&broker.exchange, &broker.routing_key, JOB_CONTENT_TYPE, root.as_bytes())
        .await
        .context("Failed to publish root URL")?;

    info!(url = %root, "Seeded crawl with root URL");
    Ok(true)
}

pub async fn run(state: Arc<WorkerState>, shutdown: CancellationToken) -> Result<()> {
    let queue = state.config.broker.queue.clone();
    let concurrency = state.config.crawl.concurrency;

    state
        .broker
        .set_prefetch(state.config.broker.prefetch)
        .await
        .context("Failed to set prefetch")?;
    let mut deliveries = state
        .broker
        .consume(&queue)
        .await
        .context("Failed to start consuming")?;

    info!(queue = %queue, concurrency, "Worker started");

    let mut in_flight = JoinSet::new();
    let mut outcome = Ok(());

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                info!("Shutdown requested, no longer taking deliveries");
                break;
            }
            next = deliveries.next(), if in_flight.len() < concurrency => match next {
                Some(Ok(delivery)) => {
                    in_flight.spawn(handle_delivery(state.clone(), delivery));
                }
                Some(Err(e)) => {
                    error!(error = %e, queue = %queue, "Consumer failed");
                    outcome = Err(e).context("Consumer failed");
                    break;
                }
                None => {
                    warn!(queue = %queue, "Consumer stream ended");
                    break;
                }
            },
            Some(joined) = in_flight.join_next(), if !in_flight.is_empty() => {
                if let Err(e) = joined {
                    error!(error = %e, "Job task failed");
                }
            }
        }
    }

    if !in_flight.is_empty() {
        info!(jobs = in_flight.len(), "Waiting for in-flight jobs");
    }
    while let Some(joined) = in_flight.join_next().await {
        if let Err(e) = joined {
            error!(error = %e, "Job task failed");
        }
    }

    info!("Worker stopped");
    outcome
}

async fn handle_delivery(state: Arc<WorkerState>, delivery: Delivery) {
    let job = String::from_utf8_lossy(&delivery.data).trim().to_string();

    let disposition = match process_delivery(&state, &delivery.data).await {
        Ok(ProcessResult::Crawled { published }) => {
            metrics::JOBS.with_label_values(&["crawled"]).inc();
            info!(url = %job, published, "Crawled");
            Disposition::Ack
        }
        Ok(ProcessResult::Skipped) => {
            metrics::JOBS.with_label_values(&["skipped"]).inc();
            Disposition::Ack
        }
        Err(e) => {
            record_failure(&e);
            let disposition = e.disposition();
            error!(
                url = %job,
                error = %e,
                code = e.error_code(),
                disposition = ?disposition,
                "Failed to process crawl job"
            );
            disposition
        }
    };

    settle(&delivery, disposition).await;
}

fn record_failure(err: &ProcessError) {
    if let ProcessError::Dedup(e) = err {
        metrics::DEDUP_ERRORS.with_label_values(&[e.error_code()]).inc();
    }
    let result = match err.disposition() {
        Disposition::Drop => "dropped",
        _ => "requeued",
    };
    metrics::JOBS.with_label_values(&[result]).inc();
}

async fn settle(delivery: &Delivery, disposition: Disposition) {
    let settled = match disposition {
        Disposition::Ack => delivery.acker.ack(BasicAckOptions::default()).await,
        Disposition::Requeue => {
            delivery
                .acker
                .nack(BasicNackOptions {
                    multiple: false,
                    requeue: true,
                })
                .await
        }
        Disposition::Drop => {
            delivery
                .acker
                .reject(BasicRejectOptions { requeue: false })
                .await
        }
    };

    if let Err(e) = settled {
        error!(
            error = %e,
            delivery_tag = delivery.delivery_tag,
            disposition = ?disposition,
            "Failed to settle delivery"
        );
    }
}
