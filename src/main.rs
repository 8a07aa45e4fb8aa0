// ============================================================================
// Crawler Worker
// ============================================================================
//
// Flow:
// 1. Load config, init tracing
// 2. Open the dedup store (starts its reconnect supervisor)
// 3. Connect to the broker and declare exchange, queue, binding
// 4. Seed the root URL unless it was crawled within the TTL
// 5. Consume jobs until SIGINT/SIGTERM
// 6. Close the broker connection, then the dedup store
//
// ============================================================================

use anyhow::{Context, Result};
use crawler_config::Config;
use crawler_redis::{DedupStore, StoreOptions};
use crawler_types::mask_url;
use crawler_worker::crawler::Fetcher;
use crawler_worker::queue::{BrokerConnection, Topology};
use crawler_worker::routes::{self, HealthContext};
use crawler_worker::worker::{self, WorkerState};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    let config = Arc::new(Config::from_env()?);

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.rust_log.clone()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("=== Crawler Worker Starting ===");
    info!("Broker: {}", mask_url(&config.broker.uri));
    info!("Exchange: {} ({})", config.broker.exchange, config.broker.exchange_kind);
    info!("Queue: {}", config.broker.queue);
    info!("Dedup store: {}", mask_url(&config.dedup.address));
    info!("Root URL: {}", config.crawl.root_url);

    let options = StoreOptions {
        ttl: config.dedup.ttl(),
        reconnect_interval: config.dedup.reconnect_interval(),
        dial_timeout: config.dedup.dial_timeout(),
        command_timeout: config.dedup.command_timeout(),
    };
    let store = Arc::new(
        DedupStore::open(config.dedup.prefix.clone(), &config.dedup.address, options)
            .await
            .context("Failed to open dedup store")?,
    );

    let broker = Arc::new(
        BrokerConnection::connect(&config.broker.uri, config.broker.confirm_timeout())
            .await
            .context("Failed to connect to broker")?,
    );
    broker
        .declare_topology(&Topology::from_config(&config.broker))
        .await
        .context("Failed to declare broker topology")?;

    let fetcher = Fetcher::new(&config.crawl.user_agent, config.crawl.fetch_timeout())
        .context("Failed to create HTTP client")?;
    let state = Arc::new(WorkerState::new(config.clone(), store.clone(), broker.clone(), fetcher));

    let shutdown = CancellationToken::new();
    tokio::spawn(wait_for_signal(shutdown.clone()));

    let health = if config.health_port > 0 {
        let context = Arc::new(HealthContext {
            store: store.clone(),
            broker: broker.clone(),
        });
        let port = config.health_port;
        let shutdown = shutdown.clone();
        Some(tokio::spawn(async move {
            if let Err(e) = routes::serve(port, context, shutdown).await {
                error!(error = %e, "Health endpoint stopped");
            }
        }))
    } else {
        info!("Health endpoint disabled (HEALTH_PORT=0)");
        None
    };

    if let Err(e) = worker::seed_root(&state).await {
        error!(error = %e, "Failed to seed root URL");
    }

    let result = worker::run(state, shutdown.clone()).await;
    shutdown.cancel();

    info!("Closing connections...");
    if let Err(e) = broker.close().await {
        error!(error = %e, "Failed to close broker connection cleanly");
    }
    if let Err(e) = store.close().await {
        error!(error = %e, "Failed to close dedup store cleanly");
    }
    if let Some(health) = health {
        let _ = health.await;
    }

    info!("Crawler worker stopped");
    result
}

async fn wait_for_signal(shutdown: CancellationToken) {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = sigterm.recv() => {
                        info!("SIGTERM received, initiating graceful shutdown...");
                    }
                    _ = tokio::signal::ctrl_c() => {
                        info!("SIGINT received, initiating graceful shutdown...");
                    }
                }
            }
            Err(e) => {
                error!(error = %e, "Failed to register SIGTERM handler, listening for Ctrl-C only");
                tokio::signal::ctrl_c().await.ok();
                info!("SIGINT received, initiating graceful shutdown...");
            }
        }
    }
    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await.ok();
        info!("Ctrl-C received, initiating graceful shutdown...");
    }
    shutdown.cancel();
}
