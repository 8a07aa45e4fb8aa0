use crate::crawler::Fetcher;
use crate::queue::BrokerConnection;
use crawler_config::Config;
use crawler_redis::DedupStore;
use std::sync::Arc;

/// Shared state for crawl job processing
pub struct WorkerState {
    pub config: Arc<Config>,
    pub store: Arc<DedupStore>,
    pub broker: Arc<BrokerConnection>,
    pub fetcher: Fetcher,
}

impl WorkerState {
    pub fn new(
        config: Arc<Config>,
        store: Arc<DedupStore>,
        broker: Arc<BrokerConnection>,
        fetcher: Fetcher,
    ) -> Self {
        Self {
            config,
            store,
            broker,
            fetcher,
        }
    }

    /// Host the crawl is confined to
    pub fn host(&self) -> &str {
        self.config.crawl.host()
    }
}
