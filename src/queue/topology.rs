use lapin::ExchangeKind;

/// Binding key that matches every routing key on a topic exchange
pub const CATCH_ALL_BINDING: &str = "#";

/// Map a configured exchange kind to lapin's; unknown names become custom
/// kinds (plugin exchange types such as `x-consistent-hash`).
pub fn parse_exchange_kind(kind: &str) -> ExchangeKind {
    match kind.trim().to_ascii_lowercase().as_str() {
        "direct" => ExchangeKind::Direct,
        "fanout" => ExchangeKind::Fanout,
        "topic" => ExchangeKind::Topic,
        "headers" => ExchangeKind::Headers,
        _ => ExchangeKind::Custom(kind.trim().to_string()),
    }
}

/// Exchange, queue and the catch-all binding between them
#[derive(Debug, Clone)]
pub struct Topology {
    pub exchange: String,
    pub kind: ExchangeKind,
    pub queue: String,
}

impl Topology {
    pub fn new(exchange: impl Into<String>, kind: &str, queue: impl Into<String>) -> Self {
        Self {
            exchange: exchange.into(),
            kind: parse_exchange_kind(kind),
            queue: queue.into(),
        }
    }

    pub fn from_config(config: &crawler_config::BrokerConfig) -> Self {
        Self::new(&config.exchange, &config.exchange_kind, &config.queue)
    }
}
