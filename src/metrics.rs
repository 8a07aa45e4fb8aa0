use anyhow::Result;
use once_cell::sync::Lazy;
use prometheus::{
    Encoder, Histogram, IntCounter, IntCounterVec, IntGauge, TextEncoder, opts, register_histogram,
    register_int_counter, register_int_counter_vec, register_int_gauge,
};

pub static PUBLISH_CONFIRMED: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(opts!(
        "crawler_publish_confirmed_total",
        "Publishes acked by the broker"
    ))
    .expect("Failed to register crawler_publish_confirmed_total metric")
});

pub static PUBLISH_NACKED: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(opts!(
        "crawler_publish_nacked_total",
        "Publishes nacked by the broker"
    ))
    .expect("Failed to register crawler_publish_nacked_total metric")
});

/// Publish to confirm latency
pub static PUBLISH_CONFIRM_LATENCY: Lazy<Histogram> = Lazy::new(|| {
    register_histogram!(
        "crawler_publish_confirm_latency_seconds",
        "Time from publish to broker confirm in seconds",
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0]
    )
    .expect("Failed to register crawler_publish_confirm_latency_seconds metric")
});

/// Completed dedup store reconnects, mirrored from the store on scrape
pub static DEDUP_RECONNECTS: Lazy<IntGauge> = Lazy::new(|| {
    register_int_gauge!(opts!(
        "crawler_dedup_reconnects",
        "Dedup store reconnects since start"
    ))
    .expect("Failed to register crawler_dedup_reconnects metric")
});

pub static DEDUP_ERRORS: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        opts!("crawler_dedup_errors_total", "Failed dedup store calls by error code"),
        &["kind"]
    )
    .expect("Failed to register crawler_dedup_errors_total metric")
});

pub static JOBS: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        opts!("crawler_jobs_total", "Processed crawl jobs by result"),
        &["result"]
    )
    .expect("Failed to register crawler_jobs_total metric")
});

pub fn gather_metrics() -> Result<String> {
    let mut buffer = vec![];
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    encoder.encode(&metric_families, &mut buffer)?;

    Ok(String::from_utf8(buffer)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_are_exported() {
        PUBLISH_CONFIRMED.inc();
        PUBLISH_NACKED.inc();
        PUBLISH_CONFIRM_LATENCY.observe(0.01);
        DEDUP_RECONNECTS.set(2);
        DEDUP_ERRORS.with_label_values(&["RECONNECTING"]).inc();
        JOBS.with_label_values(&["crawled"]).inc();

        let text = gather_metrics().unwrap();

        assert!(text.contains("crawler_publish_confirmed_total"));
        assert!(text.contains("crawler_publish_confirm_latency_seconds_bucket"));
        assert!(text.contains("crawler_dedup_reconnects 2"));
        assert!(text.contains("crawler_dedup_errors_total{kind=\"RECONNECTING\"}"));
        assert!(text.contains("crawler_jobs_total{result=\"crawled\"}"));
    }
}
