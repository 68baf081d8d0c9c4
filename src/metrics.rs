use prometheus::{Counter, Gauge, Histogram, HistogramOpts, Opts, Registry, TextEncoder};
use tracing::error;

lazy_static::lazy_static! {
    // Ingestion metrics
    pub static ref POLL_CYCLES: Counter = Counter::with_opts(
        Opts::new("chatvault_poll_cycles_total", "Total number of feed poll cycles")
    ).unwrap();

    pub static ref POLL_FAILURES: Counter = Counter::with_opts(
        Opts::new("chatvault_poll_failures_total", "Total number of poll cycles that failed")
    ).unwrap();

    pub static ref RECORDS_APPENDED: Counter = Counter::with_opts(
        Opts::new("chatvault_records_appended_total", "Total number of chat records appended to the store")
    ).unwrap();

    // Query metrics
    pub static ref QUERIES: Counter = Counter::with_opts(
        Opts::new("chatvault_queries_total", "Total number of time-range queries served")
    ).unwrap();

    pub static ref QUERY_FAILURES: Counter = Counter::with_opts(
        Opts::new("chatvault_query_failures_total", "Total number of queries that failed")
    ).unwrap();

    pub static ref EXPORTS: Counter = Counter::with_opts(
        Opts::new("chatvault_exports_total", "Total number of export artifacts delivered")
    ).unwrap();

    pub static ref QUERY_DURATION: Histogram = Histogram::with_opts(
        HistogramOpts::new("chatvault_query_duration_seconds", "Time spent scanning the store per query")
    ).unwrap();

    // Poller state
    pub static ref TRACKED_IDS: Gauge = Gauge::with_opts(
        Opts::new("chatvault_tracked_ids", "Number of record ids currently held by the dedup set")
    ).unwrap();
}

pub struct MetricsRegistry {
    registry: Registry,
}

impl MetricsRegistry {
    pub fn new() -> Self {
        let registry = Registry::new();

        registry.register(Box::new(POLL_CYCLES.clone())).unwrap();
        registry.register(Box::new(POLL_FAILURES.clone())).unwrap();
        registry
            .register(Box::new(RECORDS_APPENDED.clone()))
            .unwrap();
        registry.register(Box::new(QUERIES.clone())).unwrap();
        registry.register(Box::new(QUERY_FAILURES.clone())).unwrap();
        registry.register(Box::new(EXPORTS.clone())).unwrap();
        registry.register(Box::new(QUERY_DURATION.clone())).unwrap();
        registry.register(Box::new(TRACKED_IDS.clone())).unwrap();

        Self { registry }
    }

    pub fn gather_metrics(&self) -> String {
        let metric_families = self.registry.gather();
        let encoder = TextEncoder::new();
        encoder.encode_to_string(&metric_families).unwrap_or_else(|e| {
            error!("Failed to encode metrics: {}", e);
            String::new()
        })
    }
}

impl Default for MetricsRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[macro_export]
macro_rules! record_duration {
    ($histogram:expr, $code:block) => {{
        let _timer = $histogram.start_timer();
        $code
    }};
}
