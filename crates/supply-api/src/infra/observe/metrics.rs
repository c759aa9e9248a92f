/// Metrics for the supply API.
#[derive(Debug, Clone, prometheus_metric_storage::MetricStorage)]
pub struct Metrics {
    /// Results of supply computations against the chain.
    #[metric(labels("result"))]
    pub supply_computations: prometheus::IntCounterVec,
    /// Results of price fetches against the price API.
    #[metric(labels("result"))]
    pub price_fetches: prometheus::IntCounterVec,
    /// Latest computed supply figures in whole tokens.
    #[metric(labels("kind"))]
    pub supply: prometheus::GaugeVec,
    /// Requests rejected by the API key gate.
    pub unauthorized_requests: prometheus::IntCounter,
    /// Requests rejected by the per-client rate limit.
    pub rate_limited_requests: prometheus::IntCounter,
}

/// Setup the metrics registry.
pub fn init() {
    observe::metrics::setup_registry("supply_api");
}

/// Get the metrics instance.
pub fn get() -> &'static Metrics {
    Metrics::instance(observe::metrics::get_storage_registry())
        .expect("unexpected error getting metrics instance")
}
