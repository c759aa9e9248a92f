//! This module implements the observability for the supply API. It exposes
//! functions which represent events that are meaningful to the system. These
//! functions are called when the corresponding events occur. They log the event
//! and update the metrics, if the event is worth measuring.

use {
    crate::domain::{PriceRecord, SupplyRecord, supply},
    alloy::primitives::Address,
    number::units,
    std::{
        net::{IpAddr, SocketAddr},
        time::Duration,
    },
};

mod metrics;

/// Setup the observability.
pub fn init(config: &::observe::Config) {
    ::observe::tracing::initialize(config);
    metrics::init();
}

/// Observe that the API is listening.
pub fn serving(addr: SocketAddr) {
    tracing::info!(%addr, "serving supply API");
}

/// Observe that the API key gate lets every request through.
pub fn auth_disabled() {
    tracing::warn!("no API key configured, price endpoints are not protected");
}

/// Observe that the API key gate is bypassed for local development.
pub fn auth_bypassed() {
    tracing::info!("development environment, API key gate bypassed");
}

/// Observe a request rejected by the API key gate.
pub fn unauthorized(path: &str) {
    tracing::debug!(path, "rejected request without valid API key");
    metrics::get().unauthorized_requests.inc();
}

/// Observe that requests are not rate limited.
pub fn rate_limit_disabled() {
    tracing::warn!("rate limit set to zero, clients are not limited");
}

/// Observe a request rejected because its client exceeded the rate limit.
pub fn rate_limited(client: IpAddr, retry_after: Duration) {
    tracing::debug!(%client, ?retry_after, "rate limited request");
    metrics::get().rate_limited_requests.inc();
}

/// Observe that supply data is about to be read from the chain.
pub fn computing_supply(token: Address) {
    tracing::debug!(%token, "fetching fresh supply data from the chain");
}

/// Observe freshly computed supply figures.
pub fn computed_supply(record: &SupplyRecord) {
    tracing::info!(
        total = %units::to_plain_string(&record.total_supply),
        circulating = %units::to_plain_string(&record.circulating_supply),
        decimals = record.decimals,
        "updated supply data"
    );
    let metrics = metrics::get();
    metrics
        .supply_computations
        .with_label_values(&["success"])
        .inc();
    metrics
        .supply
        .with_label_values(&["total"])
        .set(units::to_f64_lossy(&record.total_supply));
    metrics
        .supply
        .with_label_values(&["circulating"])
        .set(units::to_f64_lossy(&record.circulating_supply));
}

/// Observe that computing the supply failed.
pub fn computing_supply_failed(err: &supply::Error) {
    tracing::warn!(?err, "failed to compute supply");
    metrics::get()
        .supply_computations
        .with_label_values(&["failure"])
        .inc();
}

/// Observe freshly fetched prices.
pub fn fetched_prices(record: &PriceRecord) {
    tracing::debug!(quoted = record.prices.len(), "updated price data");
    metrics::get()
        .price_fetches
        .with_label_values(&["success"])
        .inc();
}

/// Observe that fetching prices failed.
pub fn fetching_prices_failed(err: &crate::infra::prices::Error) {
    tracing::warn!(?err, "failed to fetch prices");
    metrics::get()
        .price_fetches
        .with_label_values(&["failure"])
        .inc();
}

/// Observe that a request could not be served because upstream data is
/// unavailable and nothing is cached.
pub fn upstream_unavailable(endpoint: &str, err: &freshness_cache::Error) {
    tracing::error!(endpoint, ?err, "failed to serve request");
}
