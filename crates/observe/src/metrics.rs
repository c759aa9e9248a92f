//! Process-wide Prometheus registry shared by every crate of the service.

use {
    axum::{
        http::{StatusCode, header},
        response::{IntoResponse, Response},
    },
    prometheus::Encoder,
    prometheus_metric_storage::StorageRegistry,
    std::sync::OnceLock,
};

static REGISTRY: OnceLock<StorageRegistry> = OnceLock::new();

/// Configures the global registry so every metric name starts with
/// `prefix`. Only the first call has an effect, and only if no metric has been
/// registered yet.
pub fn setup_registry(prefix: &str) {
    let registry = match prometheus::Registry::new_custom(Some(prefix.to_owned()), None) {
        Ok(registry) => registry,
        Err(err) => {
            tracing::error!(?err, prefix, "invalid metrics prefix");
            return;
        }
    };
    if REGISTRY.set(StorageRegistry::new(registry)).is_err() {
        tracing::debug!(prefix, "metrics registry was already set up");
    }
}

/// The global metric storage registry. Falls back to an unprefixed registry
/// when [`setup_registry`] was never called, which is the case in unit tests.
pub fn get_storage_registry() -> &'static StorageRegistry {
    REGISTRY.get_or_init(StorageRegistry::default)
}

pub fn get_registry() -> &'static prometheus::Registry {
    get_storage_registry().registry()
}

/// Encodes all registered metrics in the Prometheus text exposition format.
pub fn encode(registry: &prometheus::Registry) -> Result<String, prometheus::Error> {
    let mut buffer = Vec::new();
    prometheus::TextEncoder::new().encode(&registry.gather(), &mut buffer)?;
    String::from_utf8(buffer).map_err(|err| prometheus::Error::Msg(err.to_string()))
}

/// `/metrics` route exposing the global registry to monitoring systems.
pub fn handle_metrics<S>() -> axum::Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    async fn metrics_handler() -> Response {
        match encode(get_registry()) {
            Ok(body) => ([(header::CONTENT_TYPE, prometheus::TEXT_FORMAT)], body).into_response(),
            Err(err) => {
                tracing::error!(?err, "failed to encode metrics");
                StatusCode::INTERNAL_SERVER_ERROR.into_response()
            }
        }
    }

    axum::Router::new().route("/metrics", axum::routing::get(metrics_handler))
}
