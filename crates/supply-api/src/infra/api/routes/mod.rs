mod health;
mod price;
mod supply;

pub(super) use {health::health, price::prices, supply::supply};

/// Browser cache policy of successful data responses.
const CACHE_CONTROL: (axum::http::HeaderName, &str) =
    (axum::http::header::CACHE_CONTROL, "public, max-age=60");

/// Timestamp format of `updated_at` fields.
fn updated_at(computed_at: chrono::DateTime<chrono::Utc>) -> String {
    computed_at.to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}
