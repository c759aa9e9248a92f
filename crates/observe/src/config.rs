use tracing::Level;

/// How log events are filtered, formatted and routed.
#[derive(Debug, Clone)]
pub struct Config {
    /// `EnvFilter` directives, for example `warn,supply_api=debug`.
    /// https://docs.rs/tracing-subscriber/latest/tracing_subscriber/filter/struct.EnvFilter.html
    pub env_filter: String,
    /// Events at this level or more severe are written to stderr, everything
    /// else to stdout. `ERROR` when unset.
    pub stderr_threshold: Option<Level>,
    /// Emit one JSON object per event instead of human readable lines.
    pub json: bool,
}

impl Config {
    pub fn new(env_filter: impl Into<String>, stderr_threshold: Option<Level>, json: bool) -> Self {
        Self {
            env_filter: env_filter.into(),
            stderr_threshold,
            json,
        }
    }
}
