//! Logging and metrics setup shared by the crates of the supply API.
pub mod config;
pub mod metrics;
pub mod tracing;

pub use config::Config;
