use {
    crate::Config,
    std::{io::IsTerminal, panic::PanicHookInfo},
    time::macros::format_description,
    tracing::Level,
    tracing_subscriber::{
        EnvFilter,
        Layer,
        Registry,
        fmt::{MakeWriter, time::UtcTime, writer::MakeWriterExt as _},
        prelude::*,
        util::SubscriberInitExt,
    },
};

/// Installs the global tracing subscriber described by `config` and a panic
/// hook that reports panics as error events. Must be called at most once per
/// process.
pub fn initialize(config: &Config) {
    let stderr_threshold = config.stderr_threshold.unwrap_or(Level::ERROR);
    let timer = || {
        UtcTime::new(format_description!(
            "[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond digits:3]Z"
        ))
    };
    let layer: Box<dyn Layer<Registry> + Send + Sync> = match config.json {
        true => tracing_subscriber::fmt::layer()
            .json()
            .with_writer(split_writer(stderr_threshold))
            .with_timer(timer())
            .boxed(),
        false => tracing_subscriber::fmt::layer()
            .with_writer(split_writer(stderr_threshold))
            .with_timer(timer())
            .with_ansi(std::io::stdout().is_terminal())
            .boxed(),
    };

    tracing_subscriber::registry()
        .with(layer.with_filter(EnvFilter::new(&config.env_filter)))
        .init();
    std::panic::set_hook(Box::new(log_panic));
    tracing::info!(filter = %config.env_filter, json = config.json, "initialized tracing");
}

/// Routes events at `stderr_threshold` or above to stderr and the rest to
/// stdout.
fn split_writer(stderr_threshold: Level) -> impl for<'w> MakeWriter<'w> + Send + Sync + 'static {
    std::io::stderr
        .with_max_level(stderr_threshold)
        .or_else(std::io::stdout)
}

fn log_panic(panic: &PanicHookInfo) {
    let thread = std::thread::current();
    let name = thread.name().unwrap_or("<unnamed>");
    let backtrace = std::backtrace::Backtrace::force_capture();
    tracing::error!(thread = name, "{panic}\nstack backtrace:\n{backtrace}");
}
