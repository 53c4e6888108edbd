//! Tracing initialization with configurable logging formats.

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::{LogFormat, LogLevel, LoggingConfig};

/// Initialize the global tracing subscriber.
///
/// `RUST_LOG` takes precedence over the configured level and filter.
/// Fails if a global subscriber is already installed.
pub fn init_tracing(config: &LoggingConfig) -> Result<(), TracingError> {
    let filter = build_env_filter(config);
    let registry = tracing_subscriber::registry().with(filter);

    let result = match (&config.format, config.timestamps) {
        (LogFormat::Pretty, true) => registry.with(pretty_layer(config)).try_init(),
        (LogFormat::Pretty, false) => registry
            .with(pretty_layer(config).without_time())
            .try_init(),
        (LogFormat::Compact, true) => registry.with(compact_layer(config)).try_init(),
        (LogFormat::Compact, false) => registry
            .with(compact_layer(config).without_time())
            .try_init(),
        (LogFormat::Json, true) => registry.with(json_layer(config)).try_init(),
        (LogFormat::Json, false) => registry
            .with(json_layer(config).without_time())
            .try_init(),
    };

    result.map_err(|e| TracingError::Init(e.to_string()))
}

fn pretty_layer<S>(
    config: &LoggingConfig,
) -> tracing_subscriber::fmt::Layer<
    S,
    tracing_subscriber::fmt::format::Pretty,
    tracing_subscriber::fmt::format::Format<tracing_subscriber::fmt::format::Pretty>,
> {
    tracing_subscriber::fmt::layer()
        .pretty()
        .with_target(true)
        .with_thread_ids(false)
        .with_file(config.file_line)
        .with_line_number(config.file_line)
}

fn compact_layer<S>(
    config: &LoggingConfig,
) -> tracing_subscriber::fmt::Layer<
    S,
    tracing_subscriber::fmt::format::DefaultFields,
    tracing_subscriber::fmt::format::Format<tracing_subscriber::fmt::format::Compact>,
> {
    tracing_subscriber::fmt::layer()
        .compact()
        .with_target(true)
        .with_file(config.file_line)
        .with_line_number(config.file_line)
}

fn json_layer<S>(
    config: &LoggingConfig,
) -> tracing_subscriber::fmt::Layer<
    S,
    tracing_subscriber::fmt::format::JsonFields,
    tracing_subscriber::fmt::format::Format<tracing_subscriber::fmt::format::Json>,
> {
    tracing_subscriber::fmt::layer()
        .json()
        .with_target(true)
        .with_current_span(true)
        .with_span_list(false)
        .with_file(config.file_line)
        .with_line_number(config.file_line)
}

/// Build the environment filter from config.
fn build_env_filter(config: &LoggingConfig) -> EnvFilter {
    let base_level = level_directive(&config.level);

    if let Ok(env_filter) = std::env::var("RUST_LOG") {
        EnvFilter::try_new(env_filter).unwrap_or_else(|_| EnvFilter::new(base_level))
    } else if let Some(filter) = &config.filter {
        let combined = format!("{},{}", base_level, filter);
        EnvFilter::try_new(combined).unwrap_or_else(|_| EnvFilter::new(base_level))
    } else {
        // Quiet the HTTP stack by default
        EnvFilter::new(format!(
            "{},hyper=warn,hyper_util=warn,h2=warn,reqwest=warn,rustls=warn",
            base_level
        ))
    }
}

fn level_directive(level: &LogLevel) -> &'static str {
    match level {
        LogLevel::Trace => "trace",
        LogLevel::Debug => "debug",
        LogLevel::Info => "info",
        LogLevel::Warn => "warn",
        LogLevel::Error => "error",
    }
}

/// Tracing initialization errors.
#[derive(Debug, thiserror::Error)]
pub enum TracingError {
    #[error("Failed to initialize tracing: {0}")]
    Init(String),
}
