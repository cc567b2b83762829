//! Tracing initialization
//!
//! Rolling file output always; a colored stdout layer is added in text mode.
//! JSON mode writes structured lines to the file only.

use crate::config::AppConfig;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::RollingFileAppender;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

fn rolling_file(config: &AppConfig) -> RollingFileAppender {
    match config.rotation.as_str() {
        "hourly" => tracing_appender::rolling::hourly(&config.log_dir, &config.log_file),
        "daily" => tracing_appender::rolling::daily(&config.log_dir, &config.log_file),
        _ => tracing_appender::rolling::never(&config.log_dir, &config.log_file),
    }
}

/// RUST_LOG overrides the configured level; with tracing disabled the
/// crate's own spans are filtered out entirely.
fn build_filter(config: &AppConfig) -> EnvFilter {
    let fallback = if config.enable_tracing {
        config.log_level.clone()
    } else {
        format!("{},payflow=off", config.log_level)
    };
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback))
}

pub fn init_logging(config: &AppConfig) -> WorkerGuard {
    let (file_writer, guard) = tracing_appender::non_blocking(rolling_file(config));
    let registry = tracing_subscriber::registry().with(build_filter(config));

    if config.use_json {
        let json_file = fmt::layer()
            .json()
            .with_target(true)
            .with_writer(file_writer)
            .with_ansi(false);
        registry.with(json_file).init();
    } else {
        let text_file = fmt::layer()
            .with_target(false)
            .with_writer(file_writer)
            .with_ansi(false);
        let stdout = fmt::layer().with_target(false).with_ansi(true);
        registry.with(text_file).with(stdout).init();
    }

    guard
}
