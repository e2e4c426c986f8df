//! Structured Logger
//!
//! Wraps `tracing` with a console layer and an optional daily-rolling NDJSON
//! file, filtered by `RUST_LOG` or the configured level.

use std::path::Path;

use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub const LOG_FILE_PREFIX: &str = "switchboard.log";

/// Initialize the global logger. Returns `false` if one was already set.
///
/// `level` accepts any `EnvFilter` directive; `RUST_LOG` takes precedence.
pub fn init_logger(level: &str, log_dir: Option<&Path>) -> bool {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    // Writes `switchboard.log.YYYY-MM-DD` under `log_dir`.
    let file_layer = log_dir.map(|dir| {
        let appender = RollingFileAppender::new(Rotation::DAILY, dir, LOG_FILE_PREFIX);
        fmt::layer().json().with_writer(appender).with_ansi(false)
    });

    let console_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_ansi(true);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .is_ok()
}
