//! Logging setup for front ends embedding a session.
//!
//! Console output is filtered by an environment variable (default level
//! `info`). With a log directory, structured JSON records also go to an
//! hourly rolling file.

use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling;
use tracing_subscriber::{fmt, prelude::*, registry::Registry, EnvFilter};

/// Environment variable read when no other is given.
pub const DEFAULT_LOG_ENV: &str = "SEQUIN_LOG";

/// File name prefix for rolling log files.
pub const LOG_FILE_PREFIX: &str = "sequin.log";

fn env_filter(env_var: &str) -> EnvFilter {
    EnvFilter::try_from_env(env_var)
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Install the global subscriber.
///
/// Keep the returned guard alive for as long as file logging should flush;
/// it is `None` without a log directory.
///
/// # Example
/// ```ignore
/// let _guard = init_logging(Some(Path::new("./logs")), DEFAULT_LOG_ENV)?;
/// ```
pub fn init_logging(log_dir: Option<&Path>, env_var: &str) -> anyhow::Result<Option<WorkerGuard>> {
    let console_layer = fmt::layer().with_writer(std::io::stderr).with_target(false);
    let registry = Registry::default()
        .with(env_filter(env_var))
        .with(console_layer);

    match log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)?;
            let (writer, guard) = tracing_appender::non_blocking(rolling::hourly(dir, LOG_FILE_PREFIX));
            registry
                .with(
                    fmt::layer()
                        .json()
                        .with_writer(writer)
                        .with_target(true)
                        .with_thread_ids(true),
                )
                .try_init()?;
            tracing::debug!(dir = %dir.display(), "file logging enabled");
            Ok(Some(guard))
        }
        None => {
            registry.try_init()?;
            Ok(None)
        }
    }
}
