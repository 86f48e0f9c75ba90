//! Tracing setup: console output plus a daily-rolling JSON log file.
//!
//! `RUST_LOG` controls the filter (default `info`). Keep the returned guard alive
//! for the life of the process or buffered file lines are lost.

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::Config;
use crate::error::{ApiError, ApiResult};

pub const LOG_FILE_PREFIX: &str = "garden.log";

pub fn init(config: &Config) -> ApiResult<WorkerGuard> {
    let file_appender = tracing_appender::rolling::daily(&config.log_dir, LOG_FILE_PREFIX);
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).compact().with_writer(std::io::stderr))
        .with(fmt::layer().json().with_writer(file_writer))
        .try_init()
        .map_err(|e| ApiError::Config(format!("logging already initialised: {e}")))?;

    Ok(guard)
}
