use std::fs::OpenOptions;
use std::sync::Mutex;

use camino::Utf8Path;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;

use crate::error::PublishError;

pub const DEFAULT_CONSOLE_LOG: &str = "debug";

/// Console output goes to stderr and honours `RUST_LOG`; the optional log
/// file receives `info` and above without ANSI colours.
pub fn init(logfile: Option<&Utf8Path>) -> Result<(), PublishError> {
    let console_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_CONSOLE_LOG));
    let console = fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_filter(console_filter);

    let file_layer = match logfile {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_str().is_empty()) {
                std::fs::create_dir_all(parent.as_std_path())
                    .map_err(|err| PublishError::Logging(format!("{parent}: {err}")))?;
            }
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path.as_std_path())
                .map_err(|err| PublishError::Logging(format!("{path}: {err}")))?;
            Some(
                fmt::layer()
                    .with_ansi(false)
                    .with_target(false)
                    .with_writer(Mutex::new(file))
                    .with_filter(LevelFilter::INFO),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(console)
        .with(file_layer)
        .try_init()
        .map_err(|err| PublishError::Logging(err.to_string()))
}
