use std::fs::OpenOptions;
use std::path::Path;

use tracing::warn;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;

use crate::owner_alerts::OwnerAlertLayer;

pub const LOG_FILE: &str = "vcbot.log";

/// Install the global subscriber: stderr, a plain-text file under `log_dir`
/// when given, and optionally owner alerts.
///
/// Stdout is left alone so `vcbot env` output can be `eval`ed. Keep the
/// returned guard alive for the life of the process or file logs are lost.
pub fn init(log_dir: Option<&Path>, alerts: Option<OwnerAlertLayer>) -> Option<WorkerGuard> {
    let file = log_dir.map(|dir| {
        std::fs::create_dir_all(dir)
            .and_then(|()| OpenOptions::new().create(true).append(true).open(dir.join(LOG_FILE)))
            .map_err(|e| (dir.join(LOG_FILE), e))
    });

    let (file_layer, guard, file_error) = match file {
        None => (None, None, None),
        Some(Ok(file)) => {
            let (non_blocking, guard) = tracing_appender::non_blocking(file);
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_filter(default_filter());
            (Some(layer), Some(guard), None)
        }
        Some(Err(e)) => (None, None, Some(e)),
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_filter(default_filter()),
        )
        .with(file_layer)
        .with(alerts)
        .init();

    if let Some((path, e)) = file_error {
        warn!("File logging disabled, cannot open {}: {e}", path.display());
    }
    guard
}

fn default_filter() -> EnvFilter {
    EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into())
}
