use std::path::{Path, PathBuf};

use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::{AppSettings, LogLevel, default_log_file_path};
use crate::error::{HonyakuError, Result};

const DEFAULT_LOG_FILE_NAME: &str = "app.log";

/// Install console and daily-rolling file logging.
///
/// `verbose` forces debug output regardless of the configured level.
/// Keep the returned guard alive until exit so buffered lines reach the file.
pub fn setup_logging(verbose: bool, settings: &AppSettings) -> Result<WorkerGuard> {
    let (log_dir, file_name) = log_location(&settings.log_file_path)?;
    std::fs::create_dir_all(&log_dir)?;

    let file_appender = rolling::daily(&log_dir, &file_name);
    let (non_blocking_file, guard) = non_blocking(file_appender);

    let level = effective_level(verbose, settings.log_level);

    let console_layer = fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr);

    let file_layer = fmt::layer()
        .with_writer(non_blocking_file)
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .with_ansi(false);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| HonyakuError::Config(format!("Failed to initialize logging: {}", e)))?;

    info!(
        "Logging initialized - level: {}, file: {}",
        level,
        log_dir.join(&file_name).display()
    );

    Ok(guard)
}

fn effective_level(verbose: bool, configured: LogLevel) -> &'static str {
    if verbose {
        LogLevel::Debug.as_filter()
    } else {
        configured.as_filter()
    }
}

/// Split the configured log file into its directory and file name.
fn log_location(log_file_path: &str) -> Result<(PathBuf, String)> {
    let path = if log_file_path.trim().is_empty() {
        default_log_file_path()?
    } else {
        PathBuf::from(log_file_path.trim())
    };

    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_else(|| DEFAULT_LOG_FILE_NAME.to_string());
    let dir = path
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));

    Ok((dir, file_name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_location_splits_path() {
        let (dir, name) = log_location("/var/log/honyaku/app.log").unwrap();
        assert_eq!(dir, PathBuf::from("/var/log/honyaku"));
        assert_eq!(name, "app.log");

        let (dir, name) = log_location("honyaku.log").unwrap();
        assert_eq!(dir, PathBuf::from("."));
        assert_eq!(name, "honyaku.log");
    }

    #[test]
    fn test_verbose_overrides_level() {
        assert_eq!(effective_level(true, LogLevel::Error), "debug");
        assert_eq!(effective_level(false, LogLevel::Warning), "warn");
        assert_eq!(effective_level(false, LogLevel::None), "off");
    }
}
