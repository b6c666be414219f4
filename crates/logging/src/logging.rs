use anyhow::Context;
use picker_protocol::{AppError, ResultExt};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{Builder as RollingBuilder, Rotation};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

pub const LOG_LEVEL_ENV_KEY: &str = "SLICER_PICKER_LOG_LEVEL";
pub const LOG_DIR_NAME: &str = "logs";
pub const LOG_FILE_PREFIX: &str = "slicer-picker";
pub const DEFAULT_KEEP_DAYS: u64 = 7;

const LOG_FILE_SUFFIX: &str = "log";
const VALID_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Keeps the background log writer alive. Dropping it flushes pending
/// records, so hold it for the lifetime of the process.
pub struct LoggingGuard {
    log_dir: PathBuf,
    level: String,
    _worker_guard: WorkerGuard,
}

impl LoggingGuard {
    pub fn log_dir(&self) -> &Path {
        &self.log_dir
    }

    pub fn level(&self) -> &str {
        &self.level
    }
}

pub fn normalize_level(raw: &str) -> Option<&'static str> {
    let lowered = raw.trim().to_ascii_lowercase();
    VALID_LEVELS
        .iter()
        .copied()
        .find(|level| *level == lowered)
}

fn default_level() -> &'static str {
    if cfg!(debug_assertions) {
        "debug"
    } else {
        "info"
    }
}

pub fn resolve_log_level() -> String {
    std::env::var(LOG_LEVEL_ENV_KEY)
        .ok()
        .and_then(|value| normalize_level(&value))
        .unwrap_or_else(default_level)
        .to_string()
}

/// Installs the global subscriber: JSON lines into a daily rolling file under
/// `<config_dir>/logs`, plus a compact stderr layer in debug builds.
pub fn init_logging(config_dir: &Path) -> Result<LoggingGuard, AppError> {
    let log_dir = config_dir.join(LOG_DIR_NAME);
    fs::create_dir_all(&log_dir)
        .with_context(|| format!("failed to create log directory: {}", log_dir.display()))
        .with_code("log_dir_create_failed", "Failed to create log directory")
        .with_ctx("logDir", log_dir.display().to_string())?;
    cleanup_expired_logs(&log_dir, DEFAULT_KEEP_DAYS)?;

    let file_appender = RollingBuilder::new()
        .rotation(Rotation::DAILY)
        .filename_prefix(LOG_FILE_PREFIX)
        .filename_suffix(LOG_FILE_SUFFIX)
        .build(&log_dir)
        .with_context(|| format!("failed to create log writer: {}", log_dir.display()))
        .with_code("log_appender_create_failed", "Failed to create log writer")
        .with_ctx("logDir", log_dir.display().to_string())?;
    let (file_writer, worker_guard) = tracing_appender::non_blocking(file_appender);

    let level = resolve_log_level();
    if !tracing::dispatcher::has_been_set() {
        let env_filter = EnvFilter::new(level.clone());
        let file_layer = tracing_subscriber::fmt::layer()
            .json()
            .with_ansi(false)
            .with_writer(file_writer)
            .with_current_span(false)
            .with_span_list(false);

        let subscriber = tracing_subscriber::registry()
            .with(env_filter)
            .with(file_layer);
        #[cfg(debug_assertions)]
        let subscriber = subscriber.with(
            tracing_subscriber::fmt::layer()
                .compact()
                .with_ansi(true)
                .with_target(true)
                .with_writer(std::io::stderr),
        );

        subscriber
            .try_init()
            .with_context(|| format!("failed to install log subscriber: level={level}"))
            .with_code("log_subscriber_init_failed", "Failed to install log subscriber")
            .with_ctx("logLevel", level.clone())?;
    }

    tracing::debug!(
        event = "logging_initialized",
        log_dir = %log_dir.display(),
        level = %level
    );

    Ok(LoggingGuard {
        log_dir,
        level,
        _worker_guard: worker_guard,
    })
}

fn cleanup_expired_logs_with_duration(
    log_dir: &Path,
    keep_duration: Duration,
    now: SystemTime,
) -> Result<usize, AppError> {
    if !log_dir.exists() {
        return Ok(0);
    }

    let entries = fs::read_dir(log_dir)
        .with_context(|| format!("failed to read log directory: {}", log_dir.display()))
        .with_code("log_cleanup_read_dir_failed", "Failed to read log directory")
        .with_ctx("logDir", log_dir.display().to_string())?;

    let mut removed = 0usize;
    for entry in entries {
        let entry = entry
            .with_context(|| format!("failed to read log entry: {}", log_dir.display()))
            .with_code("log_cleanup_read_entry_failed", "Failed to read log entry")
            .with_ctx("logDir", log_dir.display().to_string())?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let is_own_log = path
            .file_name()
            .and_then(|value| value.to_str())
            .is_some_and(|name| name.starts_with(LOG_FILE_PREFIX));
        if !is_own_log {
            continue;
        }

        let modified_at = entry
            .metadata()
            .and_then(|metadata| metadata.modified())
            .with_context(|| format!("failed to read log modified time: {}", path.display()))
            .with_code(
                "log_cleanup_modified_time_failed",
                "Failed to read log modified time",
            )
            .with_ctx("logPath", path.display().to_string())?;

        let elapsed = now.duration_since(modified_at).unwrap_or_default();
        if elapsed <= keep_duration {
            continue;
        }

        fs::remove_file(&path)
            .with_context(|| format!("failed to remove expired log: {}", path.display()))
            .with_code("log_cleanup_remove_failed", "Failed to remove expired log")
            .with_ctx("logPath", path.display().to_string())?;
        removed += 1;
    }

    Ok(removed)
}

pub fn cleanup_expired_logs(log_dir: &Path, keep_days: u64) -> Result<(), AppError> {
    let keep_duration = Duration::from_secs(keep_days.saturating_mul(24 * 60 * 60));
    let _ = cleanup_expired_logs_with_duration(log_dir, keep_duration, SystemTime::now())?;
    Ok(())
}

#[cfg(test)]
#[path = "../tests/core/logging_tests.rs"]
mod tests;
