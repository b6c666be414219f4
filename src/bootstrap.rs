use picker_logging::{LoggingGuard, init_logging};
use picker_protocol::AppResult;
use picker_settings::JsonPreferencesStore;
use std::path::{Path, PathBuf};

/// Process-wide state that has to outlive the command being run.
pub struct Runtime {
    pub store: JsonPreferencesStore,
    _logging: Option<LoggingGuard>,
}

pub(crate) fn log_warn_fallback(message: &str) {
    if tracing::dispatcher::has_been_set() {
        tracing::warn!(event = "bootstrap_warning", message = message);
        return;
    }

    eprintln!("{message}");
}

/// `--config` wins over `SLICER_PICKER_CONFIG`, which wins over the home
/// directory default.
pub fn resolve_store(config_override: Option<PathBuf>) -> AppResult<JsonPreferencesStore> {
    match config_override {
        Some(path) => Ok(JsonPreferencesStore::new(path)),
        None => JsonPreferencesStore::from_environment(),
    }
}

/// Sets up logging and translations next to the preferences file. Neither is
/// required to run, so failures are reported and skipped.
pub fn init_runtime(store: JsonPreferencesStore) -> Runtime {
    let config_dir = store.config_dir();
    let logging = start_logging(&config_dir);

    if let Err(error) = picker_i18n::init_i18n_catalog(&config_dir) {
        log_warn_fallback(&format!("translation overlay skipped: {error:#}"));
    }

    tracing::info!(
        event = "runtime_ready",
        config_path = %store.path().display(),
        version = env!("CARGO_PKG_VERSION")
    );

    Runtime {
        store,
        _logging: logging,
    }
}

fn start_logging(config_dir: &Path) -> Option<LoggingGuard> {
    match init_logging(config_dir) {
        Ok(guard) => {
            tracing::debug!(
                event = "logging_ready",
                log_dir = %guard.log_dir().display(),
                level = guard.level()
            );
            Some(guard)
        }
        Err(error) => {
            log_warn_fallback(&format!("file logging disabled: {}", error.describe()));
            None
        }
    }
}
