use picker_protocol::models::Preferences;
use picker_protocol::{AppError, AppResult};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

pub const CONFIG_DIR_NAME: &str = ".slicer-picker";
pub const CONFIG_FILE_NAME: &str = "config.json";
pub const CONFIG_PATH_ENV_KEY: &str = "SLICER_PICKER_CONFIG";

const CONFIG_FILE_LOCK_SUFFIX: &str = "lock";
const CONFIG_FILE_LOCK_TIMEOUT_MS: u64 = 2_000;
const CONFIG_FILE_LOCK_RETRY_MS: u64 = 25;
const CONFIG_FILE_LOCK_STALE_SECS: u64 = 300;

/// Persistence seam for the preferences document.
pub trait PreferencesStore {
    fn load(&self) -> AppResult<Preferences>;
    fn save(&self, preferences: &Preferences) -> AppResult<()>;
}

/// Preferences kept as a pretty-printed JSON file.
///
/// Reads and writes hold an exclusive lock file next to the document, and
/// writes replace the document atomically through a temporary file. An
/// absent document loads as the default value; a document that fails to
/// parse is backed up and replaced by the default.
#[derive(Debug, Clone)]
pub struct JsonPreferencesStore {
    path: PathBuf,
}

impl JsonPreferencesStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `SLICER_PICKER_CONFIG` when set, else `~/.slicer-picker/config.json`.
    pub fn from_environment() -> AppResult<Self> {
        if let Some(value) = env::var_os(CONFIG_PATH_ENV_KEY)
            && !value.is_empty()
        {
            return Ok(Self::new(PathBuf::from(value)));
        }
        Ok(Self::new(default_config_path()?))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Directory holding the document, its lock, backups, logs and locale
    /// overlays.
    pub fn config_dir(&self) -> PathBuf {
        self.path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."))
    }
}

impl PreferencesStore for JsonPreferencesStore {
    fn load(&self) -> AppResult<Preferences> {
        let _lock = acquire_config_file_lock(&self.path)?;
        let mut preferences = read_preferences_file(&self.path)?;

        if preferences.assign_missing_custom_ids() {
            tracing::info!(
                event = "preferences_custom_ids_assigned",
                path = %self.path.display()
            );
            if let Err(error) = write_preferences_file(&self.path, &preferences) {
                tracing::warn!(
                    event = "preferences_custom_ids_persist_failed",
                    code = %error.code,
                    detail = %error.describe()
                );
            }
        }

        Ok(preferences)
    }

    fn save(&self, preferences: &Preferences) -> AppResult<()> {
        let _lock = acquire_config_file_lock(&self.path)?;
        write_preferences_file(&self.path, preferences)?;
        tracing::debug!(event = "preferences_saved", path = %self.path.display());
        Ok(())
    }
}

pub fn home_dir() -> Option<PathBuf> {
    if cfg!(target_os = "windows") {
        if let Some(value) = env::var_os("USERPROFILE")
            && !value.is_empty()
        {
            return Some(PathBuf::from(value));
        }

        let drive = env::var_os("HOMEDRIVE");
        let path = env::var_os("HOMEPATH");
        if let (Some(drive), Some(path)) = (drive, path) {
            let mut combined = PathBuf::from(drive);
            combined.push(path);
            if !combined.as_os_str().is_empty() {
                return Some(combined);
            }
        }
        return None;
    }

    env::var_os("HOME")
        .filter(|value| !value.is_empty())
        .map(PathBuf::from)
}

pub fn default_config_path() -> AppResult<PathBuf> {
    let home = home_dir().ok_or_else(|| {
        AppError::new(
            "preferences_home_dir_unavailable",
            "Cannot locate the user home directory",
        )
    })?;
    Ok(home.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
}

struct ConfigFileLock {
    path: PathBuf,
    _file: fs::File,
}

impl Drop for ConfigFileLock {
    fn drop(&mut self) {
        if let Err(error) = fs::remove_file(&self.path)
            && error.kind() != std::io::ErrorKind::NotFound
        {
            tracing::warn!(
                event = "preferences_lock_release_failed",
                detail = %error,
                lock_path = %self.path.display()
            );
        }
    }
}

fn config_file_lock_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|value| value.to_os_string())
        .unwrap_or_else(|| CONFIG_FILE_NAME.into());
    name.push(".");
    name.push(CONFIG_FILE_LOCK_SUFFIX);
    path.with_file_name(name)
}

fn cleanup_stale_config_file_lock(lock_path: &Path) {
    let Ok(metadata) = fs::metadata(lock_path) else {
        return;
    };
    let Ok(modified) = metadata.modified() else {
        return;
    };
    let age = SystemTime::now()
        .duration_since(modified)
        .unwrap_or(Duration::from_secs(0));
    if age < Duration::from_secs(CONFIG_FILE_LOCK_STALE_SECS) {
        return;
    }

    match fs::remove_file(lock_path) {
        Ok(_) => {
            tracing::warn!(
                event = "preferences_stale_lock_removed",
                lock_path = %lock_path.display(),
                stale_secs = age.as_secs()
            );
        }
        Err(error) if error.kind() == std::io::ErrorKind::NotFound => {}
        Err(error) => {
            tracing::warn!(
                event = "preferences_stale_lock_cleanup_failed",
                detail = %error,
                lock_path = %lock_path.display()
            );
        }
    }
}

fn ensure_parent_dir(path: &Path) -> AppResult<()> {
    let parent = path.parent().ok_or_else(|| {
        AppError::new("preferences_path_invalid", "Preferences path has no parent")
            .with_context("path", path.display().to_string())
    })?;
    fs::create_dir_all(parent).map_err(|error| {
        AppError::new(
            "preferences_dir_create_failed",
            "Failed to create preferences directory",
        )
        .with_source(error)
        .with_context("path", parent.display().to_string())
    })
}

fn acquire_config_file_lock(path: &Path) -> AppResult<ConfigFileLock> {
    ensure_parent_dir(path)?;

    let lock_path = config_file_lock_path(path);
    let started_at = Instant::now();
    loop {
        match fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&lock_path)
        {
            Ok(file) => {
                return Ok(ConfigFileLock {
                    path: lock_path,
                    _file: file,
                });
            }
            Err(error) if error.kind() == std::io::ErrorKind::AlreadyExists => {
                cleanup_stale_config_file_lock(&lock_path);
                if started_at.elapsed() >= Duration::from_millis(CONFIG_FILE_LOCK_TIMEOUT_MS) {
                    return Err(AppError::new(
                        "preferences_lock_timeout",
                        "Timed out waiting for the preferences lock",
                    )
                    .with_context("path", lock_path.display().to_string()));
                }
                thread::sleep(Duration::from_millis(CONFIG_FILE_LOCK_RETRY_MS));
            }
            Err(error) => {
                return Err(AppError::new(
                    "preferences_lock_failed",
                    "Failed to acquire the preferences lock",
                )
                .with_source(error)
                .with_context("path", lock_path.display().to_string()));
            }
        }
    }
}

fn read_preferences_file(path: &Path) -> AppResult<Preferences> {
    let content = match fs::read_to_string(path) {
        Ok(value) => value,
        Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
            return Ok(Preferences::default());
        }
        Err(error) => {
            return Err(
                AppError::new("preferences_read_failed", "Failed to read preferences")
                    .with_source(error)
                    .with_context("path", path.display().to_string()),
            );
        }
    };

    match serde_json::from_str::<Preferences>(&content) {
        Ok(value) => Ok(value),
        Err(error) => {
            let backup = backup_corrupted_preferences_file(path, &content);
            tracing::warn!(
                event = "preferences_parse_failed",
                detail = %error,
                path = %path.display(),
                backup_path = backup
                    .as_ref()
                    .map(|value| value.display().to_string())
                    .unwrap_or_default()
            );
            Ok(Preferences::default())
        }
    }
}

fn backup_corrupted_preferences_file(path: &Path, content: &str) -> Option<PathBuf> {
    let suffix = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|duration| duration.as_secs())
        .unwrap_or(0);
    let file_name = path
        .file_name()
        .map(|value| value.to_string_lossy().to_string())
        .unwrap_or_else(|| CONFIG_FILE_NAME.to_string());
    let backup_path = path.with_file_name(format!("{file_name}.bak.{suffix}"));

    match fs::write(&backup_path, content) {
        Ok(_) => Some(backup_path),
        Err(error) => {
            tracing::warn!(
                event = "preferences_backup_failed",
                detail = %error,
                path = %path.display(),
                backup_path = %backup_path.display()
            );
            None
        }
    }
}

fn write_preferences_file(path: &Path, preferences: &Preferences) -> AppResult<()> {
    ensure_parent_dir(path)?;

    let serialized = serde_json::to_string_pretty(preferences).map_err(|error| {
        AppError::new(
            "preferences_serialize_failed",
            "Failed to serialize preferences",
        )
        .with_source(error)
    })?;

    let temp_path = path.with_extension("json.tmp");
    fs::write(&temp_path, serialized).map_err(|error| {
        AppError::new(
            "preferences_temp_write_failed",
            "Failed to write temporary preferences file",
        )
        .with_source(error)
        .with_context("path", temp_path.display().to_string())
    })?;

    match fs::rename(&temp_path, path) {
        Ok(_) => Ok(()),
        Err(rename_error) => {
            fs::copy(&temp_path, path).map_err(|error| {
                let _ = fs::remove_file(&temp_path);
                AppError::new(
                    "preferences_write_failed",
                    "Failed to replace preferences file",
                )
                .with_source(error)
                .with_context("path", path.display().to_string())
                .with_context("renameError", rename_error.to_string())
            })?;
            fs::remove_file(&temp_path).map_err(|error| {
                AppError::new(
                    "preferences_temp_cleanup_failed",
                    "Failed to remove temporary preferences file",
                )
                .with_source(error)
                .with_context("path", temp_path.display().to_string())
            })?;
            Ok(())
        }
    }
}

#[cfg(test)]
#[path = "../tests/core/preferences_store_tests.rs"]
mod tests;
