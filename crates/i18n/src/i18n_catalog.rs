use anyhow::{Context, Result};
use serde_json::Value;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::{OnceLock, RwLock, RwLockReadGuard, RwLockWriteGuard};

struct BuiltinBundle {
    language: &'static str,
    namespace: &'static str,
    content: &'static str,
}

const BUILTIN_BUNDLES: &[BuiltinBundle] = &[
    BuiltinBundle {
        language: "en",
        namespace: "common",
        content: include_str!("../locales/en/common.json"),
    },
    BuiltinBundle {
        language: "tr",
        namespace: "common",
        content: include_str!("../locales/tr/common.json"),
    },
    BuiltinBundle {
        language: "de",
        namespace: "common",
        content: include_str!("../locales/de/common.json"),
    },
    BuiltinBundle {
        language: "fr",
        namespace: "common",
        content: include_str!("../locales/fr/common.json"),
    },
];

#[derive(Debug, Clone, Default)]
struct CatalogLayer {
    values: HashMap<String, HashMap<String, String>>,
}

impl CatalogLayer {
    fn insert_entries(&mut self, language: &str, entries: HashMap<String, String>) {
        let language_values = self.values.entry(language.to_string()).or_default();
        for (key, value) in entries {
            language_values.insert(key, value);
        }
    }

    fn get(&self, language: &str, key: &str) -> Option<&str> {
        self.values
            .get(language)
            .and_then(|bucket| bucket.get(key))
            .map(String::as_str)
    }
}

#[derive(Debug, Clone, Default)]
struct I18nCatalog {
    builtin: CatalogLayer,
    overlay: CatalogLayer,
}

impl I18nCatalog {
    fn lookup_in_language(&self, language: &str, key: &str) -> Option<&str> {
        self.overlay
            .get(language, key)
            .or_else(|| self.builtin.get(language, key))
    }

    fn lookup_with_fallback(
        &self,
        language: &str,
        fallback_language: &str,
        key: &str,
    ) -> Option<&str> {
        self.lookup_in_language(language, key)
            .or_else(|| self.lookup_in_language(fallback_language, key))
    }
}

#[derive(Debug, Default)]
struct OverlayLoadResult {
    layer: CatalogLayer,
    loaded_files: u32,
    warnings: Vec<String>,
}

static CATALOG: OnceLock<RwLock<I18nCatalog>> = OnceLock::new();

fn catalog_lock() -> &'static RwLock<I18nCatalog> {
    CATALOG.get_or_init(|| {
        let builtin = match load_builtin_layer() {
            Ok(layer) => layer,
            Err(error) => {
                tracing::error!(event = "i18n_builtin_load_failed", detail = %error);
                CatalogLayer::default()
            }
        };
        RwLock::new(I18nCatalog {
            builtin,
            overlay: CatalogLayer::default(),
        })
    })
}

/// Loads user overlay tables from `<config_dir>/locales/<lang>/*.json` on top
/// of the compiled-in tables. Unreadable overlay files are skipped with a
/// warning.
pub fn initialize(config_dir: &Path) -> Result<()> {
    let overlay_root = config_dir.join("locales");
    let overlay = load_overlay_layer(&overlay_root)?;

    for warning in &overlay.warnings {
        tracing::warn!(event = "i18n_overlay_load_warning", detail = %warning);
    }
    tracing::debug!(
        event = "i18n_overlay_loaded",
        root = %overlay_root.display(),
        loaded_files = overlay.loaded_files
    );

    let mut guard = write_guard(catalog_lock());
    guard.overlay = overlay.layer;
    Ok(())
}

pub fn translate(language: &str, fallback_language: &str, key: &str) -> Option<String> {
    let guard = read_guard(catalog_lock());
    guard
        .lookup_with_fallback(language, fallback_language, key)
        .map(ToString::to_string)
}

fn read_guard(lock: &RwLock<I18nCatalog>) -> RwLockReadGuard<'_, I18nCatalog> {
    match lock.read() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

fn write_guard(lock: &RwLock<I18nCatalog>) -> RwLockWriteGuard<'_, I18nCatalog> {
    match lock.write() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

fn load_builtin_layer() -> Result<CatalogLayer> {
    let mut layer = CatalogLayer::default();
    for bundle in BUILTIN_BUNDLES {
        let entries = parse_translation_json(
            bundle.content,
            &format!("builtin:{}:{}", bundle.language, bundle.namespace),
        )?;
        layer.insert_entries(bundle.language, entries);
    }
    Ok(layer)
}

fn load_overlay_layer(root: &Path) -> Result<OverlayLoadResult> {
    let mut result = OverlayLoadResult::default();

    if !root.exists() {
        return Ok(result);
    }

    let language_dirs = fs::read_dir(root)
        .with_context(|| format!("failed to read overlay directory: {}", root.display()))?;
    for language_entry in language_dirs {
        let language_entry = match language_entry {
            Ok(value) => value,
            Err(error) => {
                result
                    .warnings
                    .push(format!("failed to read overlay entry: {error}"));
                continue;
            }
        };

        let path = language_entry.path();
        if !path.is_dir() {
            continue;
        }

        let language = language_entry.file_name().to_string_lossy().to_string();
        if let Err(error) = validate_language_code(&language) {
            result
                .warnings
                .push(format!("skipping overlay directory {language}: {error}"));
            continue;
        }

        let namespace_files = match fs::read_dir(&path) {
            Ok(value) => value,
            Err(error) => {
                result
                    .warnings
                    .push(format!("failed to read overlay directory {language}: {error}"));
                continue;
            }
        };

        for namespace_entry in namespace_files.flatten() {
            let namespace_path = namespace_entry.path();
            if !namespace_path.is_file() {
                continue;
            }
            if namespace_path.extension().and_then(|value| value.to_str()) != Some("json") {
                continue;
            }

            let Some(namespace) = namespace_path
                .file_stem()
                .and_then(|value| value.to_str())
                .map(|value| value.trim().to_string())
            else {
                result.warnings.push(format!(
                    "skipping overlay file with invalid name: {}",
                    namespace_path.display()
                ));
                continue;
            };

            let content = match fs::read_to_string(&namespace_path) {
                Ok(value) => value,
                Err(error) => {
                    result.warnings.push(format!(
                        "failed to read overlay file {}: {error}",
                        namespace_path.display()
                    ));
                    continue;
                }
            };

            let entries = match parse_translation_json(
                &content,
                &format!("overlay:{language}:{namespace}"),
            ) {
                Ok(value) => value,
                Err(error) => {
                    result.warnings.push(format!(
                        "failed to parse overlay file {}: {error}",
                        namespace_path.display()
                    ));
                    continue;
                }
            };

            result.layer.insert_entries(&language, entries);
            result.loaded_files += 1;
        }
    }

    Ok(result)
}

fn parse_translation_json(content: &str, context: &str) -> Result<HashMap<String, String>> {
    let value: Value =
        serde_json::from_str(content).with_context(|| format!("{context}: invalid JSON"))?;
    let object = value
        .as_object()
        .with_context(|| format!("{context}: root must be a JSON object"))?;

    let mut entries = HashMap::new();
    for (key, value) in object {
        validate_key(key)?;
        let text = value
            .as_str()
            .with_context(|| format!("{context}: value of key={key} must be a string"))?;
        entries.insert(key.clone(), text.to_string());
    }
    Ok(entries)
}

fn validate_key(key: &str) -> Result<()> {
    anyhow::ensure!(!key.trim().is_empty(), "translation key must not be empty");
    anyhow::ensure!(
        key.chars()
            .all(|ch| ch.is_ascii_alphanumeric() || ch == '.' || ch == '_' || ch == '-'),
        "invalid translation key: {}",
        key
    );
    Ok(())
}

fn validate_language_code(language: &str) -> Result<()> {
    let trimmed = language.trim();
    anyhow::ensure!(
        trimmed.len() == 2 && trimmed.chars().all(|ch| ch.is_ascii_lowercase()),
        "invalid language code: {}",
        language
    );
    Ok(())
}

#[cfg(test)]
#[path = "../tests/core/i18n_catalog_tests.rs"]
mod tests;
