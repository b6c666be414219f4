use std::path::Path;

pub const DEFAULT_LANGUAGE: &str = "en";
pub const SUPPORTED_LANGUAGES: [&str; 4] = ["tr", "en", "de", "fr"];
pub const LOCALE_ENV_KEY: &str = "SLICER_PICKER_LOCALE";

const SYSTEM_LOCALE_ENV_KEYS: [&str; 4] = ["LC_ALL", "LC_MESSAGES", "LANG", "LANGUAGE"];

/// Maps raw locale text (`tr_TR.UTF-8`, `de-DE`, `FR`) onto a supported
/// two-letter language code.
pub fn normalize_language(raw: &str) -> Option<&'static str> {
    let trimmed = raw.trim();
    let language = trimmed
        .split(['_', '-', '.', '@'])
        .next()
        .unwrap_or_default()
        .to_ascii_lowercase();
    if language.len() != 2 {
        return None;
    }

    SUPPORTED_LANGUAGES
        .iter()
        .copied()
        .find(|candidate| *candidate == language)
}

pub fn resolve_system_language() -> &'static str {
    for key in std::iter::once(LOCALE_ENV_KEY).chain(SYSTEM_LOCALE_ENV_KEYS) {
        if let Ok(value) = std::env::var(key)
            && let Some(language) = normalize_language(&value)
        {
            return language;
        }
    }

    DEFAULT_LANGUAGE
}

/// `SLICER_PICKER_LOCALE` wins over the stored preference while it is set.
/// A preference naming no supported language falls through to the system
/// locale.
pub fn resolve_language(preference: &str) -> &'static str {
    let env_override = std::env::var(LOCALE_ENV_KEY).ok();
    resolve_language_with(env_override.as_deref(), preference)
}

pub fn resolve_language_with(env_override: Option<&str>, preference: &str) -> &'static str {
    env_override
        .and_then(normalize_language)
        .or_else(|| normalize_language(preference))
        .unwrap_or_else(resolve_system_language)
}

pub fn is_supported_language(code: &str) -> bool {
    SUPPORTED_LANGUAGES.contains(&code)
}

/// Translation key of the display name of a language.
pub fn language_name_key(code: &str) -> Option<&'static str> {
    match code {
        "tr" => Some("turkish"),
        "en" => Some("english"),
        "de" => Some("german"),
        "fr" => Some("french"),
        _ => None,
    }
}

pub fn init_i18n_catalog(config_dir: &Path) -> anyhow::Result<()> {
    super::i18n_catalog::initialize(config_dir)
}

pub fn t(language: &str, key: &str) -> String {
    if let Some(value) = super::i18n_catalog::translate(language, DEFAULT_LANGUAGE, key) {
        return value;
    }

    tracing::warn!(event = "i18n_missing_key", language = language, key = key);
    key.to_string()
}

#[cfg(test)]
#[path = "../tests/core/i18n_tests.rs"]
mod tests;
