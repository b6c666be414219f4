use crate::catalog::{self, CATALOG, ORDER_STEP, Platform};
use picker_protocol::models::{
    CustomEntry, EntryFields, Preferences, ResolvedEntry, SlicerOverride, new_custom_id,
};
use picker_protocol::{AppError, AppResult};
use picker_settings::PreferencesStore;
use std::path::Path;

/// Merges the built-in catalog with the user's overrides and custom entries,
/// and applies edits back onto the preferences.
///
/// Every mutation changes the in-memory preferences first and then saves
/// them. A failed save is returned to the caller while the in-memory change
/// is kept, so `save` can be retried.
pub struct SlicerRegistry<S: PreferencesStore> {
    store: S,
    preferences: Preferences,
    platform: Platform,
    read_fallback: bool,
}

impl<S: PreferencesStore> SlicerRegistry<S> {
    pub fn open(store: S) -> AppResult<Self> {
        Self::with_platform(store, Platform::current())
    }

    /// Loads the preferences. A failed read (held lock, unreadable file) is
    /// logged and replaced by defaults so files can still be opened.
    pub fn with_platform(store: S, platform: Platform) -> AppResult<Self> {
        let (preferences, read_fallback) = match store.load() {
            Ok(preferences) => (preferences, false),
            Err(error) => {
                tracing::warn!(
                    event = "preferences_read_fallback",
                    code = %error.code,
                    detail = %error.describe()
                );
                (Preferences::default(), true)
            }
        };
        Ok(Self {
            store,
            preferences,
            platform,
            read_fallback,
        })
    }

    /// True when the stored preferences could not be read and defaults are
    /// in use.
    pub fn is_read_fallback(&self) -> bool {
        self.read_fallback
    }

    pub fn preferences(&self) -> &Preferences {
        &self.preferences
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn platform(&self) -> Platform {
        self.platform
    }

    pub fn language(&self) -> &str {
        &self.preferences.language
    }

    pub fn save(&self) -> AppResult<()> {
        self.store.save(&self.preferences)
    }

    pub fn list_descriptors(&self) -> Vec<ResolvedEntry> {
        catalog::list_descriptors(self.platform)
    }

    /// All entries, built-ins first then custom ones, stably sorted by order.
    ///
    /// The first call on preferences without any override writes one default
    /// override per catalog entry.
    pub fn resolve_all(&mut self) -> AppResult<Vec<ResolvedEntry>> {
        self.bootstrap_overrides();
        Ok(self.merge())
    }

    /// Entries that can be launched right now: enabled with an existing path.
    pub fn resolve_enabled(&mut self) -> AppResult<Vec<ResolvedEntry>> {
        let mut entries: Vec<ResolvedEntry> = self
            .resolve_all()?
            .into_iter()
            .filter(|entry| {
                entry.enabled && !entry.path.trim().is_empty() && Path::new(&entry.path).exists()
            })
            .collect();
        entries.sort_by_key(|entry| entry.order);
        Ok(entries)
    }

    pub fn find_by_id(&mut self, id: &str) -> AppResult<Option<ResolvedEntry>> {
        Ok(self.resolve_all()?.into_iter().find(|entry| entry.id == id))
    }

    pub fn set_enabled(&mut self, id: &str, enabled: bool) -> AppResult<()> {
        if catalog::descriptor(id).is_some() {
            self.upsert_override(id, |item| item.enabled = enabled)?;
        } else {
            let entry = self
                .preferences
                .custom_entry_mut(id)
                .ok_or_else(|| unknown_slicer(id))?;
            entry.enabled = enabled;
        }
        tracing::info!(event = "slicer_enabled_changed", slicer_id = id, enabled);
        self.save()
    }

    /// Replaces the user customization of a built-in slicer. Empty values
    /// clear the corresponding override field.
    pub fn set_override_fields(
        &mut self,
        id: &str,
        path: Option<String>,
        arguments: Option<Vec<String>>,
        working_dir: Option<String>,
        enabled: bool,
    ) -> AppResult<()> {
        self.upsert_override(id, |item| {
            item.custom_path = non_blank(path);
            item.arguments = arguments.filter(|values| !values.is_empty());
            item.working_dir = non_blank(working_dir);
            item.enabled = enabled;
        })?;
        tracing::info!(event = "slicer_override_updated", slicer_id = id);
        self.save()
    }

    /// Exchanges the order keys of the entries at two positions of the
    /// `resolve_all` view. Out-of-range positions leave everything untouched.
    pub fn swap_order(&mut self, a: usize, b: usize) -> AppResult<()> {
        let entries = self.resolve_all()?;
        let (Some(first), Some(second)) = (entries.get(a), entries.get(b)) else {
            return Ok(());
        };
        if a == b {
            return Ok(());
        }

        self.write_order(first, second.order)?;
        self.write_order(second, first.order)?;
        tracing::info!(
            event = "slicer_order_swapped",
            first = %first.id,
            second = %second.id
        );
        self.save()
    }

    pub fn move_up(&mut self, index: usize) -> AppResult<()> {
        if index == 0 {
            return Ok(());
        }
        self.move_pair(index - 1, index)
    }

    pub fn move_down(&mut self, index: usize) -> AppResult<()> {
        self.move_pair(index, index.saturating_add(1))
    }

    pub fn add_custom_entry(
        &mut self,
        name: &str,
        path: &str,
        arguments: Vec<String>,
        working_dir: Option<String>,
    ) -> AppResult<String> {
        validate_custom_fields(name, path)?;

        let count = i32::try_from(self.preferences.custom_slicers.len()).unwrap_or(i32::MAX);
        let id = new_custom_id();
        self.preferences.custom_slicers.push(CustomEntry {
            id: id.clone(),
            name: name.trim().to_string(),
            path: path.trim().to_string(),
            arguments,
            working_dir: non_blank(working_dir).unwrap_or_default(),
            enabled: true,
            order: count.saturating_mul(ORDER_STEP),
        });
        tracing::info!(event = "custom_slicer_added", slicer_id = %id);
        self.save()?;
        Ok(id)
    }

    pub fn update_custom_entry(&mut self, id: &str, fields: EntryFields) -> AppResult<()> {
        let current = self
            .preferences
            .custom_entry(id)
            .ok_or_else(|| unknown_slicer(id))?;

        let name = fields.name.unwrap_or_else(|| current.name.clone());
        let path = fields.path.unwrap_or_else(|| current.path.clone());
        validate_custom_fields(&name, &path)?;

        let entry = self
            .preferences
            .custom_entry_mut(id)
            .ok_or_else(|| unknown_slicer(id))?;
        entry.name = name.trim().to_string();
        entry.path = path.trim().to_string();
        if let Some(arguments) = fields.arguments {
            entry.arguments = arguments;
        }
        if let Some(working_dir) = fields.working_dir {
            entry.working_dir = working_dir.trim().to_string();
        }
        if let Some(enabled) = fields.enabled {
            entry.enabled = enabled;
        }
        tracing::info!(event = "custom_slicer_updated", slicer_id = id);
        self.save()
    }

    /// Writes an edited resolved entry back to its custom record or to the
    /// override of its built-in slicer.
    pub fn update_entry(&mut self, entry: &ResolvedEntry) -> AppResult<()> {
        if entry.is_custom {
            return self.update_custom_entry(
                &entry.id,
                EntryFields {
                    name: Some(entry.name.clone()),
                    path: Some(entry.path.clone()),
                    arguments: Some(entry.arguments.clone()),
                    working_dir: Some(entry.working_dir.clone().unwrap_or_default()),
                    enabled: Some(entry.enabled),
                },
            );
        }

        let custom_path = (entry.path != entry.default_path).then(|| entry.path.clone());
        self.set_override_fields(
            &entry.id,
            custom_path,
            Some(entry.arguments.clone()),
            entry.working_dir.clone(),
            entry.enabled,
        )
    }

    pub fn remove_custom_entry(&mut self, id: &str) -> AppResult<()> {
        let position = self
            .preferences
            .custom_slicers
            .iter()
            .position(|item| item.id == id)
            .ok_or_else(|| unknown_slicer(id))?;
        self.preferences.custom_slicers.remove(position);
        tracing::info!(event = "custom_slicer_removed", slicer_id = id);
        self.save()
    }

    pub fn set_language(&mut self, code: &str) -> AppResult<()> {
        let language = picker_i18n::normalize_language(code).ok_or_else(|| {
            AppError::new("unsupported_language", "Unsupported language")
                .with_context("language", code)
        })?;
        self.preferences.language = language.to_string();
        tracing::info!(event = "language_changed", language);
        self.save()
    }

    fn bootstrap_overrides(&mut self) {
        if !self.preferences.slicers.is_empty() {
            return;
        }

        self.preferences.slicers = CATALOG
            .iter()
            .enumerate()
            .map(|(index, item)| SlicerOverride::new(item.id, true, catalog::catalog_order(index)))
            .collect();
        // Defaults standing in for an unreadable file must not replace it.
        if self.read_fallback {
            return;
        }
        match self.save() {
            Ok(()) => tracing::info!(
                event = "slicer_overrides_bootstrapped",
                count = self.preferences.slicers.len()
            ),
            Err(error) => tracing::warn!(
                event = "slicer_overrides_bootstrap_persist_failed",
                code = %error.code,
                detail = %error.describe()
            ),
        }
    }

    fn merge(&self) -> Vec<ResolvedEntry> {
        let mut entries = catalog::list_descriptors(self.platform);
        for entry in &mut entries {
            if let Some(item) = self.preferences.override_for(&entry.id) {
                apply_override(entry, item);
            }
        }
        entries.extend(self.preferences.custom_slicers.iter().map(resolve_custom));
        entries.sort_by_key(|entry| entry.order);
        entries
    }

    fn upsert_override(
        &mut self,
        id: &str,
        apply: impl FnOnce(&mut SlicerOverride),
    ) -> AppResult<()> {
        let default_order = catalog::descriptor_order(id).ok_or_else(|| unknown_slicer(id))?;
        if self.preferences.override_for(id).is_none() {
            self.preferences
                .slicers
                .push(SlicerOverride::new(id, true, default_order));
        }
        let item = self
            .preferences
            .override_for_mut(id)
            .ok_or_else(|| unknown_slicer(id))?;
        apply(item);
        Ok(())
    }

    fn write_order(&mut self, entry: &ResolvedEntry, order: i32) -> AppResult<()> {
        if entry.is_custom {
            let item = self
                .preferences
                .custom_entry_mut(&entry.id)
                .ok_or_else(|| unknown_slicer(&entry.id))?;
            item.order = order;
            return Ok(());
        }
        self.upsert_override(&entry.id, |item| item.order = order)
    }

    fn move_pair(&mut self, upper: usize, lower: usize) -> AppResult<()> {
        let entries = self.resolve_all()?;
        let (Some(first), Some(second)) = (entries.get(upper), entries.get(lower)) else {
            return Ok(());
        };

        if first.order == second.order {
            for (position, entry) in entries.iter().enumerate() {
                let order = catalog::catalog_order(position);
                self.write_order(entry, order)?;
            }
        }
        self.swap_order(upper, lower)
    }
}

fn apply_override(entry: &mut ResolvedEntry, item: &SlicerOverride) {
    entry.enabled = item.enabled;
    entry.order = item.order;
    if let Some(path) = item
        .custom_path
        .as_deref()
        .filter(|value| !value.trim().is_empty())
    {
        entry.path = path.to_string();
    }
    if let Some(arguments) = &item.arguments {
        entry.arguments = arguments.clone();
    }
    entry.working_dir = item
        .working_dir
        .clone()
        .filter(|value| !value.trim().is_empty());
}

fn resolve_custom(item: &CustomEntry) -> ResolvedEntry {
    ResolvedEntry {
        id: item.id.clone(),
        name: item.name.clone(),
        path: item.path.clone(),
        default_path: String::new(),
        enabled: item.enabled,
        order: item.order,
        arguments: item.arguments.clone(),
        working_dir: Some(item.working_dir.clone()).filter(|value| !value.trim().is_empty()),
        is_custom: true,
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty())
}

fn validate_custom_fields(name: &str, path: &str) -> AppResult<()> {
    if name.trim().is_empty() {
        return Err(AppError::new(
            "invalid_slicer_name",
            "Slicer name must not be empty",
        ));
    }
    if path.trim().is_empty() {
        return Err(AppError::new(
            "invalid_slicer_path",
            "Slicer path must not be empty",
        ));
    }
    Ok(())
}

fn unknown_slicer(id: &str) -> AppError {
    AppError::new("unknown_slicer", "Unknown slicer").with_context("slicerId", id)
}

#[cfg(test)]
#[path = "../tests/core/registry_tests.rs"]
mod tests;
