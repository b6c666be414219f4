use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const DEFAULT_LANGUAGE: &str = "en";

/// The persisted preferences document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preferences {
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default)]
    pub slicers: Vec<SlicerOverride>,
    #[serde(default)]
    pub custom_slicers: Vec<CustomEntry>,
}

fn default_language() -> String {
    DEFAULT_LANGUAGE.to_string()
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            language: default_language(),
            slicers: Vec::new(),
            custom_slicers: Vec::new(),
        }
    }
}

impl Preferences {
    pub fn override_for(&self, id: &str) -> Option<&SlicerOverride> {
        self.slicers.iter().find(|item| item.id == id)
    }

    pub fn override_for_mut(&mut self, id: &str) -> Option<&mut SlicerOverride> {
        self.slicers.iter_mut().find(|item| item.id == id)
    }

    pub fn custom_entry(&self, id: &str) -> Option<&CustomEntry> {
        self.custom_slicers.iter().find(|item| item.id == id)
    }

    pub fn custom_entry_mut(&mut self, id: &str) -> Option<&mut CustomEntry> {
        self.custom_slicers.iter_mut().find(|item| item.id == id)
    }

    /// Gives every custom entry without an identifier a fresh one. Returns
    /// true when anything changed.
    pub fn assign_missing_custom_ids(&mut self) -> bool {
        let mut changed = false;
        for entry in &mut self.custom_slicers {
            if entry.id.trim().is_empty() {
                entry.id = new_custom_id();
                changed = true;
            }
        }
        changed
    }
}

/// User customization layered on top of a built-in slicer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlicerOverride {
    pub id: String,
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
    #[serde(default)]
    pub order: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arguments: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub working_dir: Option<String>,
}

impl SlicerOverride {
    pub fn new(id: impl Into<String>, enabled: bool, order: i32) -> Self {
        Self {
            id: id.into(),
            enabled,
            order,
            custom_path: None,
            arguments: None,
            working_dir: None,
        }
    }
}

/// A fully user-defined slicer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomEntry {
    #[serde(default)]
    pub id: String,
    pub name: String,
    pub path: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub arguments: Vec<String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub working_dir: String,
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
    #[serde(default)]
    pub order: i32,
}

fn enabled_by_default() -> bool {
    true
}

pub fn new_custom_id() -> String {
    format!("custom_{}", Uuid::new_v4().simple())
}

/// Merged, launch-ready view of a built-in or custom slicer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedEntry {
    pub id: String,
    pub name: String,
    pub path: String,
    pub default_path: String,
    pub enabled: bool,
    pub order: i32,
    pub arguments: Vec<String>,
    pub working_dir: Option<String>,
    pub is_custom: bool,
}

/// Editable fields of a slicer, as submitted by the settings editor.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntryFields {
    pub name: Option<String>,
    pub path: Option<String>,
    pub arguments: Option<Vec<String>>,
    pub working_dir: Option<String>,
    pub enabled: Option<bool>,
}

#[cfg(test)]
#[path = "../tests/core/models_tests.rs"]
mod tests;
