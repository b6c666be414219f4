use super::*;
use picker_settings::JsonPreferencesStore;
use std::cell::{Cell, RefCell};
use std::fs;
use std::path::PathBuf;
use uuid::Uuid;

#[derive(Default)]
struct MemoryStore {
    saved: RefCell<Option<Preferences>>,
    save_count: Cell<usize>,
    fail_saves: Cell<bool>,
}

impl MemoryStore {
    fn with(preferences: Preferences) -> Self {
        Self {
            saved: RefCell::new(Some(preferences)),
            ..Self::default()
        }
    }
}

impl PreferencesStore for MemoryStore {
    fn load(&self) -> AppResult<Preferences> {
        Ok(self.saved.borrow().clone().unwrap_or_default())
    }

    fn save(&self, preferences: &Preferences) -> AppResult<()> {
        if self.fail_saves.get() {
            return Err(AppError::new("preferences_write_failed", "disk full"));
        }
        *self.saved.borrow_mut() = Some(preferences.clone());
        self.save_count.set(self.save_count.get() + 1);
        Ok(())
    }
}

fn create_temp_dir(prefix: &str) -> PathBuf {
    let path = std::env::temp_dir().join(format!("slicer-picker-{prefix}-{}", Uuid::new_v4()));
    fs::create_dir_all(&path).expect("failed to create temp dir");
    path
}

fn registry(preferences: Preferences) -> SlicerRegistry<MemoryStore> {
    SlicerRegistry::with_platform(MemoryStore::with(preferences), Platform::Linux)
        .expect("open registry")
}

fn custom(id: &str, path: &str, order: i32) -> CustomEntry {
    CustomEntry {
        id: id.to_string(),
        name: format!("Custom {id}"),
        path: path.to_string(),
        arguments: Vec::new(),
        working_dir: String::new(),
        enabled: true,
        order,
    }
}

fn orders(entries: &[ResolvedEntry]) -> Vec<(String, i32)> {
    entries
        .iter()
        .map(|entry| (entry.id.clone(), entry.order))
        .collect()
}

#[test]
fn resolve_all_should_cover_catalog_and_customs_in_order() {
    let mut registry = registry(Preferences {
        custom_slicers: vec![custom("custom_a", "/bin/a", 15), custom("custom_b", "/bin/b", 0)],
        ..Preferences::default()
    });

    let entries = registry.resolve_all().expect("resolve");

    assert_eq!(entries.len(), CATALOG.len() + 2);
    assert!(entries.windows(2).all(|pair| pair[0].order <= pair[1].order));
    // tie at order 0: built-in first, custom after
    assert_eq!(entries[0].id, "cura");
    assert_eq!(entries[1].id, "custom_b");
    assert!(entries[1].is_custom);
    assert_eq!(entries[1].default_path, "");
}

#[test]
fn first_resolve_should_persist_default_overrides() {
    let root = create_temp_dir("registry-bootstrap");
    let path = root.join("config.json");

    let mut first =
        SlicerRegistry::with_platform(JsonPreferencesStore::new(&path), Platform::Linux)
            .expect("open first");
    assert!(first.preferences().slicers.is_empty());
    let first_entries = first.resolve_all().expect("resolve first");
    assert_eq!(first.preferences().slicers.len(), CATALOG.len());
    assert!(path.exists());

    let mut second =
        SlicerRegistry::with_platform(JsonPreferencesStore::new(&path), Platform::Linux)
            .expect("open second");
    assert_eq!(second.preferences(), first.preferences());
    assert_eq!(second.resolve_all().expect("resolve second"), first_entries);

    let _ = fs::remove_dir_all(root);
}

#[test]
fn bootstrap_should_not_repeat_once_overrides_exist() {
    let mut registry = registry(Preferences::default());
    registry.resolve_all().expect("first");
    registry.resolve_all().expect("second");
    assert_eq!(registry.store().save_count.get(), 1);
}

#[test]
fn override_should_replace_path_and_launch_fields() {
    let mut item = SlicerOverride::new("prusaslicer", false, -5);
    item.custom_path = Some("/opt/prusa/prusa".to_string());
    item.arguments = Some(vec!["--gcode".to_string()]);
    item.working_dir = Some("/opt/prusa".to_string());
    let mut registry = registry(Preferences {
        slicers: vec![item, SlicerOverride::new("cura", true, 0)],
        ..Preferences::default()
    });

    let prusa = registry
        .find_by_id("prusaslicer")
        .expect("find")
        .expect("present");
    assert_eq!(prusa.path, "/opt/prusa/prusa");
    assert_eq!(prusa.default_path, "/usr/bin/prusa-slicer");
    assert_eq!(prusa.arguments, vec!["--gcode".to_string()]);
    assert_eq!(prusa.working_dir.as_deref(), Some("/opt/prusa"));
    assert!(!prusa.enabled);

    let entries = registry.resolve_all().expect("resolve");
    assert_eq!(entries[0].id, "prusaslicer");
    assert!(registry.find_by_id("missing").expect("find").is_none());
}

#[test]
fn blank_custom_path_should_keep_default_path() {
    let mut item = SlicerOverride::new("cura", true, 0);
    item.custom_path = Some("   ".to_string());
    let mut registry = registry(Preferences {
        slicers: vec![item],
        ..Preferences::default()
    });
    let cura = registry.find_by_id("cura").expect("find").expect("present");
    assert_eq!(cura.path, "/usr/bin/cura");
}

#[test]
fn resolve_enabled_should_keep_enabled_existing_paths_only() {
    let root = create_temp_dir("registry-enabled");
    let existing = root.join("slicer");
    fs::write(&existing, "").expect("write fake slicer");
    let existing = existing.display().to_string();

    let mut disabled = custom("custom_off", &existing, 5);
    disabled.enabled = false;
    let mut registry = registry(Preferences {
        custom_slicers: vec![
            custom("custom_on", &existing, 30),
            disabled,
            custom("custom_gone", &root.join("nope").display().to_string(), 1),
            custom("custom_blank", "", 2),
        ],
        ..Preferences::default()
    });

    let all = registry.resolve_all().expect("all");
    let enabled = registry.resolve_enabled().expect("enabled");
    let expected: Vec<ResolvedEntry> = all
        .into_iter()
        .filter(|entry| {
            entry.enabled && !entry.path.is_empty() && Path::new(&entry.path).exists()
        })
        .collect();
    assert_eq!(enabled, expected);
    assert!(enabled.iter().any(|entry| entry.id == "custom_on"));
    assert!(enabled.iter().all(|entry| entry.id != "custom_off"));

    registry.set_enabled("custom_on", false).expect("disable");
    let enabled = registry.resolve_enabled().expect("enabled after");
    assert!(enabled.iter().all(|entry| entry.id != "custom_on"));
    assert!(
        registry
            .resolve_all()
            .expect("all after")
            .iter()
            .any(|entry| entry.id == "custom_on")
    );

    let _ = fs::remove_dir_all(root);
}

#[test]
fn set_enabled_should_upsert_override_and_persist() {
    let mut registry = registry(Preferences::default());
    registry.set_enabled("orcaslicer", false).expect("disable");

    let saved = registry
        .store()
        .saved
        .borrow()
        .clone()
        .expect("saved preferences");
    let item = saved.override_for("orcaslicer").expect("override");
    assert!(!item.enabled);
    assert_eq!(item.order, 30);
}

#[test]
fn set_enabled_should_reject_unknown_ids() {
    let mut registry = registry(Preferences::default());
    let error = registry
        .set_enabled("not-a-slicer", true)
        .expect_err("unknown id");
    assert_eq!(error.code, "unknown_slicer");
    assert_eq!(error.context_value("slicerId"), Some("not-a-slicer"));
}

#[test]
fn set_override_fields_should_replace_and_clear() {
    let mut registry = registry(Preferences::default());
    registry
        .set_override_fields(
            "cura",
            Some("/opt/cura".to_string()),
            Some(vec!["-a".to_string()]),
            Some("/tmp".to_string()),
            true,
        )
        .expect("set fields");
    let cura = registry.find_by_id("cura").expect("find").expect("cura");
    assert_eq!(cura.path, "/opt/cura");
    assert_eq!(cura.working_dir.as_deref(), Some("/tmp"));

    registry
        .set_override_fields("cura", Some(String::new()), Some(Vec::new()), None, false)
        .expect("clear fields");
    let cura = registry.find_by_id("cura").expect("find").expect("cura");
    assert_eq!(cura.path, "/usr/bin/cura");
    assert!(cura.arguments.is_empty());
    assert_eq!(cura.working_dir, None);
    assert!(!cura.enabled);
}

#[test]
fn swap_twice_should_restore_order_keys() {
    let mut registry = registry(Preferences {
        custom_slicers: vec![custom("custom_a", "/bin/a", 200)],
        ..Preferences::default()
    });
    let before = orders(&registry.resolve_all().expect("before"));

    registry.swap_order(1, 4).expect("swap");
    let swapped = registry.resolve_all().expect("swapped");
    assert_eq!(swapped[1].id, before[4].0);
    assert_eq!(swapped[4].id, before[1].0);

    registry.swap_order(1, 4).expect("swap back");
    assert_eq!(orders(&registry.resolve_all().expect("after")), before);
}

#[test]
fn swap_should_write_into_custom_records() {
    let mut registry = registry(Preferences {
        custom_slicers: vec![custom("custom_a", "/bin/a", 200)],
        ..Preferences::default()
    });
    let last = registry.resolve_all().expect("resolve").len() - 1;
    registry.swap_order(0, last).expect("swap");

    assert_eq!(
        registry.preferences().custom_entry("custom_a").expect("custom").order,
        0
    );
    assert_eq!(
        registry.preferences().override_for("cura").expect("cura").order,
        200
    );
}

#[test]
fn swap_out_of_range_should_be_noop() {
    let mut registry = registry(Preferences::default());
    let before = orders(&registry.resolve_all().expect("before"));
    let saves = registry.store().save_count.get();

    registry.swap_order(0, 999).expect("noop");

    assert_eq!(orders(&registry.resolve_all().expect("after")), before);
    assert_eq!(registry.store().save_count.get(), saves);
}

#[test]
fn move_should_renumber_when_neighbours_tie() {
    let mut registry = registry(Preferences {
        slicers: CATALOG
            .iter()
            .map(|item| SlicerOverride::new(item.id, true, 0))
            .collect(),
        ..Preferences::default()
    });

    registry.move_down(0).expect("move down");
    let entries = registry.resolve_all().expect("resolve");
    assert_eq!(entries[0].id, "prusaslicer");
    assert_eq!(entries[1].id, "cura");
    assert!(entries.windows(2).all(|pair| pair[0].order < pair[1].order));

    registry.move_up(1).expect("move up");
    let entries = registry.resolve_all().expect("resolve");
    assert_eq!(entries[0].id, "cura");

    registry.move_up(0).expect("top stays");
    let last = entries.len() - 1;
    registry.move_down(last).expect("bottom stays");
    assert_eq!(
        orders(&registry.resolve_all().expect("resolve")),
        orders(&entries)
    );
}

#[test]
fn add_custom_entry_should_use_count_based_order() {
    let mut registry = registry(Preferences {
        slicers: vec![SlicerOverride::new("cura", true, 0)],
        custom_slicers: vec![custom("custom_a", "/bin/a", 0)],
        ..Preferences::default()
    });

    let id = registry
        .add_custom_entry("New", "/bin/new", vec!["-x".to_string()], None)
        .expect("add");

    assert!(id.starts_with("custom_"));
    let entry = registry.preferences().custom_entry(&id).expect("stored");
    assert_eq!(entry.order, 10);
    assert!(entry.enabled);
    assert_eq!(entry.arguments, vec!["-x".to_string()]);
}

#[test]
fn add_custom_entry_should_validate_name_and_path() {
    let mut registry = registry(Preferences::default());
    let error = registry
        .add_custom_entry("  ", "/bin/x", Vec::new(), None)
        .expect_err("blank name");
    assert_eq!(error.code, "invalid_slicer_name");
    let error = registry
        .add_custom_entry("X", "", Vec::new(), None)
        .expect_err("blank path");
    assert_eq!(error.code, "invalid_slicer_path");
    assert!(registry.preferences().custom_slicers.is_empty());
}

#[test]
fn update_entry_should_dispatch_on_kind() {
    let mut registry = registry(Preferences {
        custom_slicers: vec![custom("custom_a", "/bin/a", 50)],
        ..Preferences::default()
    });

    let mut item = registry
        .find_by_id("custom_a")
        .expect("find")
        .expect("custom");
    item.name = "Renamed".to_string();
    item.working_dir = Some("/work".to_string());
    registry.update_entry(&item).expect("update custom");
    let stored = registry.preferences().custom_entry("custom_a").expect("custom");
    assert_eq!(stored.name, "Renamed");
    assert_eq!(stored.working_dir, "/work");
    assert_eq!(stored.order, 50);

    let mut cura = registry.find_by_id("cura").expect("find").expect("cura");
    cura.enabled = false;
    registry.update_entry(&cura).expect("update builtin");
    let item = registry.preferences().override_for("cura").expect("override");
    assert!(!item.enabled);
    assert_eq!(item.custom_path, None);
}

#[test]
fn update_custom_entry_should_reject_blank_path_and_unknown_id() {
    let mut registry = registry(Preferences {
        custom_slicers: vec![custom("custom_a", "/bin/a", 0)],
        ..Preferences::default()
    });

    let error = registry
        .update_custom_entry(
            "custom_a",
            EntryFields {
                path: Some(" ".to_string()),
                ..EntryFields::default()
            },
        )
        .expect_err("blank path");
    assert_eq!(error.code, "invalid_slicer_path");
    assert_eq!(
        registry.preferences().custom_entry("custom_a").expect("custom").path,
        "/bin/a"
    );

    let error = registry
        .update_custom_entry("custom_zzz", EntryFields::default())
        .expect_err("unknown");
    assert_eq!(error.code, "unknown_slicer");
}

#[test]
fn remove_custom_entry_should_drop_record() {
    let mut registry = registry(Preferences {
        custom_slicers: vec![custom("custom_a", "/bin/a", 0), custom("custom_b", "/bin/b", 10)],
        ..Preferences::default()
    });
    registry.remove_custom_entry("custom_a").expect("remove");
    assert!(registry.preferences().custom_entry("custom_a").is_none());
    assert!(registry.preferences().custom_entry("custom_b").is_some());
    assert_eq!(
        registry
            .remove_custom_entry("custom_a")
            .expect_err("already removed")
            .code,
        "unknown_slicer"
    );
}

#[test]
fn set_language_should_normalize_and_reject_unsupported() {
    let mut registry = registry(Preferences::default());
    registry.set_language("de_DE.UTF-8").expect("german");
    assert_eq!(registry.language(), "de");

    let error = registry.set_language("xx").expect_err("unsupported");
    assert_eq!(error.code, "unsupported_language");
    assert_eq!(registry.language(), "de");
}

#[test]
fn failed_save_should_propagate_and_keep_change_in_memory() {
    let store = MemoryStore::default();
    let mut registry =
        SlicerRegistry::with_platform(store, Platform::Linux).expect("open registry");
    registry.store().fail_saves.set(true);

    let entries = registry.resolve_all().expect("bootstrap failure is not fatal");
    assert_eq!(entries.len(), CATALOG.len());

    let error = registry
        .set_enabled("cura", false)
        .expect_err("save should fail");
    assert_eq!(error.code, "preferences_write_failed");
    assert!(!registry.preferences().override_for("cura").expect("cura").enabled);

    registry.store().fail_saves.set(false);
    registry.save().expect("retry");
    assert!(registry.store().saved.borrow().is_some());
}

#[test]
fn held_lock_should_fall_back_to_defaults_without_overwriting() {
    let root = create_temp_dir("registry-lock-held");
    let path = root.join("config.json");
    let stored = Preferences {
        language: "de".to_string(),
        custom_slicers: vec![custom("custom_kept", "/opt/kept", 0)],
        ..Preferences::default()
    };
    JsonPreferencesStore::new(&path)
        .save(&stored)
        .expect("seed preferences");
    let lock_path = root.join("config.json.lock");
    fs::write(&lock_path, "").expect("hold lock");

    let mut registry =
        SlicerRegistry::with_platform(JsonPreferencesStore::new(&path), Platform::Linux)
            .expect("read failures fall back");

    assert!(registry.is_read_fallback());
    assert_eq!(registry.preferences(), &Preferences::default());
    let entries = registry.resolve_all().expect("resolve");
    assert_eq!(entries.len(), CATALOG.len());

    fs::remove_file(&lock_path).expect("release lock");
    let on_disk = JsonPreferencesStore::new(&path).load().expect("reload");
    assert_eq!(on_disk, stored);

    let _ = fs::remove_dir_all(root);
}

#[test]
fn failed_load_should_not_block_registry() {
    struct UnreadableStore;

    impl PreferencesStore for UnreadableStore {
        fn load(&self) -> AppResult<Preferences> {
            Err(AppError::new("preferences_read_failed", "permission denied"))
        }

        fn save(&self, _: &Preferences) -> AppResult<()> {
            Err(AppError::new("preferences_write_failed", "permission denied"))
        }
    }

    let mut registry =
        SlicerRegistry::with_platform(UnreadableStore, Platform::Linux).expect("open registry");
    assert!(registry.is_read_fallback());
    assert_eq!(registry.resolve_all().expect("resolve").len(), CATALOG.len());

    let error = registry
        .set_enabled("cura", false)
        .expect_err("writes still surface");
    assert_eq!(error.code, "preferences_write_failed");
}
