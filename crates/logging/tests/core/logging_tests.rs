use super::*;
use uuid::Uuid;

fn create_temp_dir(prefix: &str) -> PathBuf {
    let path = std::env::temp_dir().join(format!("slicer-picker-{prefix}-{}", Uuid::new_v4()));
    fs::create_dir_all(&path).expect("failed to create temp dir");
    path
}

#[test]
fn cleanup_should_remove_only_expired_own_logs() {
    let dir = create_temp_dir("log-cleanup");
    fs::write(dir.join("slicer-picker.2026-01-01.log"), "{}").expect("write log");
    fs::write(dir.join("unrelated.txt"), "keep").expect("write other");

    let keep = Duration::from_secs(7 * 24 * 60 * 60);
    let removed_now =
        cleanup_expired_logs_with_duration(&dir, keep, SystemTime::now()).expect("cleanup now");
    assert_eq!(removed_now, 0);

    let later = SystemTime::now() + Duration::from_secs(10 * 24 * 60 * 60);
    let removed_later =
        cleanup_expired_logs_with_duration(&dir, keep, later).expect("cleanup later");
    assert_eq!(removed_later, 1);
    assert!(!dir.join("slicer-picker.2026-01-01.log").exists());
    assert!(dir.join("unrelated.txt").exists());

    let _ = fs::remove_dir_all(dir);
}

#[test]
fn cleanup_should_ignore_missing_directory() {
    let dir = std::env::temp_dir().join(format!("slicer-picker-nolog-{}", Uuid::new_v4()));
    assert!(cleanup_expired_logs(&dir, DEFAULT_KEEP_DAYS).is_ok());
}

#[test]
fn normalize_level_should_accept_known_levels_only() {
    assert_eq!(normalize_level(" WARN "), Some("warn"));
    assert_eq!(normalize_level("trace"), Some("trace"));
    assert_eq!(normalize_level("verbose"), None);
    assert_eq!(normalize_level(""), None);
}
