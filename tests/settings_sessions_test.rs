use std::fs;

use serial_test::serial;
use tempfile::TempDir;

use folioview::sessions::{ViewingSessions, fingerprint};
use folioview::settings::{self, Settings};
use folioview::viewer::ZoomPolicy;

#[test]
#[serial]
fn settings_file_overrides_defaults() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.yaml");
    fs::write(
        &path,
        "version: 1\nzoom:\n  max_scale: 3.0\ndevice_pixel_ratio: 2.0\nreserved_height: 40\n",
    )
    .unwrap();

    settings::load_settings_from_path(&path);

    let loaded = settings::get_settings();
    assert_eq!(loaded.zoom.max_scale, 3.0);
    assert_eq!(loaded.zoom.min_scale, ZoomPolicy::MIN_SCALE);
    assert_eq!(loaded.device_pixel_ratio, 2.0);

    let config = settings::viewer_config();
    assert_eq!(config.device_pixel_ratio, 2.0);
    assert_eq!(config.reserved_height, 40.0);

    settings::reset_settings();
}

#[test]
#[serial]
fn invalid_settings_file_is_ignored() {
    settings::reset_settings();
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.yaml");
    fs::write(&path, "zoom: [not, a, policy\n").unwrap();

    settings::load_settings_from_path(&path);
    assert_eq!(settings::get_settings(), Settings::default());
}

#[test]
#[serial]
fn old_settings_are_migrated_and_rewritten() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.yaml");
    fs::write(&path, "version: 0\nzoom:\n  min_scale: -1.0\n").unwrap();

    settings::load_settings_from_path(&path);

    let loaded = settings::get_settings();
    assert_eq!(loaded.version, settings::CURRENT_VERSION);
    assert_eq!(loaded.zoom.min_scale, ZoomPolicy::MIN_SCALE);

    let rewritten = fs::read_to_string(&path).unwrap();
    assert!(rewritten.starts_with("# folioview settings"));
    assert!(rewritten.contains("version: 1"));

    settings::reset_settings();
}

#[test]
fn saved_settings_round_trip() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nested").join("config.yaml");
    let expected = Settings {
        remember_sessions: false,
        window_height: 1000.0,
        ..Settings::default()
    };

    settings::save_settings_to_file(&expected, &path);

    let content = fs::read_to_string(&path).unwrap();
    let body: Settings = serde_yaml::from_str(&content).unwrap();
    assert_eq!(body, expected);
}

#[test]
fn sessions_persist_between_runs() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("data").join("sessions.json");
    let key = fingerprint(b"%PDF-1.7 report");

    let mut sessions = ViewingSessions::with_file(&path);
    sessions.record(&key, "report.pdf", 12, 4, 1.5, false);
    assert!(path.exists());

    let reloaded = ViewingSessions::load_from_file(&path).unwrap();
    let session = reloaded.get(&key).unwrap();
    assert_eq!(session.file_name, "report.pdf");
    assert_eq!(session.total_pages, 12);
    assert_eq!(session.page, 4);
    assert_eq!(session.scale, 1.5);
    assert!(!session.auto_fit);
    assert_eq!(reloaded.most_recent().map(|(k, _)| k), Some(key.as_str()));
}

#[test]
fn corrupt_sessions_file_starts_fresh() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("sessions.json");
    fs::write(&path, "{ not json").unwrap();

    let mut sessions = ViewingSessions::load_or_ephemeral(Some(path.as_path()));
    assert!(sessions.is_empty());

    sessions.record("abc", "a.pdf", 3, 2, 1.0, true);
    let reloaded = ViewingSessions::load_from_file(&path).unwrap();
    assert_eq!(reloaded.len(), 1);
}

#[test]
fn missing_sessions_file_is_empty() {
    let dir = TempDir::new().unwrap();
    let sessions = ViewingSessions::load_from_file(&dir.path().join("none.json")).unwrap();
    assert!(sessions.is_empty());
}
