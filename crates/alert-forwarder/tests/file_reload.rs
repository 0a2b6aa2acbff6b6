//! Hot reload against a real configuration file.

use alert_forwarder::config::ReloadOutcome;
use alert_forwarder::{ConfigError, ConfigStore, Configuration, FileSource};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::time::{Duration, SystemTime};

const CONFIG: &str = "\
event.host: staging
event.sourceType: prometheus:alert
watchdog.check_interval: 30
watchdog.alert_interval: 120
watchdog.timeout: 60
collector.host: collector.local
collector.token: token
";

/// Overwrite the file and push its mtime forward so the change is visible
/// regardless of filesystem timestamp granularity.
fn rewrite(path: &std::path::Path, contents: &str, bump: Duration) {
    let mut file = OpenOptions::new()
        .write(true)
        .truncate(true)
        .open(path)
        .unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file.set_modified(SystemTime::now() + bump).unwrap();
}

#[test]
fn test_file_changes_are_picked_up_and_bad_edits_ignored() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("alert-forwarder.yaml");
    File::create(&path)
        .unwrap()
        .write_all(CONFIG.as_bytes())
        .unwrap();

    let source = FileSource::new(&path);
    let store = ConfigStore::new(Configuration::load(&source).unwrap());
    assert!(matches!(
        store.reload_if_changed(&source),
        ReloadOutcome::Unchanged
    ));

    rewrite(
        &path,
        &CONFIG.replace("watchdog.timeout: 60", "watchdog.timeout: 0"),
        Duration::from_secs(10),
    );
    assert!(matches!(
        store.reload_if_changed(&source),
        ReloadOutcome::Rejected(ConfigError::Missing("watchdog.timeout"))
    ));
    assert_eq!(store.snapshot().watchdog.timeout_secs, 60);

    rewrite(
        &path,
        &CONFIG.replace("watchdog.timeout: 60", "watchdog.timeout: 300"),
        Duration::from_secs(20),
    );
    assert!(matches!(
        store.reload_if_changed(&source),
        ReloadOutcome::Reloaded(_)
    ));
    assert_eq!(store.snapshot().watchdog.timeout_secs, 300);
}

#[test]
fn test_missing_file_fails_initial_load() {
    let source = FileSource::new("/nonexistent/alert-forwarder.yaml");
    assert!(matches!(
        Configuration::load(&source),
        Err(ConfigError::Io { .. })
    ));
}
