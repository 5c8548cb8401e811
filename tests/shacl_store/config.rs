//! Loading `shacl.toml` and running a store with it

use crate::common::*;
use shaclstore::CONFIG_FILE_NAME;
use tempfile::TempDir;

fn two_violations() -> Vec<Statement> {
    vec![
        typed("ann", "Person"),
        triple(ex("ann"), ex("age"), Term::integer(1)),
        triple(ex("ann"), ex("age"), Term::integer(2)),
        typed("bob", "Person"),
        triple(ex("bob"), ex("age"), Term::integer(1)),
        triple(ex("bob"), ex("age"), Term::integer(2)),
    ]
}

#[test]
fn store_runs_with_config_from_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join(CONFIG_FILE_NAME);
    std::fs::write(&path, "validation_enabled = false\nworker_threads = 2\n").unwrap();

    let config = ShaclConfig::from_file(&path).unwrap();
    assert!(!config.validation_enabled);
    assert!(config.cache_select_nodes);
    assert_eq!(config.worker_count(), 2);

    let store = store_with(config);
    load(&store, person_age_shape(None, Some(1)));
    load(&store, two_violations());
    assert_eq!(store.statements().len(), 6);
}

#[test]
fn written_default_config_round_trips_through_a_store() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join(CONFIG_FILE_NAME);
    ShaclConfig::write_default_if_missing(&path).unwrap();

    let config = ShaclConfig::from_file(&path).unwrap();
    assert_eq!(config, ShaclConfig::default());
    let store = store_with(config);
    assert_eq!(store.config().isolation_level().unwrap(), IsolationLevel::SnapshotRead);
}

#[test]
fn total_result_limit_truncates_failed_report() {
    let store = store_with(ShaclConfig {
        validation_results_limit_total: 1,
        ..config()
    });
    load(&store, person_age_shape(None, Some(1)));

    let mut conn = store.connection().unwrap();
    conn.begin().unwrap();
    for st in two_violations() {
        conn.add(st).unwrap();
    }
    let err = conn.commit().unwrap_err();
    let report = err.report().unwrap();
    assert_eq!(report.results().len(), 1);
    assert!(report.truncated());
    assert!(!report.conforms());
}

#[test]
fn zero_result_limit_still_fails_the_commit() {
    let store = store_with(ShaclConfig {
        validation_results_limit_total: 0,
        ..config()
    });
    load(&store, person_age_shape(None, Some(1)));

    let mut conn = store.connection().unwrap();
    conn.begin().unwrap();
    for st in two_violations() {
        conn.add(st).unwrap();
    }
    let err = conn.commit().unwrap_err();
    let report = err.report().unwrap();
    assert!(report.results().is_empty());
    assert!(report.truncated());
    assert!(store.statements().is_empty());
}

#[test]
fn invalid_isolation_in_file_is_rejected() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join(CONFIG_FILE_NAME);
    std::fs::write(&path, "default_isolation = \"whenever\"\n").unwrap();
    assert!(matches!(
        ShaclConfig::from_file(&path),
        Err(shaclstore::Error::Config(_))
    ));
}
