//! Concurrent transactions, serializable escalation and lock fail-fast

use crate::common::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;

fn snapshot_config(serializable_validation: bool) -> ShaclConfig {
    ShaclConfig {
        default_isolation: "snapshot".to_string(),
        serializable_validation,
        ..config()
    }
}

/// Two threads each add one `age` to the same Person under snapshot
/// isolation. Returns how many of the two commits failed validation.
fn racing_ages(serializable_validation: bool) -> (usize, ShaclStore) {
    let store = store_with(snapshot_config(serializable_validation));
    load(&store, person_age_shape(None, Some(1)));
    load(&store, vec![typed("peter", "Person")]);

    let opened = Arc::new(Barrier::new(2));
    let written = Arc::new(Barrier::new(2));
    let failures = Arc::new(AtomicUsize::new(0));

    let handles: Vec<_> = [20i64, 30]
        .into_iter()
        .map(|age| {
            let store = store.clone();
            let opened = Arc::clone(&opened);
            let written = Arc::clone(&written);
            let failures = Arc::clone(&failures);

            thread::spawn(move || {
                let mut conn = store.connection().unwrap();
                opened.wait();

                conn.begin().unwrap();
                assert_eq!(conn.isolation_level(), Some(IsolationLevel::Snapshot));
                conn.add(triple(ex("peter"), ex("age"), Term::integer(age))).unwrap();
                written.wait();

                match conn.commit() {
                    Ok(()) => {}
                    Err(e) if e.is_validation_failure() => {
                        assert!(conn.last_validation_stats().unwrap().escalated);
                        failures.fetch_add(1, Ordering::SeqCst);
                    }
                    Err(e) => panic!("unexpected commit error: {}", e),
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }
    (failures.load(Ordering::SeqCst), store)
}

#[test]
fn escalation_lets_exactly_one_racing_commit_through() {
    let (failures, store) = racing_ages(true);
    assert_eq!(failures, 1);
    assert_eq!(store.statements().len(), 2);
    assert!(store_conforms(&store));
}

#[test]
fn without_escalation_both_racing_commits_succeed() {
    let (failures, store) = racing_ages(false);
    assert_eq!(failures, 0);
    assert_eq!(store.statements().len(), 3);
    assert!(!store_conforms(&store));
}

#[test]
fn single_connection_skips_escalation() {
    let store = store_with(snapshot_config(true));
    load(&store, person_age_shape(None, Some(1)));
    load(&store, vec![typed("peter", "Person")]);

    let mut conn = store.connection().unwrap();
    conn.begin().unwrap();
    conn.add(triple(ex("peter"), ex("age"), Term::integer(20))).unwrap();
    conn.commit().unwrap();
    assert!(!conn.last_validation_stats().unwrap().escalated);
}

#[test]
fn escalated_validation_matches_plain_validation() {
    let store = store_with(snapshot_config(true));
    load(&store, person_age_shape(None, Some(1)));
    load(&store, vec![typed("peter", "Person")]);
    let _other = store.connection().unwrap();

    let mut conn = store.connection().unwrap();
    conn.begin().unwrap();
    conn.add(triple(ex("peter"), ex("age"), Term::integer(20))).unwrap();
    conn.add(triple(ex("peter"), ex("age"), Term::integer(30))).unwrap();
    let err = conn.commit().unwrap_err();
    assert!(conn.last_validation_stats().unwrap().escalated);
    assert_eq!(err.report().unwrap().results().len(), 1);
}

#[test]
fn same_thread_lock_conflict_fails_fast() {
    let store = store_with(config());
    load(&store, person_age_shape(None, Some(1)));
    load(&store, vec![typed("peter", "Person")]);

    // A shape change takes the exclusive lock at prepare
    let mut shapes_conn = store.connection().unwrap();
    shapes_conn.begin().unwrap();
    shapes_conn
        .add(shape(Term::blank("age"), sh::MIN_COUNT, Term::integer(0)))
        .unwrap();
    shapes_conn.prepare().unwrap();

    let mut data_conn = store.connection().unwrap();
    data_conn.begin().unwrap();
    data_conn
        .add(triple(ex("peter"), ex("age"), Term::integer(20)))
        .unwrap();
    let err = data_conn.commit().unwrap_err();
    assert!(err.is_conflict());

    shapes_conn.commit().unwrap();
    assert_eq!(store.shapes().len(), 2);
    load(&store, vec![triple(ex("peter"), ex("age"), Term::integer(20))]);
}

#[test]
fn concurrent_valid_commits_all_succeed() {
    let store = store_with(config());
    load(&store, person_age_shape(Some(1), Some(1)));
    load(&store, vec![triple(ex("seed"), ex("p"), ex("o"))]);

    let barrier = Arc::new(Barrier::new(4));
    let handles: Vec<_> = (0..4)
        .map(|t| {
            let store = store.clone();
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                let mut conn = store.connection().unwrap();
                barrier.wait();
                for i in 0..5 {
                    let node = format!("p{}_{}", t, i);
                    conn.begin().unwrap();
                    conn.add(typed(&node, "Person")).unwrap();
                    conn.add(triple(ex(&node), ex("age"), Term::integer(i))).unwrap();
                    conn.commit().unwrap();
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }
    assert_eq!(store.statements().len(), 1 + 4 * 5 * 2);
    assert!(store_conforms(&store));
}

/// A shape with a single `maxCount 1` property on `name`
fn max_one_name_shape(shape_name: &str, class: &str) -> Vec<Statement> {
    let name = Term::blank(format!("{}_name", shape_name));
    vec![
        shape(ex(shape_name), sh::TARGET_CLASS, ex(class)),
        shape(ex(shape_name), sh::PROPERTY, name.clone()),
        shape(name.clone(), sh::PATH, ex("name")),
        shape(name, sh::MAX_COUNT, Term::integer(1)),
    ]
}

fn two_names(node: &str, class: &str) -> Vec<Statement> {
    vec![
        typed(node, class),
        triple(ex(node), ex("name"), Term::string("a")),
        triple(ex(node), ex("name"), Term::string("b")),
    ]
}

#[test]
fn interleaved_shape_commits_are_both_enforced() {
    let store = store_with(config());
    let mut dogs = store.connection().unwrap();
    let mut cats = store.connection().unwrap();
    dogs.begin().unwrap();
    cats.begin().unwrap();

    for st in max_one_name_shape("CatShape", "Cat") {
        cats.add(st).unwrap();
    }
    cats.commit().unwrap();

    for st in max_one_name_shape("DogShape", "Dog") {
        dogs.add(st).unwrap();
    }
    dogs.commit().unwrap();

    assert_eq!(store.shape_statements().len(), 8);
    assert_eq!(store.shapes().len(), 4);

    for (node, class) in [("tom", "Cat"), ("rex", "Dog")] {
        let mut conn = store.connection().unwrap();
        conn.begin().unwrap();
        for st in two_names(node, class) {
            conn.add(st).unwrap();
        }
        let results = commit_outcome(conn.commit()).expect("two names must be rejected");
        assert_eq!(results.len(), 1);
    }
    assert!(store.statements().is_empty());
}

#[test]
fn serializable_shape_conflict_leaves_data_uncommitted() {
    let store = store_with(config());
    let mut late = store.connection().unwrap();
    late.begin_with(TransactionSettings::with_isolation(IsolationLevel::Serializable))
        .unwrap();

    load(&store, max_one_name_shape("CatShape", "Cat"));
    let generation = store.shapes_generation();

    late.add(triple(ex("x"), ex("p"), ex("y"))).unwrap();
    for st in max_one_name_shape("DogShape", "Dog") {
        late.add(st).unwrap();
    }
    let err = late.commit().unwrap_err();
    assert!(err.is_conflict());
    assert_eq!(late.state(), ConnectionState::Inactive);

    assert!(store.statements().is_empty());
    assert_eq!(store.shape_statements().len(), 4);
    assert_eq!(store.shapes().len(), 2);
    assert_eq!(store.shapes_generation(), generation);

    // the data side is still writable afterwards
    load(&store, vec![triple(ex("x"), ex("p"), ex("y"))]);
    assert_eq!(store.statements().len(), 1);
}
