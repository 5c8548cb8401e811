//! Canonical validation scenarios

use crate::common::*;
use shaclstore::{ConstraintComponent, Path};

fn peter_with_two_ages() -> Vec<Statement> {
    vec![
        typed("peter", "Person"),
        triple(ex("peter"), ex("age"), Term::integer(20)),
        triple(ex("peter"), ex("age"), Term::integer(30)),
    ]
}

fn assert_single_max_count_violation(report: &ValidationReport) {
    assert!(!report.conforms());
    assert_eq!(report.results().len(), 1);
    let result = &report.results()[0];
    assert_eq!(result.component, ConstraintComponent::MaxCount);
    assert_eq!(result.path, Some(Path::Predicate(ex("age"))));
    assert_eq!(result.focus_node, ex("peter"));
}

// ============================================================================
// Scenario A: too many values
// ============================================================================

#[test]
fn two_ages_fail_with_one_max_count_violation() {
    let store = store_with(config());
    load(&store, person_age_shape(Some(1), Some(1)));

    let mut conn = store.connection().unwrap();
    conn.begin().unwrap();
    for st in peter_with_two_ages() {
        conn.add(st).unwrap();
    }
    let err = conn.commit().unwrap_err();
    assert_single_max_count_violation(err.report().unwrap());
    assert!(store.statements().is_empty());
}

#[test]
fn two_ages_fail_incrementally_on_populated_store() {
    let store = store_with(config());
    load(&store, person_age_shape(Some(1), Some(1)));
    load(&store, vec![triple(ex("unrelated"), ex("p"), ex("o"))]);

    let mut conn = store.connection().unwrap();
    conn.begin().unwrap();
    for st in peter_with_two_ages() {
        conn.add(st).unwrap();
    }
    let err = conn.commit().unwrap_err();
    assert_single_max_count_violation(err.report().unwrap());

    let stats = conn.last_validation_stats().unwrap();
    assert!(!stats.bulk);
    assert!(!stats.validate_entire);
    assert_eq!(stats.added, 3);
    assert_eq!(store.statements().len(), 1);
}

#[test]
fn prepared_failure_leaves_transaction_open_until_rollback() {
    let store = store_with(config());
    load(&store, person_age_shape(Some(1), Some(1)));

    let mut conn = store.connection().unwrap();
    conn.begin().unwrap();
    for st in peter_with_two_ages() {
        conn.add(st).unwrap();
    }
    let err = conn.prepare().unwrap_err();
    assert!(err.is_validation_failure());
    assert_eq!(conn.state(), ConnectionState::Failed);
    conn.rollback().unwrap();
    assert_eq!(conn.state(), ConnectionState::Inactive);
}

// ============================================================================
// Scenario B: untargeted data
// ============================================================================

#[test]
fn age_without_type_conforms() {
    let store = store_with(config());
    load(&store, person_age_shape(Some(1), Some(1)));
    load(&store, vec![triple(ex("unrelated"), ex("p"), ex("o"))]);

    let mut conn = store.connection().unwrap();
    conn.begin().unwrap();
    conn.add(triple(ex("peter"), ex("age"), Term::integer(20))).unwrap();
    let report = conn.revalidate().unwrap();
    assert!(report.conforms());
    assert!(report.results().is_empty());
    conn.commit().unwrap();
    assert_eq!(store.statements().len(), 2);
}

#[test]
fn fixing_a_violation_in_the_same_transaction_conforms() {
    let store = store_with(config());
    load(&store, person_age_shape(Some(1), Some(1)));
    load(&store, vec![typed("peter", "Person"), triple(ex("peter"), ex("age"), Term::integer(20))]);

    let mut conn = store.connection().unwrap();
    conn.begin().unwrap();
    conn.add(triple(ex("peter"), ex("age"), Term::integer(30))).unwrap();
    conn.remove(&triple(ex("peter"), ex("age"), Term::integer(20))).unwrap();
    conn.commit().unwrap();

    let stats = conn.last_validation_stats().unwrap();
    assert_eq!((stats.added, stats.removed), (1, 1));
}

#[test]
fn add_then_remove_is_a_no_op() {
    let store = store_with(config());
    load(&store, person_age_shape(Some(1), Some(1)));
    load(&store, vec![typed("peter", "Person"), triple(ex("peter"), ex("age"), Term::integer(20))]);

    let mut conn = store.connection().unwrap();
    conn.begin().unwrap();
    let extra = triple(ex("peter"), ex("age"), Term::integer(30));
    conn.add(extra.clone()).unwrap();
    conn.remove(&extra).unwrap();
    conn.commit().unwrap();
    assert_eq!(store.statements().len(), 2);
}

// ============================================================================
// Scenario C: subclass reasoning
// ============================================================================

fn student_is_person() -> Statement {
    triple(ex("Student"), Term::iri(rdfs::SUB_CLASS_OF), ex("Person"))
}

#[test]
fn subclass_instances_are_targets_with_reasoning() {
    let store = store_with(config());
    load(&store, person_age_shape(Some(1), None));
    load(&store, vec![student_is_person()]);

    let mut conn = store.connection().unwrap();
    conn.begin().unwrap();
    conn.add(typed("alice", "Student")).unwrap();
    let err = conn.commit().unwrap_err();
    let report = err.report().unwrap();
    assert_eq!(report.results().len(), 1);
    assert_eq!(report.results()[0].component, ConstraintComponent::MinCount);
    assert_eq!(report.results()[0].focus_node, ex("alice"));
}

#[test]
fn subclass_instances_are_targets_in_bulk() {
    let store = store_with(config());
    load(&store, person_age_shape(Some(1), None));

    let mut conn = store.connection().unwrap();
    conn.begin().unwrap();
    conn.add(student_is_person()).unwrap();
    conn.add(typed("alice", "Student")).unwrap();
    let err = conn.commit().unwrap_err();
    assert_eq!(err.report().unwrap().results()[0].focus_node, ex("alice"));
    assert!(conn.last_validation_stats().unwrap().bulk);
}

#[test]
fn subclass_instances_are_ignored_without_reasoning() {
    let store = store_with(ShaclConfig {
        rdfs_subclass_reasoning: false,
        ..config()
    });
    load(&store, person_age_shape(Some(1), None));
    load(&store, vec![student_is_person()]);
    load(&store, vec![typed("alice", "Student")]);
    assert_eq!(store.statements().len(), 2);
}

#[test]
fn new_subclass_axiom_revalidates_existing_instances() {
    let store = store_with(config());
    load(&store, person_age_shape(Some(1), None));
    load(&store, vec![typed("bob", "Student")]);

    let mut conn = store.connection().unwrap();
    conn.begin().unwrap();
    conn.add(student_is_person()).unwrap();
    let err = conn.commit().unwrap_err();
    assert_eq!(err.report().unwrap().results()[0].focus_node, ex("bob"));
    assert!(conn.last_validation_stats().unwrap().validate_entire);
}

// ============================================================================
// Scenario D: shape refresh narrows revalidation
// ============================================================================

fn person_shapes(max_age: i64) -> Vec<Statement> {
    let age = Term::blank("age");
    let name = Term::blank("name");
    vec![
        shape(ex("PersonShape"), sh::TARGET_CLASS, ex("Person")),
        shape(ex("PersonShape"), sh::PROPERTY, age.clone()),
        shape(age.clone(), sh::PATH, ex("age")),
        shape(age, sh::MAX_COUNT, Term::integer(max_age)),
        shape(ex("PersonShape"), sh::PROPERTY, name.clone()),
        shape(name.clone(), sh::PATH, ex("name")),
        shape(name, sh::MIN_COUNT, Term::integer(1)),
    ]
}

fn seeded_person_store() -> ShaclStore {
    let store = store_with(config());
    load(&store, person_shapes(2));
    let mut data = peter_with_two_ages();
    data.push(triple(ex("peter"), ex("name"), Term::string("Peter")));
    load(&store, data);
    assert_eq!(store.shapes().len(), 2);
    store
}

#[test]
fn changed_shape_is_the_only_one_revalidated() {
    let store = seeded_person_store();
    let generation = store.shapes_generation();

    let mut conn = store.connection().unwrap();
    conn.begin().unwrap();
    conn.remove(&shape(Term::blank("age"), sh::MAX_COUNT, Term::integer(2)))
        .unwrap();
    conn.add(shape(Term::blank("age"), sh::MAX_COUNT, Term::integer(1)))
        .unwrap();

    let full = conn.revalidate().unwrap();
    assert_eq!(conn.last_validation_stats().unwrap().shapes_total, 2);

    let err = conn.commit().unwrap_err();
    let narrowed = err.report().unwrap();
    assert_eq!(summary(narrowed), summary(&full));
    assert_single_max_count_violation(narrowed);

    let stats = conn.last_validation_stats().unwrap();
    assert_eq!(stats.shapes_total, 1);
    assert!(stats.validate_entire);
    assert_eq!(store.shapes_generation(), generation);
}

#[test]
fn removing_and_readding_a_shape_triple_validates_nothing() {
    let store = seeded_person_store();
    let generation = store.shapes_generation();
    let triple = shape(Term::blank("age"), sh::MAX_COUNT, Term::integer(2));

    let mut conn = store.connection().unwrap();
    conn.begin().unwrap();
    conn.remove(&triple).unwrap();
    conn.add(triple).unwrap();
    conn.commit().unwrap();

    assert_eq!(store.shapes().len(), 2);
    assert_eq!(store.shapes_generation(), generation + 1);
    assert!(store_conforms(&store));
}

#[test]
fn new_shape_is_checked_against_existing_data() {
    let store = seeded_person_store();

    let mut conn = store.connection().unwrap();
    conn.begin().unwrap();
    let nick = Term::blank("nick");
    conn.add(shape(ex("PersonShape"), sh::PROPERTY, nick.clone())).unwrap();
    conn.add(shape(nick.clone(), sh::PATH, ex("nick"))).unwrap();
    conn.add(shape(nick, sh::MIN_COUNT, Term::integer(1))).unwrap();
    let err = conn.commit().unwrap_err();

    let report = err.report().unwrap();
    assert_eq!(report.results().len(), 1);
    assert_eq!(report.results()[0].path, Some(Path::Predicate(ex("nick"))));
    assert_eq!(store.shapes().len(), 2);
}

#[test]
fn deactivated_shape_is_not_enforced() {
    let store = store_with(config());
    let mut shapes = person_age_shape(None, Some(1));
    shapes.push(shape(ex("PersonShape"), sh::DEACTIVATED, Term::boolean(true)));
    load(&store, shapes);
    assert!(store.shapes().is_empty());
    load(&store, peter_with_two_ages());
}
