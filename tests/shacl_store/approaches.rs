//! Bulk, incremental and tuning choices must not change the report

use crate::common::*;
use proptest::prelude::*;

fn no_reasoning() -> ShaclConfig {
    ShaclConfig {
        rdfs_subclass_reasoning: false,
        ..config()
    }
}

/// Person: at most one integer `age`, at least one `name`, and everyone
/// they `know` is a Person
fn person_shapes() -> Vec<Statement> {
    let age = Term::blank("age");
    let name = Term::blank("name");
    let knows = Term::blank("knows");
    vec![
        shape(ex("PersonShape"), sh::TARGET_CLASS, ex("Person")),
        shape(ex("PersonShape"), sh::PROPERTY, age.clone()),
        shape(age.clone(), sh::PATH, ex("age")),
        shape(age.clone(), sh::MAX_COUNT, Term::integer(1)),
        shape(age, sh::DATATYPE, Term::iri(xsd::INTEGER)),
        shape(ex("PersonShape"), sh::PROPERTY, name.clone()),
        shape(name.clone(), sh::PATH, ex("name")),
        shape(name, sh::MIN_COUNT, Term::integer(1)),
        shape(ex("PersonShape"), sh::PROPERTY, knows.clone()),
        shape(knows.clone(), sh::PATH, ex("knows")),
        shape(knows, sh::CLASS, ex("Person")),
    ]
}

fn person(node: &str) -> Vec<Statement> {
    vec![
        typed(node, "Person"),
        triple(ex(node), ex("name"), Term::string(node)),
        triple(ex(node), ex("age"), Term::integer(40)),
    ]
}

fn seeded(config: ShaclConfig) -> ShaclStore {
    let store = store_with(config);
    load(&store, person_shapes());
    let mut data = person("ann");
    data.extend(person("bob"));
    data.push(triple(ex("ann"), ex("knows"), ex("bob")));
    load(&store, data);
    store
}

/// One violating transaction: a second age, a dropped name, a string age,
/// and a friend who stops being a Person
fn violating_changes() -> (Vec<Statement>, Vec<Statement>) {
    let added = vec![
        triple(ex("ann"), ex("age"), Term::integer(41)),
        typed("cid", "Person"),
        triple(ex("cid"), ex("name"), Term::string("cid")),
        triple(ex("cid"), ex("age"), Term::string("old")),
    ];
    let removed = vec![
        triple(ex("bob"), ex("name"), Term::string("bob")),
        typed("bob", "Person"),
    ];
    (added, removed)
}

fn run(store: &ShaclStore, settings: TransactionSettings, added: &[Statement], removed: &[Statement]) -> Option<Vec<String>> {
    let mut conn = store.connection().unwrap();
    conn.begin_with(settings).unwrap();
    for st in removed {
        conn.remove(st).unwrap();
    }
    for st in added {
        conn.add(st.clone()).unwrap();
    }
    commit_outcome(conn.commit())
}

#[test]
fn bulk_and_incremental_report_the_same_violations() {
    let (added, removed) = violating_changes();

    let incremental = run(&seeded(no_reasoning()), TransactionSettings::default(), &added, &removed);
    let bulk = run(
        &seeded(no_reasoning()),
        TransactionSettings::default().approach(ValidationApproach::Bulk),
        &added,
        &removed,
    );
    assert!(incremental.is_some());
    assert_eq!(incremental, bulk);
    // ann: second age; cid: string age; bob: no longer a Person, so ann's
    // knows value fails and bob's missing name is not reported
    assert_eq!(incremental.map(|r| r.len()), Some(3));
}

#[test]
fn loading_into_empty_store_matches_statement_by_statement_loading() {
    let (mut statements, _) = violating_changes();
    statements.extend(person("dan"));
    statements.push(triple(ex("dan"), ex("knows"), ex("eve")));

    let empty = store_with(no_reasoning());
    load(&empty, person_shapes());
    let mut conn = empty.connection().unwrap();
    conn.begin().unwrap();
    for st in &statements {
        conn.add(st.clone()).unwrap();
    }
    let bulk = commit_outcome(conn.commit());
    assert!(conn.last_validation_stats().unwrap().bulk);

    // One unrelated statement in a named graph keeps the second store out of
    // bulk mode without touching any target
    let tracked = store_with(no_reasoning());
    load(&tracked, person_shapes());
    load(
        &tracked,
        vec![Statement::in_graph(ex("x"), ex("y"), ex("z"), ex("elsewhere"))],
    );
    let mut conn = tracked.connection().unwrap();
    conn.begin().unwrap();
    for st in &statements {
        conn.add(st.clone()).unwrap();
    }
    let incremental = commit_outcome(conn.commit());
    assert!(!conn.last_validation_stats().unwrap().bulk);

    assert!(bulk.is_some());
    assert_eq!(bulk, incremental);
}

#[test]
fn cache_setting_does_not_change_results() {
    let (added, removed) = violating_changes();
    let store_cached = seeded(no_reasoning());
    let store_uncached = seeded(no_reasoning());

    let mut cached = store_cached.connection().unwrap();
    cached
        .begin_with(TransactionSettings::default().hint(PerformanceHint::CacheEnabled))
        .unwrap();
    let mut uncached = store_uncached.connection().unwrap();
    uncached
        .begin_with(TransactionSettings::default().hint(PerformanceHint::CacheDisabled))
        .unwrap();
    for conn in [&mut cached, &mut uncached] {
        for st in &removed {
            conn.remove(st).unwrap();
        }
        for st in &added {
            conn.add(st.clone()).unwrap();
        }
    }

    let with_cache = commit_outcome(cached.commit());
    let without_cache = commit_outcome(uncached.commit());
    assert_eq!(with_cache, without_cache);

    let stats = cached.last_validation_stats().unwrap();
    assert!(stats.cache_hits + stats.cache_misses > 0);
    let stats = uncached.last_validation_stats().unwrap();
    assert_eq!(stats.cache_hits + stats.cache_misses, 0);
}

#[test]
fn parallel_and_serial_report_the_same_violations() {
    let (added, removed) = violating_changes();
    let parallel = run(
        &seeded(no_reasoning()),
        TransactionSettings::default().hint(PerformanceHint::Parallel),
        &added,
        &removed,
    );
    let serial = run(
        &seeded(no_reasoning()),
        TransactionSettings::default().hint(PerformanceHint::Serial),
        &added,
        &removed,
    );
    assert_eq!(parallel, serial);
}

#[test]
fn exceeding_the_transactional_limit_keeps_the_report() {
    let (added, removed) = violating_changes();
    let incremental = run(&seeded(no_reasoning()), TransactionSettings::default(), &added, &removed);

    let store = seeded(ShaclConfig {
        transactional_validation_limit: 2,
        ..no_reasoning()
    });
    let mut conn = store.connection().unwrap();
    conn.begin().unwrap();
    for st in &removed {
        conn.remove(st).unwrap();
    }
    for st in &added {
        conn.add(st.clone()).unwrap();
    }
    let limited = commit_outcome(conn.commit());
    assert!(conn.last_validation_stats().unwrap().bulk);
    assert_eq!(incremental, limited);
}

#[test]
fn disabled_transaction_skips_validation() {
    let store = seeded(no_reasoning());
    let (added, removed) = violating_changes();
    let outcome = run(
        &store,
        TransactionSettings::default().approach(ValidationApproach::Disabled),
        &added,
        &removed,
    );
    assert_eq!(outcome, None);
    assert!(!store_conforms(&store));
}

#[test]
fn disabled_store_ignores_bulk_request() {
    let store = seeded(ShaclConfig {
        validation_enabled: false,
        ..no_reasoning()
    });
    let (added, removed) = violating_changes();
    let outcome = run(
        &store,
        TransactionSettings::default().approach(ValidationApproach::Bulk),
        &added,
        &removed,
    );
    assert_eq!(outcome, None);
}

// ============================================================================
// Property: bulk == incremental from any conforming starting point
// ============================================================================

#[derive(Debug, Clone)]
enum Fact {
    Person(u8),
    Name(u8),
    Age(u8, i64),
    TextAge(u8),
    Knows(u8, u8),
}

impl Fact {
    fn statement(&self) -> Statement {
        let node = |n: &u8| ex(&format!("n{}", n));
        match self {
            Fact::Person(n) => triple(node(n), Term::iri(rdf::TYPE), ex("Person")),
            Fact::Name(n) => triple(node(n), ex("name"), Term::string(format!("name{}", n))),
            Fact::Age(n, v) => triple(node(n), ex("age"), Term::integer(*v)),
            Fact::TextAge(n) => triple(node(n), ex("age"), Term::string("many")),
            Fact::Knows(a, b) => triple(node(a), ex("knows"), node(b)),
        }
    }
}

fn fact() -> impl Strategy<Value = Fact> {
    prop_oneof![
        (0u8..4).prop_map(Fact::Person),
        (0u8..4).prop_map(Fact::Name),
        (0u8..4, 0i64..3).prop_map(|(n, v)| Fact::Age(n, v)),
        (0u8..4).prop_map(Fact::TextAge),
        (0u8..4, 0u8..4).prop_map(|(a, b)| Fact::Knows(a, b)),
    ]
}

fn outcome_for(approach: Option<ValidationApproach>, base: &[Statement], changes: &[(bool, Statement)]) -> Option<Option<Vec<String>>> {
    let store = store_with(no_reasoning());
    load(&store, person_shapes());
    load_unvalidated(&store, base.iter().cloned());
    if !store_conforms(&store) {
        return None;
    }
    let mut settings = TransactionSettings::default();
    if let Some(approach) = approach {
        settings = settings.approach(approach);
    }
    let mut conn = store.connection().unwrap();
    conn.begin_with(settings).unwrap();
    for (add, st) in changes {
        if *add {
            conn.add(st.clone()).unwrap();
        } else {
            conn.remove(st).unwrap();
        }
    }
    Some(commit_outcome(conn.commit()))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn bulk_matches_incremental(
        base in prop::collection::vec(fact(), 0..12),
        changes in prop::collection::vec((any::<bool>(), fact()), 1..8),
    ) {
        let base: Vec<Statement> = base.iter().map(Fact::statement).collect();
        let changes: Vec<(bool, Statement)> = changes.iter().map(|(add, f)| (*add, f.statement())).collect();

        let incremental = outcome_for(None, &base, &changes);
        prop_assume!(incremental.is_some());
        let bulk = outcome_for(Some(ValidationApproach::Bulk), &base, &changes);
        prop_assert_eq!(incremental, bulk);
    }
}
