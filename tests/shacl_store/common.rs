//! Shared helpers for the integration suite.

#![allow(dead_code)]

pub use shaclstore::vocab::{rdf, rdfs, sh, xsd, SHAPES_GRAPH};
pub use shaclstore::{
    ConnectionState, IsolationLevel, PerformanceHint, ShaclConfig, ShaclError, ShaclStore,
    Statement, Term, TransactionSettings, ValidationApproach, ValidationReport,
};
use std::sync::Once;

pub const EX: &str = "http://example.com/ns#";

static TRACING: Once = Once::new();

/// Route `tracing` output through the test harness' captured writer
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_test_writer()
            .with_max_level(tracing::Level::DEBUG)
            .try_init();
    });
}

pub fn ex(local: &str) -> Term {
    Term::iri(format!("{}{}", EX, local))
}

pub fn triple(s: Term, p: Term, o: Term) -> Statement {
    Statement::new(s, p, o)
}

pub fn typed(node: &str, class: &str) -> Statement {
    triple(ex(node), Term::iri(rdf::TYPE), ex(class))
}

/// A statement in the shapes graph
pub fn shape(s: Term, p: &str, o: Term) -> Statement {
    Statement::in_graph(s, Term::iri(p), o, Term::iri(SHAPES_GRAPH))
}

/// `PersonShape`: every `Person` has between `min` and `max` `age` values
pub fn person_age_shape(min: Option<i64>, max: Option<i64>) -> Vec<Statement> {
    let age = Term::blank("age");
    let mut out = vec![
        shape(ex("PersonShape"), sh::TARGET_CLASS, ex("Person")),
        shape(ex("PersonShape"), sh::PROPERTY, age.clone()),
        shape(age.clone(), sh::PATH, ex("age")),
    ];
    if let Some(min) = min {
        out.push(shape(age.clone(), sh::MIN_COUNT, Term::integer(min)));
    }
    if let Some(max) = max {
        out.push(shape(age, sh::MAX_COUNT, Term::integer(max)));
    }
    out
}

pub fn config() -> ShaclConfig {
    ShaclConfig::default()
}

pub fn store_with(config: ShaclConfig) -> ShaclStore {
    init_tracing();
    ShaclStore::new(config).expect("Failed to create store")
}

/// Commit `statements` in one validated transaction
pub fn load(store: &ShaclStore, statements: impl IntoIterator<Item = Statement>) {
    let mut conn = store.connection().unwrap();
    conn.begin().unwrap();
    for st in statements {
        conn.add(st).unwrap();
    }
    conn.commit().unwrap();
}

/// Commit `statements` with validation turned off for the transaction
pub fn load_unvalidated(store: &ShaclStore, statements: impl IntoIterator<Item = Statement>) {
    let mut conn = store.connection().unwrap();
    conn.begin_with(TransactionSettings::default().approach(ValidationApproach::Disabled))
        .unwrap();
    for st in statements {
        conn.add(st).unwrap();
    }
    conn.commit().unwrap();
}

/// Whether the committed state conforms to every published shape
pub fn store_conforms(store: &ShaclStore) -> bool {
    let mut conn = store.connection().unwrap();
    conn.begin().unwrap();
    let report = conn.revalidate().unwrap();
    conn.rollback().unwrap();
    report.conforms()
}

/// Results rendered and sorted so reports from different passes compare
pub fn summary(report: &ValidationReport) -> Vec<String> {
    let mut out: Vec<String> = report.results().iter().map(|r| r.to_string()).collect();
    out.sort();
    out
}

/// Outcome of a commit: `None` when it succeeded, the sorted results when
/// validation failed. Any other error panics.
pub fn commit_outcome(result: Result<(), ShaclError>) -> Option<Vec<String>> {
    match result {
        Ok(()) => None,
        Err(ShaclError::ValidationFailed(report)) => Some(summary(&report)),
        Err(other) => panic!("unexpected commit error: {}", other),
    }
}
