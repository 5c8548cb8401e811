//! Report rendering from a failed commit

use crate::common::*;
use shaclstore::vocab::sh;

fn failed_report() -> ValidationReport {
    let store = store_with(config());
    load(&store, person_age_shape(Some(1), Some(1)));

    let mut conn = store.connection().unwrap();
    conn.begin().unwrap();
    conn.add(typed("peter", "Person")).unwrap();
    conn.add(triple(ex("peter"), ex("age"), Term::integer(20))).unwrap();
    conn.add(triple(ex("peter"), ex("age"), Term::integer(30))).unwrap();
    match conn.commit() {
        Err(ShaclError::ValidationFailed(report)) => *report,
        other => panic!("expected a validation failure, got {:?}", other),
    }
}

#[test]
fn report_renders_as_json() {
    let json = failed_report().to_json().unwrap();
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(value["conforms"], serde_json::Value::Bool(false));
    assert!(json.contains("MaxCount"));
    assert!(json.contains("http://example.com/ns#peter"));
}

#[test]
fn report_renders_as_shacl_statements() {
    let statements = failed_report().to_statements();
    let conforms: Vec<_> = statements
        .iter()
        .filter(|st| st.predicate == Term::iri(sh::CONFORMS))
        .collect();
    assert_eq!(conforms.len(), 1);
    assert_eq!(conforms[0].object, Term::boolean(false));
    assert!(statements
        .iter()
        .any(|st| st.predicate == Term::iri(sh::FOCUS_NODE) && st.object == ex("peter")));
    assert!(statements.iter().any(|st| st.predicate == Term::iri(sh::SOURCE_CONSTRAINT_COMPONENT)
        && st.object == Term::iri(format!("{}MaxCountConstraintComponent", sh::NS))));
}

#[test]
fn report_display_names_the_violation() {
    let text = failed_report().to_string();
    assert!(text.contains("conforms=false"));
    assert!(text.contains("MaxCountConstraintComponent"));
}

#[test]
fn validation_failure_error_carries_the_count() {
    let err = ShaclError::ValidationFailed(Box::new(failed_report()));
    assert!(err.to_string().contains("1 violation"));
}
