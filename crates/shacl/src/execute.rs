//! Shape plan execution
//!
//! Generates one plan per shape, drops the statically empty ones, and pulls
//! the rest serially or on the validation worker pool. Each shape's tuples
//! become [`ValidationResult`]s, capped by the per-constraint limit; the
//! report applies the total limit.

use crate::connections::ConnectionsGroup;
use crate::error::{Result, ShaclError};
use crate::plan::{generate_plan, PlanNode};
use crate::report::{ValidationReport, ValidationResult};
use crate::settings::{ResultLimits, ValidationSettings, ValidationStats};
use crate::shape::Shape;
use shaclstore_concurrency::ValidationExecutor;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

struct ShapeOutcome {
    results: Vec<ValidationResult>,
    truncated: bool,
}

/// Validate `shapes` against the views in `group`.
///
/// Plans run on `executor` when one is given and more than one shape has a
/// non-empty plan. Any failure while pulling a plan aborts the pass with a
/// [`ShaclError::ShapeFault`] naming the shape.
pub fn validate_shapes(
    shapes: &[Arc<Shape>],
    group: &ConnectionsGroup<'_>,
    settings: &ValidationSettings,
    limits: ResultLimits,
    executor: Option<&ValidationExecutor>,
) -> Result<(ValidationReport, ValidationStats)> {
    let start = Instant::now();
    let mut stats = ValidationStats {
        bulk: group.is_bulk(),
        validate_entire: settings.validate_entire,
        shapes_total: shapes.len(),
        ..ValidationStats::default()
    };

    let plans: Vec<(Arc<Shape>, PlanNode)> = shapes
        .iter()
        .map(|shape| (Arc::clone(shape), generate_plan(shape, group, settings.validate_entire)))
        .filter(|(_, plan)| !plan.is_guaranteed_empty())
        .collect();
    stats.shapes_validated = plans.len();
    stats.shapes_skipped = shapes.len() - plans.len();

    if settings.log_plans {
        for (shape, plan) in &plans {
            info!(target: "shaclstore::validation", shape = %shape.id, "Validation plan:\n{}", plan);
        }
    }

    let run = |(shape, plan): &(Arc<Shape>, PlanNode)| run_shape(shape, plan, group, limits, settings);
    let outcomes = match executor {
        Some(executor) if plans.len() > 1 => {
            stats.parallel = true;
            executor.map(&plans, run)?
        }
        _ => plans.iter().map(run).collect::<Result<Vec<_>>>()?,
    };

    let truncated = outcomes.iter().any(|o| o.truncated);
    stats.tuples = outcomes.iter().map(|o| o.results.len()).sum();
    let report = ValidationReport::from_shape_results(outcomes.into_iter().map(|o| o.results), limits, truncated);

    if settings.log_violations {
        for result in report.results() {
            info!(target: "shaclstore::validation", "SHACL violation: {}", result);
        }
    }

    stats.cache_hits = group.cache_hits();
    stats.cache_misses = group.cache_misses();
    stats.elapsed = start.elapsed();
    if settings.performance_logging {
        info!(
            target: "shaclstore::validation",
            shapes = stats.shapes_validated,
            skipped = stats.shapes_skipped,
            parallel = stats.parallel,
            elapsed_ms = stats.elapsed.as_millis() as u64,
            "Validation pass finished"
        );
    }
    debug!(
        target: "shaclstore::validation",
        conforms = report.conforms(),
        results = report.results().len(),
        truncated = report.truncated(),
        "Validation report assembled"
    );
    Ok((report, stats))
}

fn run_shape(
    shape: &Arc<Shape>,
    plan: &PlanNode,
    group: &ConnectionsGroup<'_>,
    limits: ResultLimits,
    settings: &ValidationSettings,
) -> Result<ShapeOutcome> {
    let start = Instant::now();
    let mut results = Vec::new();
    let mut truncated = false;
    for item in plan.execute(group).map_err(|e| fault(shape, e))? {
        let tuple = item.map_err(|e| fault(shape, e))?;
        if limits.per_constraint.map_or(false, |limit| results.len() >= limit) {
            truncated = true;
            break;
        }
        results.push(ValidationResult::for_shape(shape, tuple.focus, tuple.value, tuple.details));
    }
    if settings.performance_logging {
        info!(
            target: "shaclstore::validation",
            shape = %shape.id,
            component = shape.constraint.component().local_name(),
            results = results.len(),
            elapsed_us = start.elapsed().as_micros() as u64,
            "Shape validated"
        );
    }
    Ok(ShapeOutcome { results, truncated })
}

fn fault(shape: &Shape, err: ShaclError) -> ShaclError {
    match err {
        ShaclError::ShapeFault { .. } => err,
        other => ShaclError::ShapeFault {
            shape_id: shape.id.to_string(),
            shape_text: shape.text().to_string(),
            message: other.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::materialize::{DiffMaterializer, MaterializedDiff};
    use crate::shape::{Constraint, ConstraintComponent, Path, Severity, Target};
    use shaclstore_concurrency::FinalizedDiff;
    use shaclstore_core::vocab::{rdf, xsd};
    use shaclstore_core::{GraphFilter, Statement, Term};
    use shaclstore_storage::MemoryStore;

    fn iri(s: &str) -> Term {
        Term::iri(format!("http://ex/{}", s))
    }

    fn typed(s: &str, ty: &str) -> Statement {
        Statement::new(iri(s), Term::iri(rdf::TYPE), iri(ty))
    }

    fn age(s: &str, n: i64) -> Statement {
        Statement::new(iri(s), iri("age"), Term::integer(n))
    }

    fn age_shape(constraint: Constraint) -> Arc<Shape> {
        Arc::new(Shape::new(
            Term::blank("age"),
            iri("PersonShape"),
            Arc::from(vec![Target::Class(iri("Person"))]),
            Some(Path::Predicate(iri("age"))),
            constraint,
            Severity::Violation,
            None,
        ))
    }

    fn run(
        data: Vec<Statement>,
        diff: &MaterializedDiff,
        shapes: &[Arc<Shape>],
        settings: ValidationSettings,
    ) -> (ValidationReport, ValidationStats) {
        let store = MemoryStore::with_statements("base", data);
        let snapshot = store.snapshot();
        let group = ConnectionsGroup::new(&snapshot, None, diff, None, GraphFilter::Any, true);
        validate_shapes(shapes, &group, &settings, ResultLimits::default(), None).unwrap()
    }

    fn incremental(added: Vec<Statement>, removed: Vec<Statement>) -> MaterializedDiff {
        let diff = FinalizedDiff::from_sets(added.into_iter().collect(), removed.into_iter().collect());
        DiffMaterializer::new(None, None).materialize(&diff).unwrap()
    }

    #[test]
    fn test_max_count_violation() {
        let data = vec![typed("peter", "Person"), age("peter", 20), age("peter", 30)];
        let diff = incremental(data.clone(), vec![]);
        let (report, stats) = run(
            data,
            &diff,
            &[age_shape(Constraint::MaxCount(1))],
            ValidationSettings::default(),
        );
        assert!(!report.conforms());
        assert_eq!(report.results().len(), 1);
        let result = &report.results()[0];
        assert_eq!(result.component, ConstraintComponent::MaxCount);
        assert_eq!(result.focus_node, iri("peter"));
        assert_eq!(result.path, Some(Path::Predicate(iri("age"))));
        assert_eq!(stats.shapes_validated, 1);
    }

    #[test]
    fn test_untargeted_values_conform() {
        let data = vec![age("peter", 20)];
        let diff = incremental(data.clone(), vec![]);
        let (report, _) = run(
            data,
            &diff,
            &[age_shape(Constraint::MinCount(1))],
            ValidationSettings::default(),
        );
        assert!(report.conforms());
    }

    #[test]
    fn test_empty_diff_skips_shapes() {
        let data = vec![typed("peter", "Person")];
        let diff = incremental(vec![], vec![]);
        let (report, stats) = run(
            data,
            &diff,
            &[age_shape(Constraint::MinCount(1))],
            ValidationSettings::default(),
        );
        assert!(report.conforms());
        assert_eq!(stats.shapes_skipped, 1);
        assert_eq!(stats.shapes_validated, 0);
    }

    #[test]
    fn test_validate_entire_finds_old_violations() {
        let data = vec![typed("peter", "Person")];
        let diff = incremental(vec![], vec![]);
        let settings = ValidationSettings {
            validate_entire: true,
            ..ValidationSettings::default()
        };
        let (report, _) = run(data, &diff, &[age_shape(Constraint::MinCount(1))], settings);
        assert_eq!(report.results().len(), 1);
        assert_eq!(report.results()[0].value, None);
    }

    #[test]
    fn test_removed_value_revalidates_focus() {
        let data = vec![typed("peter", "Person")];
        let diff = incremental(vec![], vec![age("peter", 20)]);
        let (report, _) = run(
            data,
            &diff,
            &[age_shape(Constraint::MinCount(1))],
            ValidationSettings::default(),
        );
        assert_eq!(report.results().len(), 1);
    }

    #[test]
    fn test_datatype_reports_value() {
        let bad = Statement::new(iri("peter"), iri("age"), Term::string("old"));
        let data = vec![typed("peter", "Person"), bad.clone()];
        let diff = incremental(vec![bad], vec![]);
        let (report, _) = run(
            data,
            &diff,
            &[age_shape(Constraint::Datatype(Term::iri(xsd::INTEGER)))],
            ValidationSettings::default(),
        );
        assert_eq!(report.results().len(), 1);
        assert_eq!(report.results()[0].value, Some(Term::string("old")));
    }

    #[test]
    fn test_per_constraint_limit_truncates() {
        let data: Vec<Statement> = (0..5).map(|i| typed(&format!("p{}", i), "Person")).collect();
        let store = MemoryStore::with_statements("base", data);
        let snapshot = store.snapshot();
        let group = ConnectionsGroup::new(&snapshot, None, &MaterializedDiff::Bulk, None, GraphFilter::Any, false);
        let settings = ValidationSettings {
            validate_entire: true,
            ..ValidationSettings::default()
        };
        let limits = ResultLimits::from_signed(-1, 2);
        let (report, _) = validate_shapes(
            &[age_shape(Constraint::MinCount(1))],
            &group,
            &settings,
            limits,
            None,
        )
        .unwrap();
        assert_eq!(report.results().len(), 2);
        assert!(report.truncated());
        assert!(!report.conforms());
    }

    #[test]
    fn test_parallel_matches_serial() {
        let mut data = Vec::new();
        for i in 0..20 {
            data.push(typed(&format!("p{}", i), "Person"));
            data.push(age(&format!("p{}", i), i));
            if i % 3 == 0 {
                data.push(age(&format!("p{}", i), 100 + i));
            }
        }
        let shapes = vec![
            age_shape(Constraint::MaxCount(1)),
            age_shape(Constraint::MinCount(1)),
            age_shape(Constraint::Datatype(Term::iri(xsd::INTEGER))),
        ];
        let store = MemoryStore::with_statements("base", data);
        let snapshot = store.snapshot();
        let settings = ValidationSettings {
            validate_entire: true,
            ..ValidationSettings::default()
        };
        let executor = ValidationExecutor::new(2);

        let group = ConnectionsGroup::new(&snapshot, None, &MaterializedDiff::Bulk, None, GraphFilter::Any, true);
        let (serial, _) = validate_shapes(&shapes, &group, &settings, ResultLimits::default(), None).unwrap();
        let group = ConnectionsGroup::new(&snapshot, None, &MaterializedDiff::Bulk, None, GraphFilter::Any, true);
        let (parallel, stats) =
            validate_shapes(&shapes, &group, &settings, ResultLimits::default(), Some(&executor)).unwrap();
        assert!(stats.parallel);
        assert_eq!(serial, parallel);
        assert_eq!(serial.results().len(), 7);
    }
}
