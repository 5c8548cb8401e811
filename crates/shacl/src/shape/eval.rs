//! Constraint evaluation against a view
//!
//! Plan nodes call into this module once they have narrowed the focus nodes
//! and fetched their values. Nested shapes are evaluated here recursively.

use super::{Constraint, NestedShape, Path};
use crate::error::Result;
use crate::report::ValidationResult;
use shaclstore_core::vocab::rdf;
use shaclstore_core::{GraphFilter, Pattern, Term};
use shaclstore_storage::StatementSource;

/// Where constraint checks read from
#[derive(Clone, Copy)]
pub(crate) struct EvalContext<'a> {
    pub view: &'a dyn StatementSource,
    pub include_inferred: bool,
    pub graph: &'a GraphFilter,
}

impl Path {
    /// Values reached from `focus`, sorted and deduplicated
    pub(crate) fn values(&self, focus: &Term, ctx: EvalContext<'_>) -> Result<Vec<Term>> {
        let base = Pattern::any()
            .predicate(self.predicate().clone())
            .graph(ctx.graph.clone());
        let mut values: Vec<Term> = match self {
            Path::Predicate(_) => ctx
                .view
                .statements(&base.subject(focus.clone()), false)?
                .into_iter()
                .map(|st| st.object)
                .collect(),
            Path::Inverse(_) => ctx
                .view
                .statements(&base.object(focus.clone()), false)?
                .into_iter()
                .map(|st| st.subject)
                .collect(),
        };
        values.sort_unstable();
        values.dedup();
        Ok(values)
    }

    /// Nodes that reach `value` through this path
    pub(crate) fn referrers(&self, value: &Term, ctx: EvalContext<'_>) -> Result<Vec<Term>> {
        Path::inverse_of(self).values(value, ctx)
    }

    fn inverse_of(path: &Path) -> Path {
        match path {
            Path::Predicate(p) => Path::Inverse(p.clone()),
            Path::Inverse(p) => Path::Predicate(p.clone()),
        }
    }
}

impl Constraint {
    /// Aggregate check over all values of one focus node; true if satisfied
    pub(crate) fn check_values(&self, values: &[Term]) -> bool {
        match self {
            Constraint::MinCount(n) => values.len() >= *n,
            Constraint::MaxCount(n) => values.len() <= *n,
            Constraint::HasValue(v) => values.contains(v),
            _ => true,
        }
    }

    /// Check one value. `None` if it conforms, otherwise the nested results
    /// explaining the failure (empty for simple constraints).
    pub(crate) fn check_value(
        &self,
        value: &Term,
        ctx: EvalContext<'_>,
    ) -> Result<Option<Vec<ValidationResult>>> {
        let ok = match self {
            Constraint::MinCount(_) | Constraint::MaxCount(_) | Constraint::HasValue(_) => true,
            Constraint::Datatype(dt) => match (value.as_literal(), dt.as_iri()) {
                (Some(lit), Some(dt)) => lit.datatype == dt,
                _ => false,
            },
            Constraint::Class(class) => {
                value.is_resource()
                    && ctx.view.has_statement(
                        &Pattern::any()
                            .subject(value.clone())
                            .predicate(Term::iri(rdf::TYPE))
                            .object(class.clone())
                            .graph(ctx.graph.clone()),
                        ctx.include_inferred,
                    )?
            }
            Constraint::NodeKind(kind) => kind.admits(value),
            Constraint::In(allowed) => allowed.contains(value),
            Constraint::MinLength(n) => value
                .lexical_form()
                .map_or(false, |s| s.chars().count() >= *n),
            Constraint::MaxLength(n) => value
                .lexical_form()
                .map_or(false, |s| s.chars().count() <= *n),
            Constraint::Not(shape) => !shape.validate_node(value, ctx)?.is_empty(),
            Constraint::Node(shape) => {
                let results = shape.validate_node(value, ctx)?;
                return Ok((!results.is_empty()).then_some(results));
            }
            Constraint::And(shapes) => {
                let mut results = Vec::new();
                for shape in shapes {
                    results.extend(shape.validate_node(value, ctx)?);
                }
                return Ok((!results.is_empty()).then_some(results));
            }
            Constraint::Or(shapes) => {
                let mut results = Vec::new();
                for shape in shapes {
                    let failed = shape.validate_node(value, ctx)?;
                    if failed.is_empty() {
                        return Ok(None);
                    }
                    results.extend(failed);
                }
                return Ok(Some(results));
            }
        };
        Ok(if ok { None } else { Some(Vec::new()) })
    }
}

impl NestedShape {
    /// Validate `node` against this shape and return every result
    pub(crate) fn validate_node(&self, node: &Term, ctx: EvalContext<'_>) -> Result<Vec<ValidationResult>> {
        let values = match &self.path {
            Some(path) => path.values(node, ctx)?,
            None => vec![node.clone()],
        };
        let mut results = Vec::new();
        for constraint in &self.constraints {
            if constraint.is_aggregate() {
                if !constraint.check_values(&values) {
                    results.push(self.result(constraint, node, None, Vec::new()));
                }
                continue;
            }
            for value in &values {
                if let Some(details) = constraint.check_value(value, ctx)? {
                    results.push(self.result(constraint, node, Some(value.clone()), details));
                }
            }
        }
        for property in &self.properties {
            results.extend(property.validate_node(node, ctx)?);
        }
        Ok(results)
    }

    fn result(
        &self,
        constraint: &Constraint,
        focus: &Term,
        value: Option<Term>,
        details: Vec<ValidationResult>,
    ) -> ValidationResult {
        ValidationResult {
            source_shape: self.id.clone(),
            component: constraint.component(),
            focus_node: focus.clone(),
            path: self.path.clone(),
            value,
            message: self
                .message
                .clone()
                .unwrap_or_else(|| constraint.default_message()),
            severity: self.severity,
            details,
        }
    }
}
