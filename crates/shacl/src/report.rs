//! Validation report
//!
//! The report is the failure payload of a non-conforming transaction. Results
//! keep shape order; within one shape they follow plan order. The report can be
//! rendered as JSON or as a SHACL report graph.

use crate::shape::{ConstraintComponent, Path, Severity, Shape};
use crate::settings::ResultLimits;
use serde::Serialize;
use shaclstore_core::vocab::{rdf, sh};
use shaclstore_core::{Statement, Term};
use std::fmt;
use uuid::Uuid;

/// One violation record
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationResult {
    /// Shape that declared the constraint
    pub source_shape: Term,
    /// Constraint component that failed
    pub component: ConstraintComponent,
    /// Focus node
    pub focus_node: Term,
    /// Path of the property shape, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<Path>,
    /// Offending value; absent for cardinality failures
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<Term>,
    /// Human-readable message
    pub message: String,
    /// Severity
    pub severity: Severity,
    /// Results of nested shapes that caused this one
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub details: Vec<ValidationResult>,
}

impl ValidationResult {
    pub(crate) fn for_shape(
        shape: &Shape,
        focus_node: Term,
        value: Option<Term>,
        details: Vec<ValidationResult>,
    ) -> Self {
        Self {
            source_shape: shape.id.clone(),
            component: shape.constraint.component(),
            focus_node,
            path: shape.path.clone(),
            value,
            message: shape.message(),
            severity: shape.severity,
            details,
        }
    }

    fn write_statements(&self, node: &Term, out: &mut Vec<Statement>) {
        let mut props = vec![
            (rdf::TYPE, Term::iri(sh::VALIDATION_RESULT)),
            (sh::FOCUS_NODE, self.focus_node.clone()),
            (sh::SOURCE_SHAPE, self.source_shape.clone()),
            (sh::SOURCE_CONSTRAINT_COMPONENT, Term::iri(self.component.iri())),
            (sh::RESULT_SEVERITY, Term::iri(self.severity.iri())),
            (sh::RESULT_MESSAGE, Term::string(self.message.clone())),
        ];
        if let Some(value) = &self.value {
            props.push((sh::VALUE, value.clone()));
        }
        match &self.path {
            Some(Path::Predicate(p)) => props.push((sh::RESULT_PATH, p.clone())),
            Some(Path::Inverse(p)) => {
                let path_node = fresh_node();
                out.push(Statement::new(path_node.clone(), Term::iri(sh::INVERSE_PATH), p.clone()));
                props.push((sh::RESULT_PATH, path_node));
            }
            None => {}
        }
        for (predicate, object) in props {
            out.push(Statement::new(node.clone(), Term::iri(predicate), object));
        }
        for detail in &self.details {
            let detail_node = fresh_node();
            out.push(Statement::new(node.clone(), Term::iri(sh::DETAIL), detail_node.clone()));
            detail.write_statements(&detail_node, out);
        }
    }
}

impl fmt::Display for ValidationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} on {} (shape {}",
            self.component.local_name(),
            self.focus_node,
            self.source_shape
        )?;
        if let Some(path) = &self.path {
            write!(f, ", path {}", path)?;
        }
        if let Some(value) = &self.value {
            write!(f, ", value {}", value)?;
        }
        write!(f, "): {}", self.message)
    }
}

/// Outcome of a validation pass
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    conforms: bool,
    results: Vec<ValidationResult>,
    truncated: bool,
}

impl ValidationReport {
    /// Report with no results
    pub fn conforming() -> Self {
        Self {
            conforms: true,
            results: Vec::new(),
            truncated: false,
        }
    }

    /// Assemble a report from per-shape result lists.
    ///
    /// `truncated` says whether a per-constraint limit already dropped results
    /// upstream; the total limit is applied here.
    pub fn from_shape_results(
        per_shape: impl IntoIterator<Item = Vec<ValidationResult>>,
        limits: ResultLimits,
        mut truncated: bool,
    ) -> Self {
        let mut results = Vec::new();
        for shape_results in per_shape {
            results.extend(shape_results);
        }
        if let Some(total) = limits.total {
            if results.len() > total {
                results.truncate(total);
                truncated = true;
            }
        }
        Self {
            conforms: results.is_empty() && !truncated,
            results,
            truncated,
        }
    }

    /// True if no constraint was violated
    pub fn conforms(&self) -> bool {
        self.conforms
    }

    /// Violation records
    pub fn results(&self) -> &[ValidationResult] {
        &self.results
    }

    /// True if a result limit dropped records
    pub fn truncated(&self) -> bool {
        self.truncated
    }

    /// Serialize as pretty-printed JSON
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Convert to a SHACL report graph in the default graph.
    ///
    /// Report, result and path nodes are fresh blank nodes.
    pub fn to_statements(&self) -> Vec<Statement> {
        let report = fresh_node();
        let mut out = vec![
            Statement::new(
                report.clone(),
                Term::iri(rdf::TYPE),
                Term::iri(sh::VALIDATION_REPORT),
            ),
            Statement::new(
                report.clone(),
                Term::iri(sh::CONFORMS),
                Term::boolean(self.conforms),
            ),
        ];
        for result in &self.results {
            let node = fresh_node();
            out.push(Statement::new(report.clone(), Term::iri(sh::RESULT), node.clone()));
            result.write_statements(&node, &mut out);
        }
        out
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Validation report: conforms={}, {} result(s){}",
            self.conforms,
            self.results.len(),
            if self.truncated { " (truncated)" } else { "" }
        )?;
        for result in &self.results {
            writeln!(f, "  - {}", result)?;
        }
        Ok(())
    }
}

fn fresh_node() -> Term {
    Term::blank(Uuid::new_v4().simple().to_string())
}
