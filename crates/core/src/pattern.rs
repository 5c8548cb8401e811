//! Statement patterns
//!
//! A [`Pattern`] is the `(subject?, predicate?, object?, graph?)` query shape
//! the store answers. Unbound positions match anything.

use crate::statement::Statement;
use crate::term::Term;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which graphs a pattern covers
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum GraphFilter {
    /// Every graph, default included
    #[default]
    Any,
    /// Only the default graph
    Default,
    /// Exactly one named graph
    Named(Term),
}

impl GraphFilter {
    /// Check a statement's graph against this filter
    pub fn matches(&self, graph: Option<&Term>) -> bool {
        match self {
            GraphFilter::Any => true,
            GraphFilter::Default => graph.is_none(),
            GraphFilter::Named(name) => graph == Some(name),
        }
    }
}

/// Wildcard statement pattern
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Pattern {
    /// Bound subject
    pub subject: Option<Term>,
    /// Bound predicate
    pub predicate: Option<Term>,
    /// Bound object
    pub object: Option<Term>,
    /// Graph restriction
    pub graph: GraphFilter,
}

impl Pattern {
    /// Pattern matching every statement
    pub fn any() -> Self {
        Self::default()
    }

    /// Bind the subject
    pub fn subject(mut self, subject: Term) -> Self {
        self.subject = Some(subject);
        self
    }

    /// Bind the predicate
    pub fn predicate(mut self, predicate: Term) -> Self {
        self.predicate = Some(predicate);
        self
    }

    /// Bind the object
    pub fn object(mut self, object: Term) -> Self {
        self.object = Some(object);
        self
    }

    /// Restrict graphs
    pub fn graph(mut self, graph: GraphFilter) -> Self {
        self.graph = graph;
        self
    }

    /// Exact-match pattern for one statement
    pub fn exact(statement: &Statement) -> Self {
        Self {
            subject: Some(statement.subject.clone()),
            predicate: Some(statement.predicate.clone()),
            object: Some(statement.object.clone()),
            graph: match &statement.graph {
                Some(g) => GraphFilter::Named(g.clone()),
                None => GraphFilter::Default,
            },
        }
    }

    /// Test a statement against the pattern
    pub fn matches(&self, statement: &Statement) -> bool {
        self.subject.as_ref().map_or(true, |s| *s == statement.subject)
            && self.predicate.as_ref().map_or(true, |p| *p == statement.predicate)
            && self.object.as_ref().map_or(true, |o| *o == statement.object)
            && self.graph.matches(statement.graph.as_ref())
    }

    /// True if the predicate is bound to the given IRI
    pub fn has_predicate(&self, iri: &str) -> bool {
        self.predicate.as_ref().map_or(false, |p| p.matches_iri(iri))
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn slot(f: &mut fmt::Formatter<'_>, term: &Option<Term>, var: &str) -> fmt::Result {
            match term {
                Some(t) => write!(f, "{}", t),
                None => write!(f, "?{}", var),
            }
        }
        slot(f, &self.subject, "s")?;
        write!(f, " ")?;
        slot(f, &self.predicate, "p")?;
        write!(f, " ")?;
        slot(f, &self.object, "o")?;
        match &self.graph {
            GraphFilter::Any => Ok(()),
            GraphFilter::Default => write!(f, " [default]"),
            GraphFilter::Named(g) => write!(f, " {}", g),
        }
    }
}
