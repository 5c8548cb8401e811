//! Statements (quads)

use crate::term::Term;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A subject/predicate/object fact with an optional named graph.
///
/// `graph == None` is the default graph. Statements are immutable values with
/// structural equality, so a dataset is a set of statements and duplicates
/// collapse.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Statement {
    /// Subject (IRI or blank node)
    pub subject: Term,
    /// Predicate IRI
    pub predicate: Term,
    /// Object
    pub object: Term,
    /// Named graph, `None` for the default graph
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub graph: Option<Term>,
}

impl Statement {
    /// Statement in the default graph
    pub fn new(subject: Term, predicate: Term, object: Term) -> Self {
        Self {
            subject,
            predicate,
            object,
            graph: None,
        }
    }

    /// Statement in a named graph
    pub fn in_graph(subject: Term, predicate: Term, object: Term, graph: Term) -> Self {
        Self {
            subject,
            predicate,
            object,
            graph: Some(graph),
        }
    }

    /// Same triple, different graph
    pub fn with_graph(mut self, graph: Option<Term>) -> Self {
        self.graph = graph;
        self
    }

    /// True if the predicate is the given IRI
    pub fn has_predicate(&self, iri: &str) -> bool {
        self.predicate.matches_iri(iri)
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.subject, self.predicate, self.object)?;
        if let Some(graph) = &self.graph {
            write!(f, " {}", graph)?;
        }
        write!(f, " .")
    }
}
