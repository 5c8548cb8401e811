//! RDF terms
//!
//! A [`Term`] is the value in any position of a [`Statement`](crate::Statement).
//! Terms are plain owned values: equality, ordering and hashing are structural,
//! so the same IRI built twice compares equal.

use crate::vocab::{rdf, xsd};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A literal value with its datatype and optional language tag
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Literal {
    /// Lexical form
    pub lexical: String,
    /// Datatype IRI (`rdf:langString` for language-tagged strings)
    pub datatype: String,
    /// Language tag, lower-cased
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}

/// An IRI, blank node or literal
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Term {
    /// Absolute IRI
    Iri(String),
    /// Blank node label, without the `_:` prefix
    BlankNode(String),
    /// Literal value
    Literal(Literal),
}

impl Term {
    /// Create an IRI term
    pub fn iri(iri: impl Into<String>) -> Self {
        Term::Iri(iri.into())
    }

    /// Create a blank node term
    pub fn blank(label: impl Into<String>) -> Self {
        Term::BlankNode(label.into())
    }

    /// Create a typed literal
    pub fn typed(lexical: impl Into<String>, datatype: impl Into<String>) -> Self {
        Term::Literal(Literal {
            lexical: lexical.into(),
            datatype: datatype.into(),
            language: None,
        })
    }

    /// Create an `xsd:string` literal
    pub fn string(value: impl Into<String>) -> Self {
        Term::typed(value, xsd::STRING)
    }

    /// Create a language-tagged string
    pub fn lang_string(value: impl Into<String>, language: &str) -> Self {
        Term::Literal(Literal {
            lexical: value.into(),
            datatype: rdf::LANG_STRING.to_string(),
            language: Some(language.to_ascii_lowercase()),
        })
    }

    /// Create an `xsd:integer` literal
    pub fn integer(value: i64) -> Self {
        Term::typed(value.to_string(), xsd::INTEGER)
    }

    /// Create an `xsd:boolean` literal
    pub fn boolean(value: bool) -> Self {
        Term::typed(value.to_string(), xsd::BOOLEAN)
    }

    /// True if this is the given IRI
    pub fn matches_iri(&self, iri: &str) -> bool {
        matches!(self, Term::Iri(value) if value == iri)
    }

    /// Check if this is an IRI
    pub fn is_iri(&self) -> bool {
        matches!(self, Term::Iri(_))
    }

    /// Check if this is a blank node
    pub fn is_blank_node(&self) -> bool {
        matches!(self, Term::BlankNode(_))
    }

    /// Check if this is a literal
    pub fn is_literal(&self) -> bool {
        matches!(self, Term::Literal(_))
    }

    /// IRIs and blank nodes can appear in subject position
    pub fn is_resource(&self) -> bool {
        !self.is_literal()
    }

    /// The IRI string, if this is an IRI
    pub fn as_iri(&self) -> Option<&str> {
        match self {
            Term::Iri(iri) => Some(iri),
            _ => None,
        }
    }

    /// The literal, if this is one
    pub fn as_literal(&self) -> Option<&Literal> {
        match self {
            Term::Literal(lit) => Some(lit),
            _ => None,
        }
    }

    /// The IRI string or literal lexical form; `None` for blank nodes
    pub fn lexical_form(&self) -> Option<&str> {
        match self {
            Term::Iri(iri) => Some(iri),
            Term::BlankNode(_) => None,
            Term::Literal(lit) => Some(&lit.lexical),
        }
    }

    /// Parse a non-negative integer literal (used for cardinalities)
    pub fn as_count(&self) -> Option<usize> {
        self.as_literal().and_then(|lit| lit.lexical.trim().parse().ok())
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Term::Iri(iri) => write!(f, "<{}>", iri),
            Term::BlankNode(label) => write!(f, "_:{}", label),
            Term::Literal(lit) => {
                write!(f, "\"{}\"", lit.lexical.replace('\\', "\\\\").replace('"', "\\\""))?;
                match &lit.language {
                    Some(lang) => write!(f, "@{}", lang),
                    None if lit.datatype == xsd::STRING => Ok(()),
                    None => write!(f, "^^<{}>", lit.datatype),
                }
            }
        }
    }
}
