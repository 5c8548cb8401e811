//! Core types for shaclstore
//!
//! This crate defines the foundational types shared by every layer:
//! - Term: IRIs, blank nodes and literals
//! - Statement: subject/predicate/object plus an optional graph
//! - Pattern / GraphFilter: wildcard statement matching
//! - IsolationLevel: transaction isolation, weakest to strongest
//! - vocab: RDF, RDFS, XSD and SHACL vocabulary constants
//! - Error: Error type hierarchy

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod isolation;
pub mod pattern;
pub mod statement;
pub mod term;
pub mod vocab;

pub use error::{Error, Result};
pub use isolation::IsolationLevel;
pub use pattern::{GraphFilter, Pattern};
pub use statement::Statement;
pub use term::{Literal, Term};
