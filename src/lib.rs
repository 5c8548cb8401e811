//! shaclstore - transactional RDF store with incremental SHACL validation
//!
//! Every commit is checked against the shapes held in a reserved shapes graph.
//! Only the focus nodes a transaction could have invalidated are revalidated,
//! unless the store starts empty or the shapes themselves change.
//!
//! # Quick Start
//!
//! ```ignore
//! use shaclstore::{vocab::{rdf, sh, SHAPES_GRAPH}, ShaclStore, Statement, Term};
//!
//! let store = ShaclStore::with_defaults()?;
//! let mut conn = store.connection()?;
//!
//! conn.begin()?;
//! let shapes = Term::iri(SHAPES_GRAPH);
//! let shape = Term::iri("http://ex/PersonShape");
//! let age = Term::blank("age");
//! conn.add(Statement::in_graph(shape.clone(), Term::iri(sh::TARGET_CLASS), Term::iri("http://ex/Person"), shapes.clone()))?;
//! conn.add(Statement::in_graph(shape, Term::iri(sh::PROPERTY), age.clone(), shapes.clone()))?;
//! conn.add(Statement::in_graph(age.clone(), Term::iri(sh::PATH), Term::iri("http://ex/age"), shapes.clone()))?;
//! conn.add(Statement::in_graph(age, Term::iri(sh::MAX_COUNT), Term::integer(1), shapes))?;
//! conn.commit()?;
//!
//! conn.begin()?;
//! conn.add(Statement::new(Term::iri("http://ex/peter"), Term::iri(rdf::TYPE), Term::iri("http://ex/Person")))?;
//! conn.add(Statement::new(Term::iri("http://ex/peter"), Term::iri("http://ex/age"), Term::integer(20)))?;
//! conn.add(Statement::new(Term::iri("http://ex/peter"), Term::iri("http://ex/age"), Term::integer(30)))?;
//! let err = conn.commit().unwrap_err();
//! println!("{}", err.report().unwrap());
//! ```
//!
//! # Architecture
//!
//! - `shaclstore-core`: terms, statements, patterns, isolation levels, vocabulary
//! - `shaclstore-storage`: versioned in-memory statement store and connections
//! - `shaclstore-concurrency`: lock manager, transaction diff, published values,
//!   worker pool
//! - `shaclstore-shacl`: shape compiler, reasoning, plans and reports
//! - `shaclstore-engine`: the validating store and its connections

pub use shaclstore_core::{vocab, Error, GraphFilter, IsolationLevel, Literal, Pattern, Statement, Term};
pub use shaclstore_engine::*;
pub use shaclstore_shacl::{
    ConstraintComponent, Path, Result, Severity, ShaclError, ValidationReport, ValidationResult,
    ValidationStats,
};
