//! SHACL validation engine for shaclstore
//!
//! This crate turns a transaction's net effect into a validation report:
//! - reasoner: RDFS subclass closure maps, forward and backward chaining
//! - view: reasoning view answering type queries inclusively of subtypes
//! - shape: shape model, the compiler reading shapes from the shapes graph,
//!   and constraint evaluation
//! - materialize: turns a transaction diff into queryable added/removed views
//! - connections: the per-pass bundle of views, select cache and statistics
//! - plan: lazy pull-based plan nodes generated per shape
//! - execute: serial and parallel shape plan execution
//! - report: the validation report and its SHACL graph form

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod connections;
pub mod error;
pub mod execute;
pub mod materialize;
pub mod plan;
pub mod reasoner;
pub mod report;
pub mod settings;
pub mod shape;
pub mod tuple;
pub mod view;

pub use connections::{ConnectionsGroup, Projection, ViewKind};
pub use error::{Result, ShaclError};
pub use execute::validate_shapes;
pub use materialize::{DiffMaterializer, DiffStore, MaterializedDiff};
pub use plan::{generate_plan, PlanNode, TupleIter};
pub use reasoner::RdfsSubClassReasoner;
pub use report::{ValidationReport, ValidationResult};
pub use settings::{ResultLimits, ValidationSettings, ValidationStats};
pub use shape::{
    compile_shapes, Constraint, ConstraintComponent, NestedShape, NodeKind, Path, Severity,
    Shape, ShapeKey, Target,
};
pub use tuple::ValidationTuple;
pub use view::ReasoningView;
