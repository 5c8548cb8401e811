//! Shape model
//!
//! Shapes are read from the shapes graph by [`compile_shapes`] and flattened:
//! every [`Shape`] carries exactly one [`Constraint`], together with the
//! targets of its root node shape and the path of the property shape it came
//! from. A node shape with a `sh:minCount 1` / `sh:maxCount 1` property thus
//! becomes two shapes sharing targets and path.
//!
//! Nested shapes referenced by `sh:not`, `sh:and`, `sh:or` and `sh:node` are
//! kept whole as [`NestedShape`] trees and evaluated directly against the
//! current view.

mod compiler;
mod eval;

pub use compiler::compile_shapes;
pub(crate) use eval::EvalContext;

use rustc_hash::FxHasher;
use serde::{Deserialize, Serialize};
use shaclstore_core::vocab::sh;
use shaclstore_core::{Statement, Term};
use std::fmt::{self, Write as _};
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Property path
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Path {
    /// Follow a predicate forwards
    Predicate(Term),
    /// Follow a predicate backwards (`sh:inversePath`)
    Inverse(Term),
}

impl Path {
    /// The predicate the path follows
    pub fn predicate(&self) -> &Term {
        match self {
            Path::Predicate(p) | Path::Inverse(p) => p,
        }
    }

    /// The node whose values change when `statement` is added or removed
    pub fn focus_of(&self, statement: &Statement) -> Term {
        match self {
            Path::Predicate(_) => statement.subject.clone(),
            Path::Inverse(_) => statement.object.clone(),
        }
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Path::Predicate(p) => write!(f, "{}", p),
            Path::Inverse(p) => write!(f, "^{}", p),
        }
    }
}

/// Target declaration
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Target {
    /// `sh:targetClass`: instances of the class
    Class(Term),
    /// `sh:targetNode`: the node itself
    Node(Term),
    /// `sh:targetSubjectsOf`: subjects of the predicate
    SubjectsOf(Term),
    /// `sh:targetObjectsOf`: objects of the predicate
    ObjectsOf(Term),
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Class(t) => write!(f, "targetClass {}", t),
            Target::Node(t) => write!(f, "targetNode {}", t),
            Target::SubjectsOf(t) => write!(f, "targetSubjectsOf {}", t),
            Target::ObjectsOf(t) => write!(f, "targetObjectsOf {}", t),
        }
    }
}

/// Allowed node kinds for `sh:nodeKind`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    /// IRIs only
    Iri,
    /// Blank nodes only
    BlankNode,
    /// Literals only
    Literal,
    /// Blank nodes or IRIs
    BlankNodeOrIri,
    /// Blank nodes or literals
    BlankNodeOrLiteral,
    /// IRIs or literals
    IriOrLiteral,
}

impl NodeKind {
    /// Parse a `sh:nodeKind` value
    pub fn from_iri(iri: &str) -> Option<Self> {
        Some(match iri {
            sh::IRI => NodeKind::Iri,
            sh::BLANK_NODE => NodeKind::BlankNode,
            sh::LITERAL => NodeKind::Literal,
            sh::BLANK_NODE_OR_IRI => NodeKind::BlankNodeOrIri,
            sh::BLANK_NODE_OR_LITERAL => NodeKind::BlankNodeOrLiteral,
            sh::IRI_OR_LITERAL => NodeKind::IriOrLiteral,
            _ => return None,
        })
    }

    /// True if `term` has this kind
    pub fn admits(self, term: &Term) -> bool {
        match self {
            NodeKind::Iri => term.is_iri(),
            NodeKind::BlankNode => term.is_blank_node(),
            NodeKind::Literal => term.is_literal(),
            NodeKind::BlankNodeOrIri => term.is_resource(),
            NodeKind::BlankNodeOrLiteral => !term.is_iri(),
            NodeKind::IriOrLiteral => !term.is_blank_node(),
        }
    }
}

/// Result severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Severity {
    /// `sh:Violation`
    #[default]
    Violation,
    /// `sh:Warning`
    Warning,
    /// `sh:Info`
    Info,
}

impl Severity {
    /// Parse a `sh:severity` value
    pub fn from_iri(iri: &str) -> Option<Self> {
        match iri {
            sh::VIOLATION => Some(Severity::Violation),
            sh::WARNING => Some(Severity::Warning),
            sh::INFO => Some(Severity::Info),
            _ => None,
        }
    }

    /// SHACL IRI
    pub fn iri(self) -> &'static str {
        match self {
            Severity::Violation => sh::VIOLATION,
            Severity::Warning => sh::WARNING,
            Severity::Info => sh::INFO,
        }
    }
}

/// SHACL constraint component a result is attributed to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[allow(missing_docs)]
pub enum ConstraintComponent {
    MinCount,
    MaxCount,
    Datatype,
    Class,
    NodeKind,
    In,
    HasValue,
    MinLength,
    MaxLength,
    Not,
    And,
    Or,
    Node,
}

impl ConstraintComponent {
    /// Local name, e.g. `MaxCountConstraintComponent`
    pub fn local_name(self) -> &'static str {
        match self {
            ConstraintComponent::MinCount => "MinCountConstraintComponent",
            ConstraintComponent::MaxCount => "MaxCountConstraintComponent",
            ConstraintComponent::Datatype => "DatatypeConstraintComponent",
            ConstraintComponent::Class => "ClassConstraintComponent",
            ConstraintComponent::NodeKind => "NodeKindConstraintComponent",
            ConstraintComponent::In => "InConstraintComponent",
            ConstraintComponent::HasValue => "HasValueConstraintComponent",
            ConstraintComponent::MinLength => "MinLengthConstraintComponent",
            ConstraintComponent::MaxLength => "MaxLengthConstraintComponent",
            ConstraintComponent::Not => "NotConstraintComponent",
            ConstraintComponent::And => "AndConstraintComponent",
            ConstraintComponent::Or => "OrConstraintComponent",
            ConstraintComponent::Node => "NodeConstraintComponent",
        }
    }

    /// Full IRI in the SHACL namespace
    pub fn iri(self) -> String {
        format!("{}{}", sh::NS, self.local_name())
    }
}

/// One constraint component with its parameters
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Constraint {
    /// At least n values
    MinCount(usize),
    /// At most n values
    MaxCount(usize),
    /// Every value is a literal of this datatype
    Datatype(Term),
    /// Every value is an instance of this class
    Class(Term),
    /// Every value has this node kind
    NodeKind(NodeKind),
    /// Every value is one of these
    In(Vec<Term>),
    /// This value is among the values
    HasValue(Term),
    /// Lexical form has at least n characters
    MinLength(usize),
    /// Lexical form has at most n characters
    MaxLength(usize),
    /// Every value does not conform to the shape
    Not(Arc<NestedShape>),
    /// Every value conforms to all shapes
    And(Vec<Arc<NestedShape>>),
    /// Every value conforms to at least one shape
    Or(Vec<Arc<NestedShape>>),
    /// Every value conforms to the shape
    Node(Arc<NestedShape>),
}

impl Constraint {
    /// Component this constraint reports under
    pub fn component(&self) -> ConstraintComponent {
        match self {
            Constraint::MinCount(_) => ConstraintComponent::MinCount,
            Constraint::MaxCount(_) => ConstraintComponent::MaxCount,
            Constraint::Datatype(_) => ConstraintComponent::Datatype,
            Constraint::Class(_) => ConstraintComponent::Class,
            Constraint::NodeKind(_) => ConstraintComponent::NodeKind,
            Constraint::In(_) => ConstraintComponent::In,
            Constraint::HasValue(_) => ConstraintComponent::HasValue,
            Constraint::MinLength(_) => ConstraintComponent::MinLength,
            Constraint::MaxLength(_) => ConstraintComponent::MaxLength,
            Constraint::Not(_) => ConstraintComponent::Not,
            Constraint::And(_) => ConstraintComponent::And,
            Constraint::Or(_) => ConstraintComponent::Or,
            Constraint::Node(_) => ConstraintComponent::Node,
        }
    }

    /// Evaluated once per focus node over all its values, rather than per value
    pub fn is_aggregate(&self) -> bool {
        matches!(
            self,
            Constraint::MinCount(_) | Constraint::MaxCount(_) | Constraint::HasValue(_)
        )
    }

    /// Depends on the neighbourhood of value nodes beyond their types, so the
    /// transaction diff cannot narrow the focus nodes to check
    pub fn needs_full_scan(&self) -> bool {
        matches!(
            self,
            Constraint::Not(_) | Constraint::And(_) | Constraint::Or(_) | Constraint::Node(_)
        )
    }

    /// Message used when the shape has no `sh:message`
    pub fn default_message(&self) -> String {
        match self {
            Constraint::MinCount(n) => format!("Less than {} values", n),
            Constraint::MaxCount(n) => format!("More than {} values", n),
            Constraint::Datatype(dt) => format!("Value is not a literal of datatype {}", dt),
            Constraint::Class(c) => format!("Value is not an instance of {}", c),
            Constraint::NodeKind(kind) => format!("Value does not have node kind {:?}", kind),
            Constraint::In(_) => "Value is not in the allowed list".to_string(),
            Constraint::HasValue(v) => format!("Missing expected value {}", v),
            Constraint::MinLength(n) => format!("Value has less than {} characters", n),
            Constraint::MaxLength(n) => format!("Value has more than {} characters", n),
            Constraint::Not(_) => "Value conforms to a negated shape".to_string(),
            Constraint::And(_) => "Value does not conform to every shape".to_string(),
            Constraint::Or(_) => "Value does not conform to any shape".to_string(),
            Constraint::Node(_) => "Value does not conform to the node shape".to_string(),
        }
    }

    fn render(&self, out: &mut String, indent: usize) -> fmt::Result {
        let pad = "  ".repeat(indent);
        match self {
            Constraint::MinCount(n) => writeln!(out, "{}minCount {}", pad, n),
            Constraint::MaxCount(n) => writeln!(out, "{}maxCount {}", pad, n),
            Constraint::Datatype(t) => writeln!(out, "{}datatype {}", pad, canonical(t)),
            Constraint::Class(t) => writeln!(out, "{}class {}", pad, canonical(t)),
            Constraint::NodeKind(k) => writeln!(out, "{}nodeKind {:?}", pad, k),
            Constraint::In(values) => {
                let list: Vec<String> = values.iter().map(canonical).collect();
                writeln!(out, "{}in ({})", pad, list.join(" "))
            }
            Constraint::HasValue(t) => writeln!(out, "{}hasValue {}", pad, canonical(t)),
            Constraint::MinLength(n) => writeln!(out, "{}minLength {}", pad, n),
            Constraint::MaxLength(n) => writeln!(out, "{}maxLength {}", pad, n),
            Constraint::Not(s) => {
                writeln!(out, "{}not", pad)?;
                s.render(out, indent + 1)
            }
            Constraint::Node(s) => {
                writeln!(out, "{}node", pad)?;
                s.render(out, indent + 1)
            }
            Constraint::And(list) | Constraint::Or(list) => {
                let op = if matches!(self, Constraint::And(_)) { "and" } else { "or" };
                writeln!(out, "{}{}", pad, op)?;
                for s in list {
                    s.render(out, indent + 1)?;
                }
                Ok(())
            }
        }
    }
}

/// Shape referenced from a logical constraint, kept as a tree
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NestedShape {
    /// Shape node in the shapes graph
    pub id: Term,
    /// Path, for property shapes
    pub path: Option<Path>,
    /// Constraints on the node itself (or its path values)
    pub constraints: Vec<Constraint>,
    /// `sh:property` children
    pub properties: Vec<Arc<NestedShape>>,
    /// Severity of results
    pub severity: Severity,
    /// `sh:message`
    pub message: Option<String>,
}

impl NestedShape {
    fn render(&self, out: &mut String, indent: usize) -> fmt::Result {
        let pad = "  ".repeat(indent);
        writeln!(out, "{}shape {}", pad, canonical(&self.id))?;
        if let Some(path) = &self.path {
            writeln!(out, "{}  path {}", pad, canonical_path(path))?;
        }
        for c in &self.constraints {
            c.render(out, indent + 1)?;
        }
        for p in &self.properties {
            p.render(out, indent + 1)?;
        }
        Ok(())
    }
}

/// Stable identity of a shape across refreshes.
///
/// Built from the shape's IRI (blank-node shapes have none) and a fingerprint
/// of its canonical rendering, in which blank node labels are erased. Reparsing
/// the same definition, even with relabelled blank nodes, yields the same key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ShapeKey {
    iri: Option<String>,
    fingerprint: u64,
}

impl ShapeKey {
    fn new(id: &Term, canonical_text: &str) -> Self {
        let mut hasher = FxHasher::default();
        canonical_text.hash(&mut hasher);
        Self {
            iri: id.as_iri().map(str::to_string),
            fingerprint: hasher.finish(),
        }
    }
}

/// Validation unit: one constraint with its targets and path
#[derive(Debug, Clone)]
pub struct Shape {
    key: ShapeKey,
    /// Shape the constraint is declared on (`sh:sourceShape`)
    pub id: Term,
    /// Node shape carrying the targets
    pub root: Term,
    /// Targets of the root shape
    pub targets: Arc<[Target]>,
    /// Path of the declaring property shape
    pub path: Option<Path>,
    /// The constraint
    pub constraint: Constraint,
    /// Result severity
    pub severity: Severity,
    /// `sh:message`
    pub message: Option<String>,
    text: String,
}

impl Shape {
    /// Assemble a shape and compute its key and rendered text
    pub fn new(
        id: Term,
        root: Term,
        targets: Arc<[Target]>,
        path: Option<Path>,
        constraint: Constraint,
        severity: Severity,
        message: Option<String>,
    ) -> Self {
        let mut shape = Self {
            key: ShapeKey {
                iri: None,
                fingerprint: 0,
            },
            id,
            root,
            targets,
            path,
            constraint,
            severity,
            message,
            text: String::new(),
        };
        let mut text = String::new();
        // Writing into a String cannot fail.
        let _ = shape.render_canonical(&mut text);
        shape.key = ShapeKey::new(&shape.id, &text);
        shape.text = text;
        shape
    }

    /// Stable identity key
    pub fn key(&self) -> &ShapeKey {
        &self.key
    }

    /// Human-readable definition, used in fault messages
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Message for a result of this shape
    pub fn message(&self) -> String {
        self.message
            .clone()
            .unwrap_or_else(|| self.constraint.default_message())
    }

    fn render_canonical(&self, out: &mut String) -> fmt::Result {
        writeln!(out, "shape {} (root {})", canonical(&self.id), canonical(&self.root))?;
        for target in self.targets.iter() {
            writeln!(out, "  {}", target)?;
        }
        if let Some(path) = &self.path {
            writeln!(out, "  path {}", canonical_path(path))?;
        }
        writeln!(out, "  severity {:?}", self.severity)?;
        if let Some(message) = &self.message {
            writeln!(out, "  message {:?}", message)?;
        }
        self.constraint.render(out, 1)
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

fn canonical(term: &Term) -> String {
    match term {
        Term::BlankNode(_) => "[]".to_string(),
        other => other.to_string(),
    }
}

fn canonical_path(path: &Path) -> String {
    match path {
        Path::Predicate(p) => canonical(p),
        Path::Inverse(p) => format!("^{}", canonical(p)),
    }
}
