//! Reads shapes from the shapes graph and flattens them into validation units

use super::{Constraint, NestedShape, NodeKind, Path, Severity, Shape, Target};
use crate::error::{Result, ShaclError};
use rustc_hash::{FxHashMap, FxHashSet};
use shaclstore_core::vocab::{rdf, sh, SHAPES_GRAPH};
use shaclstore_core::{GraphFilter, Pattern, Statement, Term};
use shaclstore_storage::StatementSource;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::debug;

const TARGET_PREDICATES: [&str; 4] = [
    sh::TARGET_CLASS,
    sh::TARGET_NODE,
    sh::TARGET_SUBJECTS_OF,
    sh::TARGET_OBJECTS_OF,
];

/// Compile every active shape in the reserved shapes graph of `source`.
///
/// Node shapes are the subjects declaring at least one target. Each of their
/// constraints, and each constraint of their `sh:property` shapes, becomes one
/// [`Shape`]. The result is ordered by root shape, then declaration order.
pub fn compile_shapes(source: &dyn StatementSource) -> Result<Vec<Arc<Shape>>> {
    let pattern = Pattern::any().graph(GraphFilter::Named(Term::iri(SHAPES_GRAPH)));
    let graph = ShapesGraph::new(source.statements(&pattern, false)?);

    let mut shapes = Vec::new();
    for root in graph.roots() {
        if graph.is_deactivated(&root) {
            debug!(target: "shaclstore::validation", shape = %root, "Skipping deactivated shape");
            continue;
        }
        graph.compile_root(&root, &mut shapes)?;
    }
    debug!(target: "shaclstore::validation", count = shapes.len(), "Compiled shapes");
    Ok(shapes)
}

struct ShapesGraph {
    by_subject: FxHashMap<Term, Vec<Statement>>,
}

impl ShapesGraph {
    fn new(statements: Vec<Statement>) -> Self {
        let mut by_subject: FxHashMap<Term, Vec<Statement>> = FxHashMap::default();
        for st in statements {
            by_subject.entry(st.subject.clone()).or_default().push(st);
        }
        for list in by_subject.values_mut() {
            list.sort();
        }
        Self { by_subject }
    }

    fn objects<'a>(&'a self, subject: &Term, predicate: &'a str) -> impl Iterator<Item = &'a Term> + 'a {
        self.by_subject
            .get(subject)
            .into_iter()
            .flatten()
            .filter(move |st| st.predicate.matches_iri(predicate))
            .map(|st| &st.object)
    }

    fn object<'a>(&'a self, subject: &Term, predicate: &'a str) -> Option<&'a Term> {
        self.objects(subject, predicate).next()
    }

    fn roots(&self) -> BTreeSet<Term> {
        self.by_subject
            .iter()
            .filter(|(_, sts)| {
                sts.iter()
                    .any(|st| TARGET_PREDICATES.iter().any(|p| st.predicate.matches_iri(p)))
            })
            .map(|(subject, _)| subject.clone())
            .collect()
    }

    fn is_deactivated(&self, node: &Term) -> bool {
        self.object(node, sh::DEACTIVATED)
            .and_then(Term::lexical_form)
            .map_or(false, |v| v == "true")
    }

    fn compile_root(&self, root: &Term, out: &mut Vec<Arc<Shape>>) -> Result<()> {
        let targets: Arc<[Target]> = self.targets(root).into();
        let mut visiting = FxHashSet::default();

        let root_path = self.path(root)?;
        let (severity, message) = self.severity_and_message(root)?;
        for constraint in self.constraints(root, &mut visiting)? {
            out.push(Arc::new(Shape::new(
                root.clone(),
                root.clone(),
                targets.clone(),
                root_path.clone(),
                constraint,
                severity,
                message.clone(),
            )));
        }
        if root_path.is_some() {
            return Ok(());
        }

        for property in self.objects(root, sh::PROPERTY) {
            if self.is_deactivated(property) {
                continue;
            }
            let path = self
                .path(property)?
                .ok_or_else(|| ShaclError::parse(property, "property shape without sh:path"))?;
            let (severity, message) = self.severity_and_message(property)?;
            for constraint in self.constraints(property, &mut visiting)? {
                out.push(Arc::new(Shape::new(
                    property.clone(),
                    root.clone(),
                    targets.clone(),
                    Some(path.clone()),
                    constraint,
                    severity,
                    message.clone(),
                )));
            }
        }
        Ok(())
    }

    fn targets(&self, node: &Term) -> Vec<Target> {
        let mut targets = Vec::new();
        targets.extend(self.objects(node, sh::TARGET_CLASS).cloned().map(Target::Class));
        targets.extend(self.objects(node, sh::TARGET_NODE).cloned().map(Target::Node));
        targets.extend(
            self.objects(node, sh::TARGET_SUBJECTS_OF)
                .cloned()
                .map(Target::SubjectsOf),
        );
        targets.extend(
            self.objects(node, sh::TARGET_OBJECTS_OF)
                .cloned()
                .map(Target::ObjectsOf),
        );
        targets
    }

    fn severity_and_message(&self, node: &Term) -> Result<(Severity, Option<String>)> {
        let severity = match self.object(node, sh::SEVERITY) {
            None => Severity::default(),
            Some(value) => value
                .as_iri()
                .and_then(Severity::from_iri)
                .ok_or_else(|| ShaclError::parse(node, format!("unknown severity {}", value)))?,
        };
        let message = self
            .object(node, sh::MESSAGE)
            .and_then(Term::lexical_form)
            .map(str::to_string);
        Ok((severity, message))
    }

    fn path(&self, node: &Term) -> Result<Option<Path>> {
        let value = match self.object(node, sh::PATH) {
            Some(v) => v,
            None => return Ok(None),
        };
        if value.is_iri() {
            return Ok(Some(Path::Predicate(value.clone())));
        }
        match self.object(value, sh::INVERSE_PATH) {
            Some(p) if p.is_iri() && value.is_blank_node() => Ok(Some(Path::Inverse(p.clone()))),
            _ => Err(ShaclError::parse(node, format!("unsupported path {}", value))),
        }
    }

    fn count(&self, node: &Term, value: &Term, predicate: &str) -> Result<usize> {
        value
            .as_count()
            .ok_or_else(|| ShaclError::parse(node, format!("{} expects a count, got {}", predicate, value)))
    }

    fn iri_param(&self, node: &Term, value: &Term, predicate: &str) -> Result<Term> {
        if value.is_iri() {
            Ok(value.clone())
        } else {
            Err(ShaclError::parse(node, format!("{} expects an IRI, got {}", predicate, value)))
        }
    }

    fn constraints(&self, node: &Term, visiting: &mut FxHashSet<Term>) -> Result<Vec<Constraint>> {
        let mut out = Vec::new();
        for value in self.objects(node, sh::MIN_COUNT) {
            out.push(Constraint::MinCount(self.count(node, value, "sh:minCount")?));
        }
        for value in self.objects(node, sh::MAX_COUNT) {
            out.push(Constraint::MaxCount(self.count(node, value, "sh:maxCount")?));
        }
        for value in self.objects(node, sh::DATATYPE) {
            out.push(Constraint::Datatype(self.iri_param(node, value, "sh:datatype")?));
        }
        for value in self.objects(node, sh::CLASS) {
            out.push(Constraint::Class(self.iri_param(node, value, "sh:class")?));
        }
        for value in self.objects(node, sh::NODE_KIND) {
            let kind = value
                .as_iri()
                .and_then(NodeKind::from_iri)
                .ok_or_else(|| ShaclError::parse(node, format!("unknown node kind {}", value)))?;
            out.push(Constraint::NodeKind(kind));
        }
        for value in self.objects(node, sh::IN) {
            out.push(Constraint::In(self.list(node, value)?));
        }
        for value in self.objects(node, sh::HAS_VALUE) {
            out.push(Constraint::HasValue(value.clone()));
        }
        for value in self.objects(node, sh::MIN_LENGTH) {
            out.push(Constraint::MinLength(self.count(node, value, "sh:minLength")?));
        }
        for value in self.objects(node, sh::MAX_LENGTH) {
            out.push(Constraint::MaxLength(self.count(node, value, "sh:maxLength")?));
        }
        for value in self.objects(node, sh::NOT) {
            out.push(Constraint::Not(self.nested(value, visiting)?));
        }
        for value in self.objects(node, sh::AND) {
            out.push(Constraint::And(self.nested_list(node, value, visiting)?));
        }
        for value in self.objects(node, sh::OR) {
            out.push(Constraint::Or(self.nested_list(node, value, visiting)?));
        }
        for value in self.objects(node, sh::NODE) {
            out.push(Constraint::Node(self.nested(value, visiting)?));
        }
        Ok(out)
    }

    fn nested_list(
        &self,
        node: &Term,
        head: &Term,
        visiting: &mut FxHashSet<Term>,
    ) -> Result<Vec<Arc<NestedShape>>> {
        self.list(node, head)?
            .iter()
            .map(|member| self.nested(member, visiting))
            .collect()
    }

    fn nested(&self, node: &Term, visiting: &mut FxHashSet<Term>) -> Result<Arc<NestedShape>> {
        if !visiting.insert(node.clone()) {
            return Err(ShaclError::parse(node, "recursive shape reference"));
        }
        let path = self.path(node)?;
        let (severity, message) = self.severity_and_message(node)?;
        let constraints = self.constraints(node, visiting)?;
        let mut properties = Vec::new();
        for property in self.objects(node, sh::PROPERTY) {
            if self.is_deactivated(property) {
                continue;
            }
            if self.path(property)?.is_none() {
                return Err(ShaclError::parse(property, "property shape without sh:path"));
            }
            properties.push(self.nested(property, visiting)?);
        }
        visiting.remove(node);
        Ok(Arc::new(NestedShape {
            id: node.clone(),
            path,
            constraints,
            properties,
            severity,
            message,
        }))
    }

    fn list(&self, owner: &Term, head: &Term) -> Result<Vec<Term>> {
        let mut items = Vec::new();
        let mut seen = FxHashSet::default();
        let mut cursor = head;
        while !cursor.matches_iri(rdf::NIL) {
            if !seen.insert(cursor.clone()) {
                return Err(ShaclError::parse(owner, "cyclic RDF list"));
            }
            let first = self
                .object(cursor, rdf::FIRST)
                .ok_or_else(|| ShaclError::parse(owner, format!("malformed RDF list at {}", cursor)))?;
            items.push(first.clone());
            cursor = self
                .object(cursor, rdf::REST)
                .ok_or_else(|| ShaclError::parse(owner, format!("malformed RDF list at {}", cursor)))?;
        }
        Ok(items)
    }
}
