//! Plan nodes
//!
//! Each shape compiles into a small tree of pull-based nodes. Leaves read from
//! one view of the [`ConnectionsGroup`]; inner nodes filter, join and
//! deduplicate; the root emits one tuple per violation. Nothing is read until
//! the root iterator is pulled.
//!
//! Smart constructors fold away branches that read a view known to be empty,
//! so a shape whose plan collapses to [`PlanNode::Empty`] is skipped without
//! touching any store.

use crate::connections::{ConnectionsGroup, Projection, ViewKind};
use crate::error::Result;
use crate::shape::{Constraint, Path, Shape, Target};
use crate::tuple::ValidationTuple;
use rustc_hash::FxHashSet;
use shaclstore_core::vocab::rdf;
use shaclstore_core::{Pattern, Term};
use std::fmt;
use std::iter;
use std::sync::Arc;

/// Lazily evaluated stream of tuples
pub type TupleIter<'a> = Box<dyn Iterator<Item = Result<ValidationTuple>> + 'a>;

/// A node in a shape's plan tree
#[derive(Debug, Clone)]
pub enum PlanNode {
    /// Produces nothing
    Empty,
    /// Projected terms of a pattern read from one view
    Select {
        /// View to read
        view: ViewKind,
        /// Pattern to match
        pattern: Pattern,
        /// Term each statement yields
        projection: Projection,
    },
    /// Fixed focus nodes
    FixedNodes(Vec<Term>),
    /// Concatenation of the inputs
    Union(Vec<PlanNode>),
    /// Drops repeated (focus, value) pairs
    Unique(Box<PlanNode>),
    /// Keeps focus nodes that are (or, with `keep == false`, are not)
    /// targets in `view`
    TargetFilter {
        /// Input
        input: Box<PlanNode>,
        /// Targets to test
        targets: Arc<[Target]>,
        /// View the test reads
        view: ViewKind,
        /// Emit matches (true) or non-matches (false)
        keep: bool,
    },
    /// Replaces each value node by the nodes reaching it through `path`
    /// (the node itself when there is no path)
    ReferrersJoin {
        /// Input
        input: Box<PlanNode>,
        /// Path to follow backwards
        path: Option<Path>,
    },
    /// Pairs each focus node with its values
    ValuesJoin {
        /// Input
        input: Box<PlanNode>,
        /// Path to follow; the focus is its own value when absent
        path: Option<Path>,
    },
    /// Emits (focus, value) tuples whose value violates the shape's constraint
    ValueFilter {
        /// Input
        input: Box<PlanNode>,
        /// Shape carrying the constraint
        shape: Arc<Shape>,
    },
    /// Emits focus nodes whose full value set violates an aggregate constraint
    FocusFilter {
        /// Input
        input: Box<PlanNode>,
        /// Shape carrying the constraint
        shape: Arc<Shape>,
    },
}

impl PlanNode {
    /// True if the node can never produce a tuple
    pub fn is_guaranteed_empty(&self) -> bool {
        matches!(self, PlanNode::Empty)
    }

    fn select(group: &ConnectionsGroup<'_>, view: ViewKind, pattern: Pattern, projection: Projection) -> Self {
        if group.is_statically_empty(view) {
            return PlanNode::Empty;
        }
        PlanNode::Select {
            view,
            pattern,
            projection,
        }
    }

    fn union(inputs: Vec<PlanNode>) -> Self {
        let mut inputs: Vec<PlanNode> = inputs.into_iter().filter(|n| !n.is_guaranteed_empty()).collect();
        match inputs.len() {
            0 => PlanNode::Empty,
            1 => inputs.remove(0),
            _ => PlanNode::Union(inputs),
        }
    }

    fn wrap(self, f: impl FnOnce(Box<PlanNode>) -> PlanNode) -> Self {
        if self.is_guaranteed_empty() {
            PlanNode::Empty
        } else {
            f(Box::new(self))
        }
    }

    fn unique(self) -> Self {
        self.wrap(PlanNode::Unique)
    }

    fn target_filter(self, targets: &Arc<[Target]>, view: ViewKind, keep: bool) -> Self {
        self.wrap(|input| PlanNode::TargetFilter {
            input,
            targets: Arc::clone(targets),
            view,
            keep,
        })
    }

    /// Pull the node's tuples
    pub fn execute<'a>(&'a self, group: &'a ConnectionsGroup<'_>) -> Result<TupleIter<'a>> {
        Ok(match self {
            PlanNode::Empty => Box::new(iter::empty()),
            PlanNode::Select {
                view,
                pattern,
                projection,
            } => {
                let terms = group.select(*view, pattern, *projection)?;
                Box::new((0..terms.len()).map(move |i| Ok(ValidationTuple::focus(terms[i].clone()))))
            }
            PlanNode::FixedNodes(nodes) => Box::new(nodes.iter().cloned().map(|n| Ok(ValidationTuple::focus(n)))),
            PlanNode::Union(inputs) => Box::new(inputs.iter().flat_map(move |input| flatten(input.execute(group)))),
            PlanNode::Unique(input) => {
                let mut seen: FxHashSet<(Term, Option<Term>)> = FxHashSet::default();
                Box::new(input.execute(group)?.filter(move |item| match item {
                    Ok(t) => seen.insert((t.focus.clone(), t.value.clone())),
                    Err(_) => true,
                }))
            }
            PlanNode::TargetFilter {
                input,
                targets,
                view,
                keep,
            } => Box::new(input.execute(group)?.filter_map(move |item| {
                let tuple = match item {
                    Ok(t) => t,
                    Err(e) => return Some(Err(e)),
                };
                match is_target(group, *view, targets, &tuple.focus) {
                    Ok(found) if found == *keep => Some(Ok(tuple)),
                    Ok(_) => None,
                    Err(e) => Some(Err(e)),
                }
            })),
            PlanNode::ReferrersJoin { input, path } => Box::new(input.execute(group)?.flat_map(move |item| {
                let referrers = item.and_then(|t| match path {
                    Some(path) => path.referrers(&t.focus, group.eval_context()),
                    None => Ok(vec![t.focus]),
                });
                expand(referrers, ValidationTuple::focus)
            })),
            PlanNode::ValuesJoin { input, path } => Box::new(input.execute(group)?.flat_map(move |item| {
                let pairs = item.and_then(|t| {
                    let values = match path {
                        Some(path) => path.values(&t.focus, group.eval_context())?,
                        None => vec![t.focus.clone()],
                    };
                    Ok(values
                        .into_iter()
                        .map(|v| t.with_value(v, path.clone()))
                        .collect::<Vec<_>>())
                });
                expand(pairs, |t| t)
            })),
            PlanNode::ValueFilter { input, shape } => Box::new(input.execute(group)?.filter_map(move |item| {
                let mut tuple = match item {
                    Ok(t) => t,
                    Err(e) => return Some(Err(e)),
                };
                let value = tuple.value.clone()?;
                match shape.constraint.check_value(&value, group.eval_context()) {
                    Ok(Some(details)) => {
                        tuple.details = details;
                        Some(Ok(tuple))
                    }
                    Ok(None) => None,
                    Err(e) => Some(Err(e)),
                }
            })),
            PlanNode::FocusFilter { input, shape } => Box::new(input.execute(group)?.filter_map(move |item| {
                let tuple = match item {
                    Ok(t) => t,
                    Err(e) => return Some(Err(e)),
                };
                let values = match &shape.path {
                    Some(path) => match path.values(&tuple.focus, group.eval_context()) {
                        Ok(values) => values,
                        Err(e) => return Some(Err(e)),
                    },
                    None => vec![tuple.focus.clone()],
                };
                (!shape.constraint.check_values(&values)).then_some(Ok(tuple))
            })),
        })
    }

    fn render(&self, f: &mut fmt::Formatter<'_>, depth: usize) -> fmt::Result {
        let pad = "  ".repeat(depth);
        let input = match self {
            PlanNode::Empty => return writeln!(f, "{}Empty", pad),
            PlanNode::Select {
                view,
                pattern,
                projection,
            } => return writeln!(f, "{}Select[{}] {} -> {:?}", pad, view, pattern, projection),
            PlanNode::FixedNodes(nodes) => {
                let list: Vec<String> = nodes.iter().map(Term::to_string).collect();
                return writeln!(f, "{}FixedNodes [{}]", pad, list.join(", "));
            }
            PlanNode::Union(inputs) => {
                writeln!(f, "{}Union", pad)?;
                for input in inputs {
                    input.render(f, depth + 1)?;
                }
                return Ok(());
            }
            PlanNode::Unique(input) => {
                writeln!(f, "{}Unique", pad)?;
                input
            }
            PlanNode::TargetFilter {
                input,
                targets,
                view,
                keep,
            } => {
                let list: Vec<String> = targets.iter().map(Target::to_string).collect();
                let mode = if *keep { "in" } else { "not in" };
                writeln!(f, "{}TargetFilter {} {} [{}]", pad, mode, view, list.join(", "))?;
                input
            }
            PlanNode::ReferrersJoin { input, path } => {
                writeln!(f, "{}ReferrersJoin {}", pad, path_label(path))?;
                input
            }
            PlanNode::ValuesJoin { input, path } => {
                writeln!(f, "{}ValuesJoin {}", pad, path_label(path))?;
                input
            }
            PlanNode::ValueFilter { input, shape } => {
                writeln!(f, "{}ValueFilter {}", pad, shape.constraint.component().local_name())?;
                input
            }
            PlanNode::FocusFilter { input, shape } => {
                writeln!(f, "{}FocusFilter {}", pad, shape.constraint.component().local_name())?;
                input
            }
        };
        input.render(f, depth + 1)
    }
}

impl fmt::Display for PlanNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.render(f, 0)
    }
}

fn path_label(path: &Option<Path>) -> String {
    path.as_ref().map_or_else(|| "self".to_string(), Path::to_string)
}

fn flatten<'a>(result: Result<TupleIter<'a>>) -> TupleIter<'a> {
    match result {
        Ok(iter) => iter,
        Err(e) => Box::new(iter::once(Err(e))),
    }
}

fn expand<T, F>(items: Result<Vec<T>>, f: F) -> TupleIter<'static>
where
    T: 'static,
    F: Fn(T) -> ValidationTuple + 'static,
{
    match items {
        Ok(items) => Box::new(items.into_iter().map(move |t| Ok(f(t)))),
        Err(e) => Box::new(iter::once(Err(e))),
    }
}

fn is_target(group: &ConnectionsGroup<'_>, view: ViewKind, targets: &[Target], focus: &Term) -> Result<bool> {
    for target in targets {
        let base = group.pattern();
        let found = match target {
            Target::Node(node) => node == focus,
            Target::Class(class) => {
                focus.is_resource()
                    && group.has(
                        view,
                        &base
                            .subject(focus.clone())
                            .predicate(Term::iri(rdf::TYPE))
                            .object(class.clone()),
                    )?
            }
            Target::SubjectsOf(p) => {
                focus.is_resource() && group.has(view, &base.subject(focus.clone()).predicate(p.clone()))?
            }
            Target::ObjectsOf(p) => group.has(view, &base.predicate(p.clone()).object(focus.clone()))?,
        };
        if found {
            return Ok(true);
        }
    }
    Ok(false)
}

/// Every target of `targets` in `view`. Node targets are included only for the
/// current view; they never change with data.
fn targets_in(group: &ConnectionsGroup<'_>, targets: &[Target], view: ViewKind) -> PlanNode {
    let mut inputs = Vec::new();
    let mut fixed = Vec::new();
    for target in targets {
        let base = group.pattern();
        match target {
            Target::Node(node) => {
                if view == ViewKind::Current {
                    fixed.push(node.clone());
                }
            }
            Target::Class(class) => inputs.push(PlanNode::select(
                group,
                view,
                base.predicate(Term::iri(rdf::TYPE)).object(class.clone()),
                Projection::Subject,
            )),
            Target::SubjectsOf(p) => {
                inputs.push(PlanNode::select(group, view, base.predicate(p.clone()), Projection::Subject))
            }
            Target::ObjectsOf(p) => {
                inputs.push(PlanNode::select(group, view, base.predicate(p.clone()), Projection::Object))
            }
        }
    }
    if !fixed.is_empty() {
        inputs.push(PlanNode::FixedNodes(fixed));
    }
    PlanNode::union(inputs)
}

/// Focus nodes whose values changed through the shape's path
fn changed_focus(group: &ConnectionsGroup<'_>, path: &Path) -> PlanNode {
    let projection = match path {
        Path::Predicate(_) => Projection::Subject,
        Path::Inverse(_) => Projection::Object,
    };
    let pattern = group.pattern().predicate(path.predicate().clone());
    PlanNode::union(vec![
        PlanNode::select(group, ViewKind::Added, pattern.clone(), projection),
        PlanNode::select(group, ViewKind::Removed, pattern, projection),
    ])
}

/// Build the plan for one shape.
///
/// With `validate_entire`, or for constraints whose outcome depends on more
/// than the shape's own path, every target in the current state is checked.
/// Otherwise the focus nodes are narrowed to those the transaction could have
/// invalidated.
pub fn generate_plan(shape: &Arc<Shape>, group: &ConnectionsGroup<'_>, validate_entire: bool) -> PlanNode {
    let targets = &shape.targets;
    let focus = if validate_entire || shape.constraint.needs_full_scan() {
        targets_in(group, targets, ViewKind::Current)
    } else {
        let mut new_targets = targets_in(group, targets, ViewKind::Added);
        if group.has_previous() {
            new_targets = new_targets.target_filter(targets, ViewKind::Previous, false);
        }
        let mut branches = vec![new_targets];
        if let Some(path) = &shape.path {
            branches.push(changed_focus(group, path).target_filter(targets, ViewKind::Current, true));
        }
        if let Constraint::Class(class) = &shape.constraint {
            let untyped = PlanNode::select(
                group,
                ViewKind::Removed,
                group
                    .pattern()
                    .predicate(Term::iri(rdf::TYPE))
                    .object(class.clone()),
                Projection::Subject,
            );
            let path = shape.path.clone();
            branches.push(
                untyped
                    .wrap(|input| PlanNode::ReferrersJoin { input, path })
                    .target_filter(targets, ViewKind::Current, true),
            );
        }
        PlanNode::union(branches)
    };

    let focus = focus.unique();
    if shape.constraint.is_aggregate() {
        focus.wrap(|input| PlanNode::FocusFilter {
            input,
            shape: Arc::clone(shape),
        })
    } else {
        let path = shape.path.clone();
        focus
            .wrap(|input| PlanNode::ValuesJoin { input, path })
            .wrap(|input| PlanNode::ValueFilter {
                input,
                shape: Arc::clone(shape),
            })
    }
}
