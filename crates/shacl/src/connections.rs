//! Connections group
//!
//! Bundles the views one validation pass reads from: the current state (base
//! transaction), the previous state (pinned at transaction start), and the
//! materialized added/removed stores. The group also owns the select cache,
//! which memoizes identical select-node reads across shape plans.
//!
//! # Design Notes
//!
//! - **Per pass**: a group is built for one pass and dropped with it
//! - **Concurrent**: cache entries are `OnceCell`s, so two plans asking for the
//!   same select at once compute it a single time
//! - **Inference**: current and previous views answer type queries through the
//!   reasoner; added/removed stores are already expanded and are read as-is

use crate::materialize::MaterializedDiff;
use crate::reasoner::RdfsSubClassReasoner;
use crate::shape::EvalContext;
use crate::view::ReasoningView;
use dashmap::DashMap;
use once_cell::sync::OnceCell;
use shaclstore_core::{GraphFilter, Pattern, Result, Term};
use shaclstore_storage::{StatementSource, StoreSnapshot};
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Which view a plan node reads from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ViewKind {
    /// State including the transaction's writes
    Current,
    /// State at transaction start
    Previous,
    /// Net additions
    Added,
    /// Net removals
    Removed,
}

impl fmt::Display for ViewKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ViewKind::Current => "current",
            ViewKind::Previous => "previous",
            ViewKind::Added => "added",
            ViewKind::Removed => "removed",
        })
    }
}

/// Statement position a select projects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Projection {
    /// Subjects of matching statements
    Subject,
    /// Objects of matching statements
    Object,
}

type SelectKey = (ViewKind, Pattern, Projection);
type SelectCell = Arc<OnceCell<Arc<Vec<Term>>>>;

/// Views and cache for one validation pass
pub struct ConnectionsGroup<'a> {
    current: ReasoningView<'a>,
    previous: Option<ReasoningView<'a>>,
    added: Option<StoreSnapshot>,
    removed: Option<StoreSnapshot>,
    reasoning: bool,
    data_graph: GraphFilter,
    cache: Option<DashMap<SelectKey, SelectCell>>,
    hits: AtomicUsize,
    misses: AtomicUsize,
}

impl<'a> ConnectionsGroup<'a> {
    /// Assemble a group.
    ///
    /// In bulk mode the added view aliases `current` and there is no removed
    /// view. `previous` is `None` for escalated passes.
    pub fn new(
        current: &'a dyn StatementSource,
        previous: Option<&'a dyn StatementSource>,
        diff: &MaterializedDiff,
        reasoner: Option<Arc<RdfsSubClassReasoner>>,
        data_graph: GraphFilter,
        cache_select_nodes: bool,
    ) -> Self {
        let (added, removed) = match diff {
            MaterializedDiff::Bulk => (None, None),
            MaterializedDiff::Incremental { added, removed } => {
                (Some(added.expanded().clone()), Some(removed.expanded().clone()))
            }
        };
        let current = ReasoningView::new(current, reasoner.clone());
        let reasoning = current.reasoner().is_some();
        Self {
            current,
            previous: previous.map(|p| ReasoningView::new(p, reasoner)),
            added,
            removed,
            reasoning,
            data_graph,
            cache: cache_select_nodes.then(DashMap::new),
            hits: AtomicUsize::new(0),
            misses: AtomicUsize::new(0),
        }
    }

    /// True if this pass has a previous-state view
    pub fn has_previous(&self) -> bool {
        self.previous.is_some()
    }

    /// True if the added view aliases the current view
    pub fn is_bulk(&self) -> bool {
        self.added.is_none()
    }

    /// Graphs holding the data under validation
    pub fn data_graph(&self) -> &GraphFilter {
        &self.data_graph
    }

    /// Pattern restricted to the data graphs
    pub fn pattern(&self) -> Pattern {
        Pattern::any().graph(self.data_graph.clone())
    }

    /// True if reads of `kind` can skip the reasoner
    pub fn include_inferred(&self, kind: ViewKind) -> bool {
        match kind {
            ViewKind::Current | ViewKind::Previous => self.reasoning,
            ViewKind::Added | ViewKind::Removed => false,
        }
    }

    /// The source behind `kind`, if the pass has one
    pub fn view(&self, kind: ViewKind) -> Option<&dyn StatementSource> {
        match kind {
            ViewKind::Current => Some(&self.current as &dyn StatementSource),
            ViewKind::Previous => self.previous.as_ref().map(|v| v as &dyn StatementSource),
            ViewKind::Added => match &self.added {
                Some(added) => Some(added as &dyn StatementSource),
                None => Some(&self.current as &dyn StatementSource),
            },
            ViewKind::Removed => self.removed.as_ref().map(|v| v as &dyn StatementSource),
        }
    }

    /// True if `kind` is known to hold no statements, without reading it
    pub fn is_statically_empty(&self, kind: ViewKind) -> bool {
        match kind {
            ViewKind::Current => false,
            ViewKind::Previous => self.previous.is_none(),
            ViewKind::Added => self.added.as_ref().map_or(false, |s| s.dataset().is_empty()),
            ViewKind::Removed => self.removed.as_ref().map_or(true, |s| s.dataset().is_empty()),
        }
    }

    /// Projected terms of the statements matching `pattern` in `kind`,
    /// sorted and deduplicated. Served from the select cache when enabled.
    pub fn select(&self, kind: ViewKind, pattern: &Pattern, projection: Projection) -> Result<Arc<Vec<Term>>> {
        let cache = match &self.cache {
            Some(cache) => cache,
            None => return self.read(kind, pattern, projection),
        };
        let key = (kind, pattern.clone(), projection);
        let cell = cache.entry(key).or_default().value().clone();
        if cell.get().is_some() {
            self.hits.fetch_add(1, Ordering::Relaxed);
        }
        let terms = cell.get_or_try_init(|| {
            self.misses.fetch_add(1, Ordering::Relaxed);
            self.read(kind, pattern, projection)
        })?;
        Ok(Arc::clone(terms))
    }

    /// True if any statement matches `pattern` in `kind`
    pub fn has(&self, kind: ViewKind, pattern: &Pattern) -> Result<bool> {
        match self.view(kind) {
            Some(view) => view.has_statement(pattern, self.include_inferred(kind)),
            None => Ok(false),
        }
    }

    /// Select-cache hits so far
    pub fn cache_hits(&self) -> usize {
        self.hits.load(Ordering::Relaxed)
    }

    /// Select-cache misses so far
    pub fn cache_misses(&self) -> usize {
        self.misses.load(Ordering::Relaxed)
    }

    pub(crate) fn eval_context(&self) -> EvalContext<'_> {
        EvalContext {
            view: &self.current,
            include_inferred: self.reasoning,
            graph: &self.data_graph,
        }
    }

    fn read(&self, kind: ViewKind, pattern: &Pattern, projection: Projection) -> Result<Arc<Vec<Term>>> {
        let view = match self.view(kind) {
            Some(view) => view,
            None => return Ok(Arc::new(Vec::new())),
        };
        let mut terms: Vec<Term> = view
            .statements(pattern, self.include_inferred(kind))?
            .into_iter()
            .map(|st| match projection {
                Projection::Subject => st.subject,
                Projection::Object => st.object,
            })
            .collect();
        terms.sort_unstable();
        terms.dedup();
        Ok(Arc::new(terms))
    }
}

impl Drop for ConnectionsGroup<'_> {
    fn drop(&mut self) {
        debug!(
            target: "shaclstore::validation",
            cache_hits = self.cache_hits(),
            cache_misses = self.cache_misses(),
            "Closing connections group"
        );
    }
}
