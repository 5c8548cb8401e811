//! Settings handed to a validation pass, and the statistics it records

use serde::Serialize;
use shaclstore_core::GraphFilter;
use std::time::Duration;

/// Per-pass validation settings
#[derive(Debug, Clone, Default)]
pub struct ValidationSettings {
    /// Validate every target in the current state instead of only what the
    /// transaction touched
    pub validate_entire: bool,
    /// Log each shape's plan tree
    pub log_plans: bool,
    /// Log elapsed times
    pub performance_logging: bool,
    /// Log each violation
    pub log_violations: bool,
    /// Graphs holding the data being validated
    pub data_graph: GraphFilter,
}

/// Bounds on the number of results a report keeps.
///
/// `None` means unbounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ResultLimits {
    /// Maximum results in the whole report
    pub total: Option<usize>,
    /// Maximum results per shape constraint
    pub per_constraint: Option<usize>,
}

impl ResultLimits {
    /// Build limits from signed settings where a negative value means
    /// "unbounded". A negative per-constraint limit falls back to the total;
    /// when both are bounded the per-constraint limit never exceeds the total.
    pub fn from_signed(total: i64, per_constraint: i64) -> Self {
        let total = usize::try_from(total).ok();
        let per_constraint = match usize::try_from(per_constraint).ok() {
            None => total,
            Some(limit) => Some(total.map_or(limit, |t| t.min(limit))),
        };
        Self {
            total,
            per_constraint,
        }
    }
}

/// What a validation pass did
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationStats {
    /// Whole dataset validated with the added view aliased to the base store
    pub bulk: bool,
    /// Every target in the current state was validated
    pub validate_entire: bool,
    /// Validation ran through serializable escalation
    pub escalated: bool,
    /// Base dataset was empty when the transaction began
    pub empty_before_transaction: bool,
    /// Net statements added (after reasoning expansion)
    pub added: usize,
    /// Net statements removed (after reasoning expansion)
    pub removed: usize,
    /// Shapes in the list handed to the pass
    pub shapes_total: usize,
    /// Shapes whose plans were executed
    pub shapes_validated: usize,
    /// Shapes skipped because their plan was statically empty
    pub shapes_skipped: usize,
    /// Violating tuples pulled from plans
    pub tuples: usize,
    /// Select-cache hits
    pub cache_hits: usize,
    /// Select-cache misses
    pub cache_misses: usize,
    /// Plans executed on the worker pool
    pub parallel: bool,
    /// Wall-clock time of the pass
    #[serde(skip)]
    pub elapsed: Duration,
}
