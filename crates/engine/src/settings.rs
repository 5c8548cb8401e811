//! Per-transaction validation settings

use shaclstore_core::IsolationLevel;

/// How a transaction is validated.
///
/// Ordered from weakest to strongest. When the store's own decision and the
/// caller's request disagree, the weaker one wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ValidationApproach {
    /// Skip validation
    Disabled,
    /// Validate every shape against the whole dataset at prepare
    Bulk,
    /// Track the diff and validate incrementally
    Auto,
}

impl ValidationApproach {
    /// The weaker of two approaches
    pub fn combine(self, other: Self) -> Self {
        self.min(other)
    }
}

/// Tuning requests applied after the approach is resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PerformanceHint {
    /// Run shape plans on the worker pool
    Parallel,
    /// Run shape plans on the calling thread
    Serial,
    /// Memoize select reads
    CacheEnabled,
    /// Do not memoize select reads
    CacheDisabled,
}

/// Options for one transaction
#[derive(Debug, Clone, Default)]
pub struct TransactionSettings {
    /// Isolation level; the configured default when absent
    pub isolation: Option<IsolationLevel>,
    /// Requested approach; combined with the store's decision
    pub approach: Option<ValidationApproach>,
    /// Applied in order
    pub hints: Vec<PerformanceHint>,
}

impl TransactionSettings {
    /// Settings at a given isolation level
    pub fn with_isolation(isolation: IsolationLevel) -> Self {
        Self {
            isolation: Some(isolation),
            ..Self::default()
        }
    }

    /// Request an approach
    pub fn approach(mut self, approach: ValidationApproach) -> Self {
        self.approach = Some(approach);
        self
    }

    /// Add a hint
    pub fn hint(mut self, hint: PerformanceHint) -> Self {
        self.hints.push(hint);
        self
    }
}

/// Resolved knobs for the current transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Effective {
    pub approach: ValidationApproach,
    pub parallel: bool,
    pub cache: bool,
}

impl Effective {
    /// Combine store defaults with the request. Bulk turns off parallelism and
    /// caching unless a hint turns them back on.
    pub fn resolve(store: Effective, settings: &TransactionSettings, forced: Option<ValidationApproach>) -> Self {
        let mut approach = store.approach;
        for requested in settings.approach.iter().chain(forced.iter()) {
            approach = approach.combine(*requested);
        }
        let mut out = Effective {
            approach,
            parallel: store.parallel,
            cache: store.cache,
        };
        if approach == ValidationApproach::Bulk {
            out.parallel = false;
            out.cache = false;
        }
        for hint in &settings.hints {
            match hint {
                PerformanceHint::Parallel => out.parallel = true,
                PerformanceHint::Serial => out.parallel = false,
                PerformanceHint::CacheEnabled => out.cache = true,
                PerformanceHint::CacheDisabled => out.cache = false,
            }
        }
        out
    }
}
