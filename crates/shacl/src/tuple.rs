//! Row type flowing between plan nodes

use crate::report::ValidationResult;
use crate::shape::Path;
use shaclstore_core::Term;

/// A focus node, optionally with one of its values.
///
/// Target and focus nodes carry no value; value joins fill in `value` and
/// `path`. Constraint filters attach nested results to `details` when the
/// constraint is a logical one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationTuple {
    /// Focus node
    pub focus: Term,
    /// Value node reached through `path`
    pub value: Option<Term>,
    /// Path the value was reached through
    pub path: Option<Path>,
    /// Nested results explaining a logical-constraint failure
    pub details: Vec<ValidationResult>,
}

impl ValidationTuple {
    /// Tuple for a bare focus node
    pub fn focus(focus: Term) -> Self {
        Self {
            focus,
            value: None,
            path: None,
            details: Vec::new(),
        }
    }

    /// Same focus, with a value reached through `path`
    pub fn with_value(&self, value: Term, path: Option<Path>) -> Self {
        Self {
            focus: self.focus.clone(),
            value: Some(value),
            path,
            details: Vec::new(),
        }
    }
}
