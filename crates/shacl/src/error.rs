//! Error types for validation
//!
//! Validation failure is an expected outcome and carries the full report.
//! Shape faults are fatal and name the shape they came from.

use crate::report::ValidationReport;
use shaclstore_core::Error;
use thiserror::Error;

/// Result type alias for validation operations
pub type Result<T> = std::result::Result<T, ShaclError>;

/// Errors raised while compiling shapes or validating a transaction
#[derive(Debug, Error)]
pub enum ShaclError {
    /// The transaction produced a non-conforming report
    #[error("Validation failed: {} violation(s)", .0.results().len())]
    ValidationFailed(Box<ValidationReport>),

    /// Compiling or pulling a shape's plan failed
    #[error("Error processing SHACL shape {shape_id}: {message}\n{shape_text}")]
    ShapeFault {
        /// Shape identifier
        shape_id: String,
        /// Rendered shape definition
        shape_text: String,
        /// Underlying failure
        message: String,
    },

    /// Shape definition in the shapes graph is malformed
    #[error("Malformed shape {shape_id}: {message}")]
    ShapeParse {
        /// Shape identifier
        shape_id: String,
        /// What is wrong with it
        message: String,
    },

    /// Store, lock or transaction error
    #[error(transparent)]
    Store(#[from] Error),
}

impl ShaclError {
    /// True for a non-conforming report
    pub fn is_validation_failure(&self) -> bool {
        matches!(self, ShaclError::ValidationFailed(_))
    }

    /// The report, if this is a validation failure
    pub fn report(&self) -> Option<&ValidationReport> {
        match self {
            ShaclError::ValidationFailed(report) => Some(report),
            _ => None,
        }
    }

    /// True for commit conflicts and fail-fast deadlocks
    pub fn is_conflict(&self) -> bool {
        matches!(self, ShaclError::Store(e) if e.is_conflict())
    }

    pub(crate) fn parse(shape_id: impl ToString, message: impl Into<String>) -> Self {
        ShaclError::ShapeParse {
            shape_id: shape_id.to_string(),
            message: message.into(),
        }
    }
}
