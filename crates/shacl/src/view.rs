//! Reasoning-aware read view
//!
//! Wraps a statement source and answers `rdf:type` queries inclusively of
//! subtypes when `include_inferred` is set, without materializing inferred
//! statements anywhere:
//!
//! - `(s, rdf:type, T)` is answered by querying every subtype of `T` and
//!   rewriting the object back to `T`
//! - `(s, rdf:type, ?)` forward-chains every explicit type assertion
//!
//! Every other pattern goes straight to the wrapped source.

use crate::reasoner::RdfsSubClassReasoner;
use shaclstore_core::vocab::rdf;
use shaclstore_core::{Pattern, Result, Statement};
use shaclstore_storage::StatementSource;
use std::collections::BTreeSet;
use std::sync::Arc;

/// Statement source with backward-chaining type inference
#[derive(Clone)]
pub struct ReasoningView<'a> {
    inner: &'a dyn StatementSource,
    reasoner: Option<Arc<RdfsSubClassReasoner>>,
}

impl<'a> ReasoningView<'a> {
    /// Wrap `inner`; `None` disables inference
    pub fn new(inner: &'a dyn StatementSource, reasoner: Option<Arc<RdfsSubClassReasoner>>) -> Self {
        let reasoner = reasoner.filter(|r| !r.is_empty());
        Self { inner, reasoner }
    }

    /// The wrapped source
    pub fn inner(&self) -> &'a dyn StatementSource {
        self.inner
    }

    /// Active reasoner, if any
    pub fn reasoner(&self) -> Option<&RdfsSubClassReasoner> {
        self.reasoner.as_deref()
    }

    fn reasoner_for(&self, pattern: &Pattern, include_inferred: bool) -> Option<&RdfsSubClassReasoner> {
        if include_inferred && pattern.has_predicate(rdf::TYPE) {
            self.reasoner.as_deref()
        } else {
            None
        }
    }
}

impl StatementSource for ReasoningView<'_> {
    fn statements(&self, pattern: &Pattern, include_inferred: bool) -> Result<Vec<Statement>> {
        let reasoner = match self.reasoner_for(pattern, include_inferred) {
            Some(r) => r,
            None => return self.inner.statements(pattern, false),
        };
        let mut out = BTreeSet::new();
        match &pattern.object {
            Some(ty) => {
                for sub in reasoner.backward_chain(ty) {
                    let narrowed = pattern.clone().object(sub);
                    for st in self.inner.statements(&narrowed, false)? {
                        out.insert(Statement {
                            object: ty.clone(),
                            ..st
                        });
                    }
                }
            }
            None => {
                for st in self.inner.statements(pattern, false)? {
                    out.extend(reasoner.forward_chain(&st));
                }
            }
        }
        Ok(out.into_iter().collect())
    }

    fn has_statement(&self, pattern: &Pattern, include_inferred: bool) -> Result<bool> {
        let reasoner = match self.reasoner_for(pattern, include_inferred) {
            Some(r) => r,
            None => return self.inner.has_statement(pattern, false),
        };
        match &pattern.object {
            Some(ty) => {
                for sub in reasoner.backward_chain(ty) {
                    if self.inner.has_statement(&pattern.clone().object(sub), false)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
            None => self.inner.has_statement(pattern, false),
        }
    }

    fn len(&self) -> Result<usize> {
        self.inner.len()
    }
}
