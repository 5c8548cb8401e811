//! Indexed statement set
//!
//! A `Dataset` is one immutable version of the store once it has been
//! published behind an `Arc`. Commits clone the current version, apply their
//! writes and publish the result.

use shaclstore_core::{Pattern, Statement, Term};
use std::collections::{BTreeMap, BTreeSet};

/// Statement set indexed by subject and by predicate.
///
/// Both indexes hold full statements in `BTreeSet`s, so every lookup yields
/// statements in `Statement` order and results are deterministic.
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    by_subject: BTreeMap<Term, BTreeSet<Statement>>,
    by_predicate: BTreeMap<Term, BTreeSet<Statement>>,
    len: usize,
}

impl Dataset {
    /// Create an empty dataset
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of statements
    pub fn len(&self) -> usize {
        self.len
    }

    /// True if there are no statements
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Insert a statement, returning true if it was not already present
    pub fn insert(&mut self, statement: Statement) -> bool {
        let inserted = self
            .by_subject
            .entry(statement.subject.clone())
            .or_default()
            .insert(statement.clone());
        if inserted {
            self.by_predicate
                .entry(statement.predicate.clone())
                .or_default()
                .insert(statement);
            self.len += 1;
        }
        inserted
    }

    /// Remove a statement, returning true if it was present
    pub fn remove(&mut self, statement: &Statement) -> bool {
        let removed = match self.by_subject.get_mut(&statement.subject) {
            Some(bucket) => {
                let removed = bucket.remove(statement);
                if bucket.is_empty() {
                    self.by_subject.remove(&statement.subject);
                }
                removed
            }
            None => false,
        };
        if removed {
            if let Some(bucket) = self.by_predicate.get_mut(&statement.predicate) {
                bucket.remove(statement);
                if bucket.is_empty() {
                    self.by_predicate.remove(&statement.predicate);
                }
            }
            self.len -= 1;
        }
        removed
    }

    /// Exact membership test
    pub fn contains(&self, statement: &Statement) -> bool {
        self.by_subject
            .get(&statement.subject)
            .map_or(false, |bucket| bucket.contains(statement))
    }

    /// All statements in order
    pub fn iter(&self) -> impl Iterator<Item = &Statement> + '_ {
        self.by_subject.values().flat_map(|bucket| bucket.iter())
    }

    /// Statements matching a pattern, using the narrowest index available
    pub fn matching<'a>(&'a self, pattern: &'a Pattern) -> Box<dyn Iterator<Item = &'a Statement> + 'a> {
        if let Some(subject) = &pattern.subject {
            match self.by_subject.get(subject) {
                Some(bucket) => Box::new(bucket.iter().filter(move |st| pattern.matches(st))),
                None => Box::new(std::iter::empty()),
            }
        } else if let Some(predicate) = &pattern.predicate {
            match self.by_predicate.get(predicate) {
                Some(bucket) => Box::new(bucket.iter().filter(move |st| pattern.matches(st))),
                None => Box::new(std::iter::empty()),
            }
        } else {
            Box::new(self.iter().filter(move |st| pattern.matches(st)))
        }
    }
}

impl FromIterator<Statement> for Dataset {
    fn from_iter<I: IntoIterator<Item = Statement>>(iter: I) -> Self {
        let mut dataset = Dataset::new();
        for statement in iter {
            dataset.insert(statement);
        }
        dataset
    }
}
