//! RDFS subclass reasoning
//!
//! Builds two closure maps from the `rdfs:subClassOf` statements visible to a
//! view: type → all supertypes (forward) and type → all subtypes (backward).
//! Both maps contain each mentioned type in its own set.
//!
//! # Closure
//!
//! ```text
//! forward[T] = {T}, backward[T] = {T}      for every mentioned type
//! forward[sub] += sup, backward[sup] += sub for every subClassOf statement
//! repeat: set[T] ∪= set[M] for every member M of set[T]
//! until the total number of set entries stops growing
//! ```
//!
//! Empty maps mean "no reasoning": chaining passes statements and types
//! through unchanged.

use rustc_hash::{FxHashMap, FxHashSet};
use shaclstore_core::vocab::{rdf, rdfs};
use shaclstore_core::{Pattern, Result, Statement, Term};
use shaclstore_storage::StatementSource;
use tracing::trace;

type ClosureMap = FxHashMap<Term, FxHashSet<Term>>;

/// Subclass closure used to expand `rdf:type` assertions
#[derive(Debug, Clone, Default)]
pub struct RdfsSubClassReasoner {
    forward: ClosureMap,
    backward: ClosureMap,
}

impl RdfsSubClassReasoner {
    /// Build from every subclass statement visible in `source`
    pub fn from_source(source: &dyn StatementSource) -> Result<Self> {
        let pattern = Pattern::any().predicate(Term::iri(rdfs::SUB_CLASS_OF));
        let statements = source.statements(&pattern, false)?;
        Ok(Self::from_statements(statements.iter()))
    }

    /// Build from statements; anything but `rdfs:subClassOf` between two
    /// resources is ignored
    pub fn from_statements<'a>(statements: impl IntoIterator<Item = &'a Statement>) -> Self {
        let mut forward = ClosureMap::default();
        let mut backward = ClosureMap::default();

        for st in statements {
            if !st.has_predicate(rdfs::SUB_CLASS_OF) || !st.subject.is_resource() || !st.object.is_resource() {
                continue;
            }
            let (sub, sup) = (&st.subject, &st.object);
            for ty in [sub, sup] {
                forward.entry(ty.clone()).or_insert_with(|| singleton(ty));
                backward.entry(ty.clone()).or_insert_with(|| singleton(ty));
            }
            if let Some(set) = forward.get_mut(sub) {
                set.insert(sup.clone());
            }
            if let Some(set) = backward.get_mut(sup) {
                set.insert(sub.clone());
            }
        }

        let forward_rounds = close(&mut forward);
        let backward_rounds = close(&mut backward);
        trace!(
            target: "shaclstore::validation",
            types = forward.len(),
            forward_rounds,
            backward_rounds,
            "subclass closure computed"
        );
        Self { forward, backward }
    }

    /// True if no subclass statements were seen
    pub fn is_empty(&self) -> bool {
        self.forward.is_empty()
    }

    /// Expand a type assertion into one statement per supertype (the type
    /// itself included). Other statements pass through unchanged.
    pub fn forward_chain(&self, statement: &Statement) -> Vec<Statement> {
        if !statement.has_predicate(rdf::TYPE) {
            return vec![statement.clone()];
        }
        match self.forward.get(&statement.object) {
            Some(supertypes) => {
                let mut out: Vec<Statement> = supertypes
                    .iter()
                    .map(|sup| Statement {
                        object: sup.clone(),
                        ..statement.clone()
                    })
                    .collect();
                out.sort_unstable();
                out
            }
            None => vec![statement.clone()],
        }
    }

    /// Every subtype of `ty`, itself included, in sorted order
    pub fn backward_chain(&self, ty: &Term) -> Vec<Term> {
        match self.backward.get(ty) {
            Some(subtypes) => {
                let mut out: Vec<Term> = subtypes.iter().cloned().collect();
                out.sort_unstable();
                out
            }
            None => vec![ty.clone()],
        }
    }

    /// Supertypes of `ty`, itself included
    pub fn supertypes(&self, ty: &Term) -> Vec<Term> {
        match self.forward.get(ty) {
            Some(set) => {
                let mut out: Vec<Term> = set.iter().cloned().collect();
                out.sort_unstable();
                out
            }
            None => vec![ty.clone()],
        }
    }
}

fn singleton(ty: &Term) -> FxHashSet<Term> {
    let mut set = FxHashSet::default();
    set.insert(ty.clone());
    set
}

fn total_size(map: &ClosureMap) -> usize {
    map.values().map(|set| set.len()).sum()
}

/// Run the fixed-point closure in place and return the number of rounds
fn close(map: &mut ClosureMap) -> usize {
    let mut rounds = 0;
    let mut size = total_size(map);
    loop {
        rounds += 1;
        let keys: Vec<Term> = map.keys().cloned().collect();
        for key in keys {
            let members: Vec<Term> = match map.get(&key) {
                Some(set) => set.iter().cloned().collect(),
                None => continue,
            };
            let mut reachable = FxHashSet::default();
            for member in &members {
                if let Some(set) = map.get(member) {
                    reachable.extend(set.iter().cloned());
                }
            }
            if let Some(set) = map.get_mut(&key) {
                set.extend(reachable);
            }
        }
        let new_size = total_size(map);
        if new_size == size {
            return rounds;
        }
        size = new_size;
    }
}
