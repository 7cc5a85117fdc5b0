//! Containment filter over matched atom sets.

use std::collections::BTreeSet;

use crate::atom::AtomId;

/// Indices of the sets that are a strict subset of some other set.
///
/// Equal sets do not subsume each other, so two rules matching exactly the
/// same atoms both survive.
pub fn subsumed_indices(sets: &[BTreeSet<AtomId>]) -> BTreeSet<usize> {
    sets.iter()
        .enumerate()
        .filter(|(i, set)| {
            sets.iter()
                .enumerate()
                .any(|(j, other)| *i != j && set.len() < other.len() && set.is_subset(other))
        })
        .map(|(i, _)| i)
        .collect()
}
