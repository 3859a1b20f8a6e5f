//! Hasher for the identity-keyed maps of the registry.
//!
//! Selector and effect ids are process-local counters, so HashDoS resistance
//! buys nothing here. `FastHashBuilder` is a zero-sized foldhash builder with a
//! fixed seed, which keeps every `IndexMap` in the registry one word smaller
//! than with `RandomState`.

use std::hash::BuildHasher;

use foldhash::fast::{FixedState, FoldHasher};

const SEED: u64 = 0x9e37_79b9_7f4a_7c15;

/// Zero-sized, deterministic `BuildHasher` backed by foldhash.
#[derive(Clone, Copy, Debug, Default)]
pub(crate) struct FastHashBuilder;

impl BuildHasher for FastHashBuilder {
    type Hasher = FoldHasher<'static>;

    #[inline]
    fn build_hasher(&self) -> Self::Hasher {
        FixedState::with_seed(SEED).build_hasher()
    }
}

/// Insertion-ordered map keyed by selector or effect identity.
pub(crate) type IdentityMap<K, V> = indexmap::IndexMap<K, V, FastHashBuilder>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::selector::SelectorId;

    #[test]
    fn builder_has_no_per_map_state() {
        assert_eq!(std::mem::size_of::<FastHashBuilder>(), 0);
    }

    #[test]
    fn ids_hash_identically_across_builders() {
        let id = SelectorId::next();

        assert_eq!(FastHashBuilder.hash_one(id), FastHashBuilder.hash_one(id));
    }

    #[test]
    fn identity_map_keeps_insertion_order() {
        let ids: Vec<SelectorId> = (0..8).map(|_| SelectorId::next()).collect();
        let mut map: IdentityMap<SelectorId, usize> = IdentityMap::default();
        for (n, id) in ids.iter().rev().enumerate() {
            map.insert(*id, n);
        }

        let order: Vec<usize> = map.values().copied().collect();
        assert_eq!(order, (0..8).collect::<Vec<_>>());
    }
}
