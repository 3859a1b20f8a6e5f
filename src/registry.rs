// Registry - selector -> effects map plus the last-value cache
//
// Each selector owns exactly one entry holding:
// - the type-erased projection
// - its effect set (insertion ordered, deduplicated by EffectId)
// - the last observed projection (None until the listener is attached)
//
// The cache lives inside the entry, so the registry is the only strong holder
// of a selector's closure and its last value. Removing the last effect drops
// both; a later registration of the same selector starts from scratch.
//
// GENERATIONS:
// reset() bumps `generation`. Flush passes and subscriptions capture it, and
// any work tagged with an older generation becomes a no-op.
//
// The registry itself is plain data. The listener wraps it in a mutex and
// never holds that mutex while user code (selectors, equality, effects) runs.

use std::sync::Arc;

use crate::hash::IdentityMap;
use crate::projection::Projection;
use crate::selector::{EffectId, SelectorId};
use crate::store::Store;

/// Projection with its value type erased.
pub(crate) type ErasedSelector<S> = Arc<dyn Fn(&S) -> Arc<dyn Projection> + Send + Sync>;

/// Effect with its value type erased. The value always comes from the
/// selector the effect was registered on.
pub(crate) type ErasedEffect<St> = Arc<dyn Fn(&St, &dyn Projection) + Send + Sync>;

struct Entry<St: Store> {
    selector: ErasedSelector<St::State>,
    effects: IdentityMap<EffectId, ErasedEffect<St>>,
    last: Option<Arc<dyn Projection>>,
}

/// Outcome of removing one effect.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Removal {
    /// Selector or effect was not registered
    Missing,
    /// Effect removed, siblings remain
    Effect,
    /// Last effect removed, selector and cached value dropped
    Selector,
}

pub(crate) struct Registry<St: Store> {
    generation: u64,
    entries: IdentityMap<SelectorId, Entry<St>>,
}

impl<St: Store> Default for Registry<St> {
    fn default() -> Self {
        Self {
            generation: 0,
            entries: IdentityMap::default(),
        }
    }
}

impl<St: Store> Registry<St> {
    pub(crate) fn generation(&self) -> u64 {
        self.generation
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    #[cfg(test)]
    pub(crate) fn contains(&self, id: SelectorId) -> bool {
        self.entries.contains_key(&id)
    }

    /// Add `effect` to an already registered selector.
    ///
    /// Returns false if the selector is unknown. Adding an effect that is
    /// already in the set keeps its original position.
    pub(crate) fn add_effect(
        &mut self,
        id: SelectorId,
        effect_id: EffectId,
        effect: ErasedEffect<St>,
    ) -> bool {
        match self.entries.get_mut(&id) {
            Some(entry) => {
                entry.effects.entry(effect_id).or_insert(effect);
                true
            }
            None => false,
        }
    }

    /// Register a selector together with its first effect.
    ///
    /// If the selector was registered in the meantime, its existing cache
    /// entry wins and `seed` is discarded.
    pub(crate) fn insert(
        &mut self,
        id: SelectorId,
        selector: ErasedSelector<St::State>,
        seed: Option<Arc<dyn Projection>>,
        effect_id: EffectId,
        effect: ErasedEffect<St>,
    ) {
        let entry = self.entries.entry(id).or_insert_with(|| Entry {
            selector,
            effects: IdentityMap::default(),
            last: seed,
        });
        entry.effects.entry(effect_id).or_insert(effect);
    }

    pub(crate) fn remove_effect(&mut self, id: SelectorId, effect_id: EffectId) -> Removal {
        let Some(entry) = self.entries.get_mut(&id) else {
            return Removal::Missing;
        };
        if entry.effects.shift_remove(&effect_id).is_none() {
            return Removal::Missing;
        }
        if entry.effects.is_empty() {
            self.entries.shift_remove(&id);
            Removal::Selector
        } else {
            Removal::Effect
        }
    }

    /// Stable copy of the registered selectors, in registration order.
    pub(crate) fn snapshot(&self) -> Vec<(SelectorId, ErasedSelector<St::State>)> {
        self.entries
            .iter()
            .map(|(id, entry)| (*id, Arc::clone(&entry.selector)))
            .collect()
    }

    /// Cached value of a selector.
    ///
    /// `None` if the selector is no longer registered, `Some(None)` if it is
    /// registered but has not been evaluated yet.
    pub(crate) fn cached(&self, id: SelectorId) -> Option<Option<Arc<dyn Projection>>> {
        self.entries.get(&id).map(|entry| entry.last.clone())
    }

    /// Overwrite a selector's cached value without notifying anyone.
    pub(crate) fn seed(&mut self, id: SelectorId, value: Arc<dyn Projection>) {
        if let Some(entry) = self.entries.get_mut(&id) {
            entry.last = Some(value);
        }
    }

    /// Record a changed value and return the effects to notify, in insertion
    /// order. `None` if the selector is no longer registered.
    pub(crate) fn commit(
        &mut self,
        id: SelectorId,
        value: Arc<dyn Projection>,
    ) -> Option<Vec<ErasedEffect<St>>> {
        let entry = self.entries.get_mut(&id)?;
        entry.last = Some(value);
        Some(entry.effects.values().cloned().collect())
    }

    /// Drop every registration and cached value. Returns how many selectors
    /// were discarded.
    pub(crate) fn clear(&mut self) -> usize {
        self.generation = self.generation.wrapping_add(1);
        let dropped = self.entries.len();
        self.entries = IdentityMap::default();
        dropped
    }
}
