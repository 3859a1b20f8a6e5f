use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_SELECTOR_ID: AtomicU64 = AtomicU64::new(0);
static NEXT_EFFECT_ID: AtomicU64 = AtomicU64::new(0);

/// Identity of a [`Selector`]. Clones share it; every `Selector::new` gets a
/// fresh one.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct SelectorId(u64);

impl SelectorId {
    pub(crate) fn next() -> Self {
        Self(NEXT_SELECTOR_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// Identity of an [`Effect`]. Clones share it; every `Effect::new` gets a
/// fresh one.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct EffectId(u64);

impl EffectId {
    pub(crate) fn next() -> Self {
        Self(NEXT_EFFECT_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// Pure projection from the store's state to a value of interest.
///
/// Selectors are compared by identity, not by behaviour: two selectors built
/// from identical closures are two registry entries, while clones of one
/// selector share a single entry and a single cached value.
///
/// # Example
/// ```ignore
/// let counter = Selector::new(|state: &AppState| state.counter);
/// let same = counter.clone();
/// assert_eq!(counter.id(), same.id());
/// ```
pub struct Selector<S: ?Sized, V> {
    id: SelectorId,
    f: Arc<dyn Fn(&S) -> V + Send + Sync>,
}

impl<S: ?Sized, V> Selector<S, V> {
    /// Wrap a projection function, assigning it a new identity.
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&S) -> V + Send + Sync + 'static,
    {
        Self {
            id: SelectorId::next(),
            f: Arc::new(f),
        }
    }

    /// Registry key of this selector.
    pub fn id(&self) -> SelectorId {
        self.id
    }

    /// Run the projection.
    pub fn select(&self, state: &S) -> V {
        (self.f)(state)
    }
}

impl<S: ?Sized, V> Clone for Selector<S, V> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            f: Arc::clone(&self.f),
        }
    }
}

impl<S: ?Sized, V> fmt::Debug for Selector<S, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Selector").field(&self.id).finish()
    }
}

/// Callback fired with the store handle and a selector's new value.
///
/// Like selectors, effects have identity: adding the same effect to the same
/// selector twice registers it once.
pub struct Effect<St: ?Sized, V> {
    id: EffectId,
    f: Arc<dyn Fn(&St, &V) + Send + Sync>,
}

impl<St: ?Sized, V> Effect<St, V> {
    /// Wrap a callback, assigning it a new identity.
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&St, &V) + Send + Sync + 'static,
    {
        Self {
            id: EffectId::next(),
            f: Arc::new(f),
        }
    }

    /// Identity of this effect within an effect set.
    pub fn id(&self) -> EffectId {
        self.id
    }

    /// Invoke the callback directly.
    pub fn call(&self, store: &St, value: &V) {
        (self.f)(store, value)
    }
}

impl<St: ?Sized, V> Clone for Effect<St, V> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            f: Arc::clone(&self.f),
        }
    }
}

impl<St: ?Sized, V> fmt::Debug for Effect<St, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Effect").field(&self.id).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_identity() {
        let selector = Selector::new(|n: &u32| n * 2);
        let clone = selector.clone();

        assert_eq!(selector.id(), clone.id());
        assert_eq!(clone.select(&21), 42);
    }

    #[test]
    fn identical_closures_are_distinct_selectors() {
        let a = Selector::new(|n: &u32| *n);
        let b = Selector::new(|n: &u32| *n);

        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn effect_call_forwards_arguments() {
        let effect = Effect::new(|store: &Vec<u32>, value: &u32| {
            assert_eq!(store.as_slice(), &[1, 2]);
            assert_eq!(*value, 7);
        });

        effect.call(&vec![1, 2], &7);
        assert_eq!(effect.clone().id(), effect.id());
    }
}
