use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Weak};
use std::thread;

use parking_lot::{Mutex, RwLock};

use crate::config::Config;
use crate::middleware::Middleware;
use crate::projection::Projection;
use crate::registry::{ErasedEffect, ErasedSelector, Registry, Removal};
use crate::selector::{Effect, EffectId, Selector, SelectorId};
use crate::store::Store;

/// Selector-based change detection for a synchronous store
///
/// A `StateListener` keeps a registry of [`Selector`]s, each paired with one
/// or more [`Effect`]s. After every action that passes through its
/// [`Middleware`], it asks the configured scheduler for a flush pass. The pass
/// reads the state once, re-runs every selector, and fires the effects of the
/// selectors whose projection changed according to the equality function.
///
/// # Batching
///
/// At most one pass is outstanding at a time. Actions dispatched while a pass
/// is pending do not schedule another one, so with a deferring scheduler the
/// effects see only the net change of a burst:
///
/// ```ignore
/// let frames = ManualScheduler::new();
/// let listener = StateListener::with_config(Config::new().scheduler(frames.clone()));
/// let middleware = listener.middleware(store.clone());
/// let dispatch = middleware.wrap(|action| store.reduce(action));
///
/// listener.add(
///     &Selector::new(|state: &AppState| state.counter),
///     &Effect::new(|_store, counter: &u64| println!("counter is now {counter}")),
/// );
///
/// dispatch(Action::Increment);
/// dispatch(Action::Increment);
/// dispatch(Action::Increment);
/// frames.run_pending(); // prints "counter is now 3" once
/// ```
///
/// # Reentrancy
///
/// No lock is held while selectors, the equality function or effects run.
/// Effects may register selectors, unsubscribe, reset the listener or
/// dispatch. Selectors registered during a pass are first evaluated by the
/// next pass.
///
/// A request that arrives while a pass is already running (for example from
/// another thread while a [`TimerScheduler`](crate::TimerScheduler) pass
/// executes, or from an effect) cannot be served by that pass, which has read
/// its state. It queues exactly one follow-up pass, scheduled when the running
/// one finishes.
///
/// The listener only holds the store weakly, so a store that owns its own
/// middleware chain is still freed once the last outside handle goes away.
///
/// Cloning is cheap and yields a handle to the same listener.
pub struct StateListener<St: Store> {
    inner: Arc<Inner<St>>,
}

// Flush request states. Requests coalesce while SCHEDULED; once the pass
// has started they can only be served by a follow-up pass.
const IDLE: u8 = 0;
const SCHEDULED: u8 = 1;
const RUNNING: u8 = 2;
const RERUN: u8 = 3;

struct Inner<St: Store> {
    registry: Mutex<Registry<St>>,
    store: RwLock<Option<Weak<St>>>,
    flush_state: AtomicU8,
    config: Config,
}

impl<St: Store> Clone for StateListener<St> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<St: Store> Default for StateListener<St> {
    fn default() -> Self {
        Self::new()
    }
}

impl<St: Store> std::fmt::Debug for StateListener<St> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateListener")
            .field("selectors", &self.len())
            .field("attached", &self.is_attached())
            .field("flush_pending", &self.is_flush_pending())
            .finish()
    }
}

impl<St: Store> StateListener<St> {
    /// Create a listener with default settings, not attached to any store.
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    /// Create a listener with the given settings, not attached to any store.
    pub fn with_config(config: Config) -> Self {
        Self {
            inner: Arc::new(Inner {
                registry: Mutex::new(Registry::default()),
                store: RwLock::new(None),
                flush_state: AtomicU8::new(IDLE),
                config,
            }),
        }
    }

    /// Attach to `store` and return the middleware to interpose in its
    /// action chain.
    ///
    /// Every selector registered before this call is evaluated against the
    /// current state to seed its cached value, so those effects only fire for
    /// changes made after attaching. Attaching again replaces the store.
    ///
    /// Only a weak reference to `store` is kept.
    pub fn middleware(&self, store: Arc<St>) -> Middleware<St> {
        let weak = Arc::downgrade(&store);
        *self.inner.store.write() = Some(weak.clone());
        self.inner.prepare_selectors(&store);
        Middleware::new(self.clone(), weak)
    }

    /// Register `effect` to run whenever `selector`'s projection changes.
    ///
    /// A selector seen for the first time is evaluated immediately if the
    /// listener is attached; that value becomes the baseline and fires
    /// nothing. Adding an effect to a selector that is already registered
    /// does not fire it either: it waits for the next real change.
    pub fn add<V>(
        &self,
        selector: &Selector<St::State, V>,
        effect: &Effect<St, V>,
    ) -> Subscription<St>
    where
        V: Projection,
    {
        let selector_id = selector.id();
        let effect_id = effect.id();
        let erased_effect = erase_effect(effect);

        let generation = {
            let mut registry = self.inner.registry.lock();
            if registry.add_effect(selector_id, effect_id, Arc::clone(&erased_effect)) {
                let generation = registry.generation();
                return Subscription::new(&self.inner, selector_id, effect_id, generation);
            }
            registry.generation()
        };

        let erased_selector = erase_selector(selector);
        let seed = self.inner.attached_store().map(|store| {
            let state = store.get_state();
            erased_selector(&*state)
        });
        if let Some(value) = &seed {
            tracing::trace!(selector = ?selector_id, ?value, "seeded new selector");
        }

        let mut registry = self.inner.registry.lock();
        if registry.generation() != generation {
            // A reset ran while the selector was being evaluated. The
            // registration belongs to the new generation.
            tracing::trace!(selector = ?selector_id, "registry reset during registration");
        }
        registry.insert(selector_id, erased_selector, seed, effect_id, erased_effect);
        Subscription::new(&self.inner, selector_id, effect_id, registry.generation())
    }

    /// Drop every registration and cached value.
    ///
    /// A flush that is already scheduled still runs, but finds nothing to
    /// evaluate. A pass interrupted by the reset stops before the next
    /// selector.
    pub fn reset(&self) {
        let dropped = self.inner.registry.lock().clear();
        tracing::debug!(dropped, "listener reset");
    }

    /// Number of registered selectors.
    pub fn len(&self) -> usize {
        self.inner.registry.lock().len()
    }

    /// True if no selector is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True once [`middleware`](Self::middleware) has been called and the
    /// store is still alive.
    pub fn is_attached(&self) -> bool {
        self.inner.attached_store().is_some()
    }

    /// True while a flush pass is scheduled or running.
    pub fn is_flush_pending(&self) -> bool {
        self.inner.flush_state.load(Ordering::Acquire) != IDLE
    }

    /// Ask the scheduler for a flush pass against `store`, unless one is
    /// already pending.
    pub(crate) fn request_flush(&self, store: &Weak<St>) {
        self.inner.request_flush(store);
    }

    /// Cached value of `selector`, if registered and evaluated.
    #[cfg(test)]
    pub(crate) fn cached(&self, selector: SelectorId) -> Option<Arc<dyn Projection>> {
        self.inner.registry.lock().cached(selector).flatten()
    }
}

impl<St: Store> Inner<St> {
    fn attached_store(&self) -> Option<Arc<St>> {
        self.store.read().as_ref().and_then(Weak::upgrade)
    }

    fn request_flush(self: &Arc<Self>, store: &Weak<St>) {
        if store.strong_count() == 0 {
            tracing::trace!("store is gone; ignoring flush request");
            return;
        }

        let mut current = self.flush_state.load(Ordering::Acquire);
        let next = loop {
            let next = match current {
                IDLE => SCHEDULED,
                RUNNING => RERUN,
                _ => {
                    tracing::trace!("flush already pending; coalescing");
                    return;
                }
            };
            match self.flush_state.compare_exchange(
                current,
                next,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => break next,
                Err(actual) => current = actual,
            }
        };
        if next == RERUN {
            tracing::trace!("pass already running; follow-up pass queued");
            return;
        }

        let guard = PendingGuard {
            inner: Arc::clone(self),
            store: store.clone(),
        };
        self.config.scheduler.schedule(Box::new(move || {
            // Dropped at the end of the pass, on unwind, or with the task if
            // the scheduler discards it.
            let guard = guard;
            if let Some(store) = guard.store.upgrade() {
                guard.inner.flush(&store);
            }
        }));
    }

    /// Seed the cache of every registered selector from the current state.
    fn prepare_selectors(&self, store: &Arc<St>) {
        let (generation, selectors) = {
            let registry = self.registry.lock();
            (registry.generation(), registry.snapshot())
        };
        if selectors.is_empty() {
            return;
        }

        let state = store.get_state();
        let seeded: Vec<(SelectorId, Arc<dyn Projection>)> = selectors
            .into_iter()
            .map(|(id, selector)| (id, selector(&*state)))
            .collect();

        let mut registry = self.registry.lock();
        if registry.generation() != generation {
            return;
        }
        tracing::debug!(selectors = seeded.len(), "attached; seeded registered selectors");
        for (id, value) in seeded {
            registry.seed(id, value);
        }
    }

    /// One flush pass: read the state once and notify changed selectors.
    fn flush(&self, store: &Arc<St>) {
        // From here on, new requests need a pass of their own
        self.flush_state.store(RUNNING, Ordering::Release);

        let (generation, selectors) = {
            let registry = self.registry.lock();
            (registry.generation(), registry.snapshot())
        };
        if selectors.is_empty() {
            tracing::trace!("flush pass with no selectors");
            return;
        }

        let state = store.get_state();
        let evaluated = selectors.len();
        let mut changed = 0usize;

        for (id, selector) in selectors {
            let previous = {
                let registry = self.registry.lock();
                if registry.generation() != generation {
                    tracing::debug!("listener reset during flush; abandoning pass");
                    return;
                }
                match registry.cached(id) {
                    Some(previous) => previous,
                    // Unsubscribed by an earlier effect of this pass
                    None => continue,
                }
            };

            let next = selector(&*state);
            if let Some(previous) = &previous {
                if (self.config.equality)(&**previous, &*next) {
                    continue;
                }
            }

            let effects = {
                let mut registry = self.registry.lock();
                if registry.generation() != generation {
                    tracing::debug!("listener reset during flush; abandoning pass");
                    return;
                }
                match registry.commit(id, Arc::clone(&next)) {
                    Some(effects) => effects,
                    None => continue,
                }
            };

            tracing::trace!(
                selector = ?id,
                value = ?next,
                effects = effects.len(),
                "selector changed"
            );
            changed += 1;
            for effect in effects {
                effect(&**store, &*next);
            }
        }

        tracing::debug!(evaluated, changed, "flush pass complete");
    }
}

/// Releases the flush state when the flush task is done with, however that
/// happens, and schedules the follow-up pass if one was requested while the
/// pass ran.
struct PendingGuard<St: Store> {
    inner: Arc<Inner<St>>,
    store: Weak<St>,
}

impl<St: Store> Drop for PendingGuard<St> {
    fn drop(&mut self) {
        let previous = self.inner.flush_state.swap(IDLE, Ordering::AcqRel);
        if previous != RERUN {
            return;
        }
        if thread::panicking() {
            // An immediate scheduler would run the follow-up inside the unwind
            tracing::debug!("pass panicked; dropping follow-up pass");
            return;
        }
        self.inner.request_flush(&self.store);
    }
}

fn erase_selector<S, V>(selector: &Selector<S, V>) -> ErasedSelector<S>
where
    S: 'static,
    V: Projection,
{
    let selector = selector.clone();
    Arc::new(move |state: &S| Arc::new(selector.select(state)) as Arc<dyn Projection>)
}

fn erase_effect<St, V>(effect: &Effect<St, V>) -> ErasedEffect<St>
where
    St: 'static,
    V: Projection,
{
    let effect = effect.clone();
    Arc::new(move |store: &St, value: &dyn Projection| {
        // Values always come from the selector the effect was registered with
        if let Some(value) = value.as_any().downcast_ref::<V>() {
            effect.call(store, value);
        }
    })
}

/// Handle returned by [`StateListener::add`].
///
/// Dropping it keeps the registration alive; call
/// [`unsubscribe`](Subscription::unsubscribe) to remove it. The handle does not
/// keep the listener alive.
pub struct Subscription<St: Store> {
    inner: Weak<Inner<St>>,
    selector: SelectorId,
    effect: EffectId,
    generation: u64,
}

impl<St: Store> Subscription<St> {
    fn new(
        inner: &Arc<Inner<St>>,
        selector: SelectorId,
        effect: EffectId,
        generation: u64,
    ) -> Self {
        Self {
            inner: Arc::downgrade(inner),
            selector,
            effect,
            generation,
        }
    }

    /// Remove the effect from its selector. If it was the selector's last
    /// effect, the selector and its cached value are dropped too.
    ///
    /// Calling this again, after a reset, or after the listener is gone does
    /// nothing.
    pub fn unsubscribe(&self) {
        let Some(inner) = self.inner.upgrade() else {
            return;
        };
        let mut registry = inner.registry.lock();
        if registry.generation() != self.generation {
            return;
        }
        match registry.remove_effect(self.selector, self.effect) {
            Removal::Missing => {}
            Removal::Effect => {
                tracing::trace!(selector = ?self.selector, effect = ?self.effect, "effect removed");
            }
            Removal::Selector => {
                tracing::trace!(selector = ?self.selector, "last effect removed; selector dropped");
            }
        }
    }

    /// Selector this subscription belongs to.
    pub fn selector(&self) -> SelectorId {
        self.selector
    }

    /// Effect this subscription registered.
    pub fn effect(&self) -> EffectId {
        self.effect
    }
}

impl<St: Store> std::fmt::Debug for Subscription<St> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("selector", &self.selector)
            .field("effect", &self.effect)
            .field("generation", &self.generation)
            .finish()
    }
}
