use std::sync::{Arc, Weak};

use crate::listener::StateListener;
use crate::store::Store;

/// Interposer returned by [`StateListener::middleware`].
///
/// It sits in the store's action chain: every action is handed to `next`
/// untouched, and once `next` has returned the listener requests a flush pass.
///
/// The store is held weakly, so the store may own the wrapped chain without
/// keeping itself alive. Once the store is dropped, actions still reach
/// `next` but no pass is requested.
///
/// # Example
/// ```ignore
/// let middleware = listener.middleware(store.clone());
///
/// // (next) -> (action) -> R
/// let dispatch = middleware.wrap(move |action| reducer_store.apply(action));
/// dispatch(Action::Increment);
/// ```
pub struct Middleware<St: Store> {
    listener: StateListener<St>,
    store: Weak<St>,
}

impl<St: Store> Middleware<St> {
    pub(crate) fn new(listener: StateListener<St>, store: Weak<St>) -> Self {
        Self { listener, store }
    }

    /// Wrap the next stage of the chain.
    ///
    /// The returned function forwards each action to `next`, returns what
    /// `next` returned, and requests a flush after `next` completed.
    pub fn wrap<N, R>(&self, next: N) -> impl Fn(St::Action) -> R + Send + Sync + use<St, N, R>
    where
        N: Fn(St::Action) -> R + Send + Sync + 'static,
    {
        let listener = self.listener.clone();
        let store = self.store.clone();
        move |action| {
            let result = next(action);
            listener.request_flush(&store);
            result
        }
    }

    /// Request a flush pass without forwarding an action.
    ///
    /// For stores that run their own reducer and only need to tell the
    /// listener that the state may have changed.
    pub fn notify(&self) {
        self.listener.request_flush(&self.store);
    }

    /// The store this middleware is attached to, if it is still alive.
    pub fn store(&self) -> Option<Arc<St>> {
        self.store.upgrade()
    }
}

impl<St: Store> Clone for Middleware<St> {
    fn clone(&self) -> Self {
        Self {
            listener: self.listener.clone(),
            store: self.store.clone(),
        }
    }
}

impl<St: Store> std::fmt::Debug for Middleware<St> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Middleware")
            .field("listener", &self.listener)
            .finish_non_exhaustive()
    }
}
