use std::sync::Arc;

/// The state container a [`StateListener`](crate::StateListener) is attached to.
///
/// The listener never mutates the store. It only needs a synchronous read of
/// the latest committed state, and it hands the store to effects so they can
/// dispatch follow-up actions.
///
/// # Example
/// ```ignore
/// struct CounterStore {
///     state: Mutex<Arc<Counter>>,
/// }
///
/// impl Store for CounterStore {
///     type State = Counter;
///     type Action = CounterAction;
///
///     fn get_state(&self) -> Arc<Counter> {
///         self.state.lock().clone()
///     }
///
///     fn dispatch(&self, action: CounterAction) {
///         // run the middleware chain, then the reducer
///     }
/// }
/// ```
pub trait Store: Send + Sync + 'static {
    /// Full state tree that selectors project from.
    type State: Send + Sync + 'static;

    /// Actions accepted by [`dispatch`](Store::dispatch).
    type Action;

    /// Latest committed state. Must be cheap and side-effect free; a flush
    /// pass calls it once per pass.
    fn get_state(&self) -> Arc<Self::State>;

    /// Submit an action to the full processing chain.
    fn dispatch(&self, action: Self::Action);
}
