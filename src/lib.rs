#![deny(missing_docs)]

//! Selector-based change detection for synchronous state stores.
//!
//! A [`StateListener`] sits beside a store that exposes its state through
//! [`Store::get_state`]. You register [`Selector`]s (pure projections of the
//! state) together with [`Effect`]s (callbacks), interpose the listener's
//! [`Middleware`] in the store's action chain, and the listener fires only the
//! effects whose projection actually changed. Re-evaluation is handed to a
//! pluggable [`Scheduler`], so a burst of actions collapses into one pass.
//!
//! # Quick Start
//!
//! ```ignore
//! use state_listener::{Config, Effect, ManualScheduler, Selector, StateListener};
//!
//! let frames = ManualScheduler::new();
//! let listener = StateListener::with_config(Config::new().scheduler(frames.clone()));
//!
//! // Registrations may happen before the store exists
//! let counter = Selector::new(|state: &AppState| state.counter);
//! let subscription = listener.add(
//!     &counter,
//!     &Effect::new(|store: &AppStore, counter: &u64| {
//!         if *counter > 10 {
//!             store.dispatch(Action::Reset);
//!         }
//!     }),
//! );
//!
//! // Attach: seeds cached values, returns the interposer
//! let middleware = listener.middleware(store.clone());
//! let dispatch = middleware.wrap(move |action| reducer.apply(action));
//!
//! dispatch(Action::Increment);
//! dispatch(Action::Increment);
//! frames.run_pending(); // one pass, effect sees the net change
//!
//! subscription.unsubscribe();
//! ```
//!
//! # Core Types
//!
//! - [`StateListener`] - registry, last-value cache and flush coordination.
//! - [`Selector`] / [`Effect`] - identity-carrying projection and callback.
//! - [`Middleware`] - `(next) -> (action) -> R` interposer that requests flushes.
//! - [`Subscription`] - idempotent handle removing one effect.
//! - [`Config`] - equality function and scheduler, fixed at construction.
//!
//! # Scheduling
//!
//! - [`Immediate`] (default) - flush synchronously after each action.
//! - [`ManualScheduler`] - flush when the owner calls `run_pending()`.
//! - [`TimerScheduler`] - flush on a background thread after a delay.
//! - any `Fn(Task) + Send + Sync` closure.
//!
//! # Equality
//!
//! The default equality is the projected value's own `PartialEq`
//! ([`value_eq`]). A custom [`EqualityFn`] receives both values as
//! `&dyn Projection` and can downcast them, e.g. to compare `Arc`s by pointer.

mod config;
mod error;
mod hash;
mod listener;
mod middleware;
mod projection;
mod registry;
mod scheduler;
mod selector;
mod store;

// Core types
pub use listener::{StateListener, Subscription};
pub use middleware::Middleware;
pub use selector::{Effect, EffectId, Selector, SelectorId};
pub use store::Store;

// Configuration
pub use config::Config;
pub use projection::{EqualityFn, Projection, value_eq};

// Scheduling
pub use scheduler::{
    DEFAULT_TIMER_DELAY, Immediate, ManualScheduler, Scheduler, Task, TimerScheduler,
};

pub use error::SchedulerError;
