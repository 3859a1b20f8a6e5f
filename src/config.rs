use std::fmt;
use std::sync::Arc;

use crate::projection::{EqualityFn, Projection, default_equality};
use crate::scheduler::{Immediate, Scheduler};

/// Construction-time settings of a [`StateListener`](crate::StateListener).
///
/// # Example
///
/// ```ignore
/// // Defaults: PartialEq equality, synchronous flushing
/// let listener = StateListener::new();
///
/// // Compare Debug renderings and flush on a timer thread
/// let listener = StateListener::with_config(
///     Config::new()
///         .equality_fn(|a, b| format!("{a:?}") == format!("{b:?}"))
///         .scheduler(TimerScheduler::new(Duration::from_millis(200))?),
/// );
/// ```
#[derive(Clone)]
pub struct Config {
    pub(crate) equality: EqualityFn,
    pub(crate) scheduler: Arc<dyn Scheduler>,
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

impl Config {
    /// Settings with every default applied.
    ///
    /// Defaults:
    /// - `equality_fn`: [`value_eq`](crate::value_eq)
    /// - `scheduler`: [`Immediate`]
    pub fn new() -> Self {
        Self {
            equality: default_equality(),
            scheduler: Arc::new(Immediate),
        }
    }

    /// Set the predicate deciding whether a projection changed.
    ///
    /// Effects fire when it returns `false` for the cached and the new value.
    pub fn equality_fn<F>(mut self, f: F) -> Self
    where
        F: Fn(&dyn Projection, &dyn Projection) -> bool + Send + Sync + 'static,
    {
        self.equality = Arc::new(f);
        self
    }

    /// Set the policy deciding when flush passes run.
    pub fn scheduler<S: Scheduler>(mut self, scheduler: S) -> Self {
        self.scheduler = Arc::new(scheduler);
        self
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config").finish_non_exhaustive()
    }
}
