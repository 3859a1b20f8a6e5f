//! Scheduling policies for flush passes
//!
//! A [`StateListener`](crate::StateListener) never runs a flush pass on its own.
//! After an action it hands a [`Task`] to the configured [`Scheduler`], which
//! decides when (and on which thread) the pass happens. Because the listener
//! only ever has one task outstanding, whatever delay the scheduler introduces
//! becomes the batching window:
//!
//! - [`Immediate`]: run the task synchronously. Every action gets its own pass.
//! - [`ManualScheduler`]: queue tasks until [`run_pending`](ManualScheduler::run_pending)
//!   is called, e.g. once per frame of an event loop.
//! - [`TimerScheduler`]: run tasks on a background thread after a fixed delay.
//! - Any `Fn(Task) + Send + Sync` closure.
//!
//! ## Usage
//!
//! ```ignore
//! // Flush at most once per frame
//! let frames = ManualScheduler::new();
//! let listener = StateListener::with_config(Config::new().scheduler(frames.clone()));
//!
//! loop {
//!     handle_input();
//!     frames.run_pending();
//! }
//!
//! // Or let a timer thread coalesce bursts of actions
//! let timer = TimerScheduler::new(Duration::from_millis(200))?;
//! let listener = StateListener::with_config(Config::new().scheduler(timer));
//! ```

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::mpsc::{self, Sender};
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;

use crate::error::SchedulerError;

/// Deferred unit of work handed to a scheduler.
///
/// A task must be run at most once. Dropping it without running is allowed:
/// the listener treats the pass as abandoned and accepts new requests.
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Policy deciding when a requested flush pass runs.
pub trait Scheduler: Send + Sync + 'static {
    /// Arrange for `task` to run eventually, exactly once.
    fn schedule(&self, task: Task);
}

impl<F> Scheduler for F
where
    F: Fn(Task) + Send + Sync + 'static,
{
    fn schedule(&self, task: Task) {
        self(task)
    }
}

/// Runs every task synchronously, inside the `schedule` call.
///
/// This is the default policy: the pass happens right after `next` returns,
/// so effects observe every individual action.
#[derive(Clone, Copy, Debug, Default)]
pub struct Immediate;

impl Scheduler for Immediate {
    fn schedule(&self, task: Task) {
        task();
    }
}

/// Queues tasks until the owner explicitly runs them.
///
/// Clones share one queue, so one handle can go into the listener's
/// [`Config`](crate::Config) while another drives it from an event loop.
#[derive(Clone, Default)]
pub struct ManualScheduler {
    queue: Arc<Mutex<VecDeque<Task>>>,
}

impl ManualScheduler {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of tasks waiting to run.
    pub fn pending(&self) -> usize {
        self.queue.lock().len()
    }

    /// Run all queued tasks, including ones queued while running.
    ///
    /// The queue lock is released before each task runs, so tasks may
    /// schedule further work. Returns the number of tasks run.
    pub fn run_pending(&self) -> usize {
        let mut ran = 0;
        loop {
            let Some(task) = self.queue.lock().pop_front() else {
                break;
            };
            task();
            ran += 1;
        }
        ran
    }

    /// Drop all queued tasks without running them.
    pub fn clear(&self) -> usize {
        let dropped: Vec<Task> = self.queue.lock().drain(..).collect();
        dropped.len()
    }
}

impl Scheduler for ManualScheduler {
    fn schedule(&self, task: Task) {
        self.queue.lock().push_back(task);
    }
}

impl std::fmt::Debug for ManualScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManualScheduler")
            .field("pending", &self.pending())
            .finish()
    }
}

/// Default delay of [`TimerScheduler::with_default_delay`], one 60Hz frame.
pub const DEFAULT_TIMER_DELAY: Duration = Duration::from_millis(16);

/// Runs each task on a background thread after a fixed delay.
///
/// Tasks are processed one at a time, in the order they were scheduled. The
/// thread exits once every handle is dropped and the queue is drained.
#[derive(Clone)]
pub struct TimerScheduler {
    sender: Sender<Task>,
    delay: Duration,
}

impl TimerScheduler {
    /// Spawn the timer thread.
    pub fn new(delay: Duration) -> Result<Self, SchedulerError> {
        let (sender, receiver) = mpsc::channel::<Task>();

        // Detached; the worker ends when the channel closes
        thread::Builder::new()
            .name("state-listener-timer".into())
            .spawn(move || {
                // Blocks without spinning while no flush is requested
                while let Ok(task) = receiver.recv() {
                    thread::sleep(delay);
                    task();
                }
                tracing::trace!("timer scheduler stopped");
            })?;

        Ok(Self { sender, delay })
    }

    /// Spawn the timer thread with [`DEFAULT_TIMER_DELAY`].
    pub fn with_default_delay() -> Result<Self, SchedulerError> {
        Self::new(DEFAULT_TIMER_DELAY)
    }

    /// Delay applied before each task.
    pub fn delay(&self) -> Duration {
        self.delay
    }
}

impl Scheduler for TimerScheduler {
    fn schedule(&self, task: Task) {
        if let Err(mpsc::SendError(task)) = self.sender.send(task) {
            // Worker died (a task panicked). Dropping the task releases the
            // listener's pending flag.
            tracing::warn!("timer scheduler thread is gone; dropping flush task");
            drop(task);
        }
    }
}

impl std::fmt::Debug for TimerScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimerScheduler")
            .field("delay", &self.delay)
            .finish()
    }
}
