use std::io;

use thiserror::Error;

/// Errors raised while setting up a scheduler.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// The background thread of a [`TimerScheduler`](crate::TimerScheduler)
    /// could not be started.
    #[error("failed to spawn scheduler thread: {0}")]
    Spawn(#[from] io::Error),
}
