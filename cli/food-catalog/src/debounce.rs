use std::future::Future;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::trace;

/// Runs only the last of a burst of scheduled actions.
///
/// Each [`Debouncer::schedule`] starts a timer and cancels the previous timer
/// if it has not fired yet. When a timer fires its action is spawned as a
/// separate task: later schedules or [`Debouncer::cancel`] never interrupt an
/// action that is already running.
///
/// Must be used from within a tokio runtime.
#[derive(Debug)]
pub struct Debouncer {
    window: Duration,
    timer: Mutex<Option<JoinHandle<()>>>,
}

impl Debouncer {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            timer: Mutex::new(None),
        }
    }

    /// Run `action` once the window has passed without another schedule.
    pub fn schedule<F>(&self, action: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let window = self.window;
        let timer = tokio::spawn(async move {
            tokio::time::sleep(window).await;
            trace!("debounce window elapsed");
            tokio::spawn(action);
        });

        if let Some(previous) = self.lock().replace(timer) {
            if !previous.is_finished() {
                trace!("superseding pending action");
            }
            previous.abort();
        }
    }

    /// Drop the pending action, if any. Returns whether one was pending.
    pub fn cancel(&self) -> bool {
        match self.lock().take() {
            Some(timer) => {
                let pending = !timer.is_finished();
                timer.abort();
                pending
            },
            None => false,
        }
    }

    /// Whether an action is waiting for its window to pass.
    pub fn is_pending(&self) -> bool {
        self.lock()
            .as_ref()
            .is_some_and(|timer| !timer.is_finished())
    }

    fn lock(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        self.timer.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for Debouncer {
    fn drop(&mut self) {
        self.cancel();
    }
}
