//! Scoped timers
//!
//! A spawned timer task that is aborted when its handle is dropped, so
//! deadlines never outlive the connection that armed them.

use std::future::Future;
use std::time::Duration;

use tokio::task::JoinHandle;

/// Owns a timer task; dropping the handle cancels it
#[derive(Debug)]
pub struct TimerHandle(JoinHandle<()>);

impl TimerHandle {
    /// Run `task` in the background until it finishes or the handle drops
    pub fn spawn<F>(task: F) -> Self
    where
        F: Future<Output = ()> + Send + 'static,
    {
        Self(tokio::spawn(task))
    }

    /// Run `on_expire` once `after` has elapsed
    pub fn after<F, Fut>(after: Duration, on_expire: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send,
    {
        Self::spawn(async move {
            tokio::time::sleep(after).await;
            on_expire().await;
        })
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.0.is_finished()
    }
}

impl Drop for TimerHandle {
    fn drop(&mut self) {
        self.0.abort();
    }
}
