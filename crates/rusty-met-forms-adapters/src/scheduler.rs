use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::Instant;

/// A one-shot timer on the tokio runtime. Cancelling (or dropping) the task
/// before its deadline means `on_fire` never runs; work started by `on_fire`
/// is not affected.
#[derive(Debug)]
pub struct ScheduledTask {
    deadline: Instant,
    handle: JoinHandle<()>,
}

impl ScheduledTask {
    /// Must be called from within a tokio runtime.
    pub fn at<C>(deadline: Instant, on_fire: C) -> Self
    where
        C: FnOnce() + Send + 'static,
    {
        let handle = tokio::spawn(async move {
            tokio::time::sleep_until(deadline).await;
            on_fire();
        });
        Self { deadline, handle }
    }

    pub fn after<C>(delay: Duration, on_fire: C) -> Self
    where
        C: FnOnce() + Send + 'static,
    {
        Self::at(Instant::now() + delay, on_fire)
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    pub fn cancel(self) {
        self.handle.abort();
    }
}

impl Drop for ScheduledTask {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
