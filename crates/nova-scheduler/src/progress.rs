/// Counters describing the queue, reported after every change.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueStats {
    /// Tasks ever pushed.
    pub enqueued: u64,
    /// Tasks currently running.
    pub active: u64,
    /// Tasks that finished running (including ones that panicked).
    pub completed: u64,
    /// Tasks dropped without running because the queue was stopped.
    pub cancelled: u64,
    /// Value of `completed` the last time the queue went idle.
    pub last_idle: u64,
}

impl QueueStats {
    /// Tasks waiting to be dispatched.
    pub fn queued(&self) -> u64 {
        self.enqueued
            .saturating_sub(self.active)
            .saturating_sub(self.completed)
            .saturating_sub(self.cancelled)
    }
}

/// Observer for [`QueueStats`] updates.
///
/// Invoked while the queue lock is held: it must be cheap and must not call
/// back into the queue.
pub type ProgressCallback = Box<dyn Fn(QueueStats) + Send + Sync>;
