use std::any::Any;
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex, MutexGuard};

use crate::{ProgressCallback, QueuePriority, QueueStats, Task};

/// A priority queue of [`Task`]s shared by a pool of worker threads.
///
/// Tasks are dispatched highest [`QueuePriority`] first and in submission order
/// within a priority. Once dispatched, a task always runs to completion.
pub struct BackgroundQueue {
    state: Mutex<QueueState>,
    cv: Condvar,
    on_progress: Option<ProgressCallback>,
}

#[derive(Default)]
struct QueueState {
    queue: BinaryHeap<QueuedTask>,
    /// Highest boost requested per tag; applies to tasks pushed later too.
    boosts: HashMap<String, QueuePriority>,
    stats: QueueStats,
    next_seq: u64,
    should_stop: bool,
}

struct QueuedTask {
    seq: u64,
    task: Task,
}

impl Ord for QueuedTask {
    fn cmp(&self, other: &Self) -> Ordering {
        self.task
            .priority
            .cmp(&other.task.priority)
            // Earlier submissions win ties.
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for QueuedTask {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for QueuedTask {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for QueuedTask {}

impl QueueState {
    fn enqueue(&mut self, mut task: Task) {
        if let Some(boost) = task.tag.as_ref().and_then(|tag| self.boosts.get(tag)) {
            task.priority = task.priority.max(*boost);
        }
        let seq = self.next_seq;
        self.next_seq += 1;
        self.stats.enqueued += 1;
        self.queue.push(QueuedTask { seq, task });
    }

    fn is_idle(&self) -> bool {
        self.queue.is_empty() && self.stats.active == 0
    }
}

impl BackgroundQueue {
    pub fn new() -> Self {
        Self::with_progress(None)
    }

    pub fn with_progress(on_progress: Option<ProgressCallback>) -> Self {
        Self {
            state: Mutex::new(QueueState::default()),
            cv: Condvar::new(),
            on_progress,
        }
    }

    pub fn push(&self, task: Task) {
        self.append(std::iter::once(task));
    }

    /// Push a batch of tasks under a single lock acquisition.
    pub fn append(&self, tasks: impl IntoIterator<Item = Task>) {
        {
            let mut state = self.state.lock();
            if state.should_stop {
                let dropped = tasks.into_iter().count() as u64;
                state.stats.enqueued += dropped;
                state.stats.cancelled += dropped;
                tracing::debug!(
                    target: "nova.scheduler",
                    dropped,
                    "queue is stopped; dropping new tasks"
                );
                return;
            }
            for task in tasks {
                state.enqueue(task);
            }
            self.notify_progress(&state);
        }
        self.cv.notify_all();
    }

    /// Raise every pending task tagged `tag` to at least `priority`, and
    /// remember the boost for tasks pushed later with the same tag.
    ///
    /// Running and finished tasks are unaffected. Boosts only ever raise a
    /// priority: a later, lower boost for the same tag is ignored.
    pub fn boost(&self, tag: &str, priority: QueuePriority) {
        let mut state = self.state.lock();
        let remembered = state
            .boosts
            .entry(tag.to_owned())
            .or_insert(QueuePriority::IndexFile);
        if *remembered >= priority {
            return;
        }
        *remembered = priority;

        let mut pending = std::mem::take(&mut state.queue).into_vec();
        let mut changed = 0usize;
        for queued in &mut pending {
            if queued.task.tag.as_deref() == Some(tag) && queued.task.priority < priority {
                queued.task.priority = priority;
                changed += 1;
            }
        }
        state.queue = BinaryHeap::from(pending);

        if changed > 0 {
            tracing::debug!(
                target: "nova.scheduler",
                tag,
                priority = priority.as_str(),
                changed,
                "boosted pending tasks"
            );
        }
    }

    /// Drop every pending task and make all workers return once their current
    /// task finishes.
    pub fn stop(&self) {
        {
            let mut state = self.state.lock();
            state.should_stop = true;
            let dropped = state.queue.len() as u64;
            state.queue.clear();
            state.stats.cancelled += dropped;
            self.notify_progress(&state);
        }
        self.cv.notify_all();
    }

    pub fn is_stopped(&self) -> bool {
        self.state.lock().should_stop
    }

    pub fn stats(&self) -> QueueStats {
        self.state.lock().stats
    }

    /// Number of tasks waiting to be dispatched.
    pub fn len(&self) -> usize {
        self.state.lock().queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Worker main loop: run tasks until the queue is stopped.
    ///
    /// `on_idle` runs on the worker that finishes the last outstanding task,
    /// i.e. whenever the queue transitions to idle.
    pub fn work(&self, on_idle: impl Fn()) {
        while let Some(task) = self.next_task() {
            self.run_task(task, &on_idle);
        }
    }

    /// Block until a task is ready and claim it; `None` once stopped.
    pub fn next_task(&self) -> Option<Task> {
        let mut state = self.state.lock();
        while !state.should_stop && state.queue.is_empty() {
            self.cv.wait(&mut state);
        }
        if state.should_stop {
            return None;
        }
        let queued = state.queue.pop()?;
        state.stats.active += 1;
        self.notify_progress(&state);
        Some(queued.task)
    }

    /// Run a task claimed with [`Self::next_task`], then run `on_idle` if the
    /// queue has gone idle.
    ///
    /// Panics from the task or the hook are caught and logged so a single bad
    /// task cannot take a worker down.
    pub fn run_task(&self, task: Task, on_idle: &dyn Fn()) {
        let priority = task.priority;
        let tag = task.tag.clone();
        tracing::trace!(
            target: "nova.scheduler",
            priority = priority.as_str(),
            tag = tag.as_deref().unwrap_or(""),
            thread_priority = ?task.thread_priority,
            "running task"
        );
        if let Err(panic) = catch_unwind(AssertUnwindSafe(|| task.run())) {
            tracing::error!(
                target: "nova.scheduler",
                priority = priority.as_str(),
                tag = tag.as_deref().unwrap_or(""),
                panic = %panic_message(&*panic),
                "task panicked"
            );
        }

        {
            let mut state = self.state.lock();
            // The finished task stays active while the hook runs so only one
            // worker observes the transition to idle.
            let went_idle = state.stats.active == 1 && state.queue.is_empty();
            if went_idle {
                MutexGuard::unlocked(&mut state, || {
                    if let Err(panic) = catch_unwind(AssertUnwindSafe(on_idle)) {
                        tracing::error!(
                            target: "nova.scheduler",
                            panic = %panic_message(&*panic),
                            "idle hook panicked"
                        );
                    }
                });
            }
            state.stats.completed += 1;
            state.stats.active -= 1;
            if went_idle {
                state.stats.last_idle = state.stats.completed;
            }
            self.notify_progress(&state);
        }
        self.cv.notify_all();
    }

    /// Wait until no task is queued or running. Returns `false` on timeout.
    pub fn block_until_idle(&self, timeout: Option<Duration>) -> bool {
        let deadline = timeout.map(|timeout| Instant::now() + timeout);
        let mut state = self.state.lock();
        while !state.is_idle() {
            match deadline {
                Some(deadline) => {
                    if self.cv.wait_until(&mut state, deadline).timed_out() {
                        return state.is_idle();
                    }
                }
                None => self.cv.wait(&mut state),
            }
        }
        true
    }

    fn notify_progress(&self, state: &QueueState) {
        if let Some(on_progress) = &self.on_progress {
            on_progress(state.stats);
        }
    }
}

impl Default for BackgroundQueue {
    fn default() -> Self {
        Self::new()
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(message) = panic.downcast_ref::<&'static str>() {
        message
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message
    } else {
        "<non-string panic payload>"
    }
}
