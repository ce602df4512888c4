use std::fmt;

/// Scheduling class of a queued task. Higher variants are dispatched first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum QueuePriority {
    /// Indexing an ordinary file.
    IndexFile,
    /// Indexing a file that is directly relevant to interactive use.
    IndexBoostedFile,
    /// Restoring persisted shards; cheap and unblocks everything else.
    LoadShards,
}

impl QueuePriority {
    pub fn as_str(self) -> &'static str {
        match self {
            QueuePriority::IndexFile => "index-file",
            QueuePriority::IndexBoostedFile => "index-boosted-file",
            QueuePriority::LoadShards => "load-shards",
        }
    }
}

/// How aggressively the OS should schedule the worker while it runs a task.
///
/// This is a hint carried with the task and reported in tracing output; the
/// queue itself never reorders tasks based on it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ThreadPriority {
    #[default]
    Normal,
    Background,
}

pub struct Task {
    run: Box<dyn FnOnce() + Send + 'static>,
    pub priority: QueuePriority,
    /// Tasks sharing a tag can be boosted together, see [`crate::BackgroundQueue::boost`].
    pub tag: Option<String>,
    pub thread_priority: ThreadPriority,
}

impl Task {
    pub fn new(run: impl FnOnce() + Send + 'static) -> Self {
        Self {
            run: Box::new(run),
            priority: QueuePriority::IndexFile,
            tag: None,
            thread_priority: ThreadPriority::Background,
        }
    }

    pub fn with_priority(mut self, priority: QueuePriority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    pub fn with_thread_priority(mut self, thread_priority: ThreadPriority) -> Self {
        self.thread_priority = thread_priority;
        self
    }

    pub(crate) fn run(self) {
        (self.run)()
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("priority", &self.priority)
            .field("tag", &self.tag)
            .field("thread_priority", &self.thread_priority)
            .finish_non_exhaustive()
    }
}
