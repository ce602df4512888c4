//! Priority task queue and worker pool used by Nova's background indexer.
//!
//! Workers are plain OS threads: each one repeatedly pops the most important
//! ready task from a shared [`BackgroundQueue`] and, whenever the queue drains,
//! runs a caller supplied maintenance hook before blocking again.

mod pool;
mod progress;
mod queue;
mod task;

pub use pool::WorkerPool;
pub use progress::{ProgressCallback, QueueStats};
pub use queue::BackgroundQueue;
pub use task::{QueuePriority, Task, ThreadPriority};
