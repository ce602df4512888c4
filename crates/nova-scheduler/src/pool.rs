use std::sync::Arc;
use std::thread::JoinHandle;

/// A fixed set of named OS threads, joined on drop.
pub struct WorkerPool {
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawn `threads` workers named `{prefix}-{index}`, each running `worker(index)`.
    ///
    /// A worker that fails to spawn is logged and skipped; the pool keeps
    /// whatever threads it did manage to start.
    pub fn spawn<F>(prefix: &str, threads: usize, worker: F) -> Self
    where
        F: Fn(usize) + Send + Sync + 'static,
    {
        let worker = Arc::new(worker);
        let mut handles = Vec::with_capacity(threads);
        for index in 0..threads {
            let worker = Arc::clone(&worker);
            let spawned = std::thread::Builder::new()
                .name(format!("{prefix}-{index}"))
                .spawn(move || worker(index));
            match spawned {
                Ok(handle) => handles.push(handle),
                Err(err) => {
                    tracing::warn!(
                        target: "nova.scheduler",
                        prefix,
                        index,
                        error = %err,
                        "failed to spawn worker thread"
                    );
                }
            }
        }

        if handles.is_empty() && threads > 0 {
            tracing::error!(
                target: "nova.scheduler",
                prefix,
                "no worker threads could be started"
            );
        }

        Self { handles }
    }

    /// Number of running worker threads.
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Wait for every worker to return.
    pub fn join(mut self) {
        self.join_all();
    }

    fn join_all(&mut self) {
        let current = std::thread::current().id();
        for handle in self.handles.drain(..) {
            // A worker dropping the last reference to its own pool must not
            // join itself.
            if handle.thread().id() == current {
                continue;
            }
            if handle.join().is_err() {
                tracing::error!(target: "nova.scheduler", "worker thread panicked");
            }
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.join_all();
    }
}
