use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};
use std::time::Duration;

use nova_cache::{CacheConfig, CacheDir, DiskShardStorage, ShardStorage};
use nova_config::BackgroundIndexConfig;
use nova_core::{file_stem, is_header_file, CompileCommand};
use nova_scheduler::{
    BackgroundQueue, ProgressCallback, QueuePriority, QueueStats, Task, ThreadPriority, WorkerPool,
};
use parking_lot::Mutex;
use rand::seq::SliceRandom;

use crate::{
    CompilationDatabase, Extractor, IndexError, IndexSnapshot, Indexer, LiveIndex, Loader, Merger,
    Rebuilder, ShardVersion, ShardVersionTable, WatchGuard,
};

/// External capabilities a [`BackgroundIndex`] is built from.
pub struct Collaborators {
    pub extractor: Arc<dyn Extractor>,
    pub compilation_database: Arc<dyn CompilationDatabase>,
    pub storage: Arc<dyn ShardStorage>,
    pub live_index: Arc<dyn LiveIndex>,
    /// Receives queue counters after every change.
    pub on_progress: Option<ProgressCallback>,
}

/// Open the on-disk shard store for `project_root`, honouring
/// `config.cache_root` and then `NOVA_CACHE_DIR`.
pub fn open_disk_storage(
    project_root: &Path,
    config: &BackgroundIndexConfig,
) -> Result<DiskShardStorage, IndexError> {
    let cache_config = match &config.cache_root {
        Some(root) => CacheConfig {
            cache_root_override: Some(root.clone()),
        },
        None => CacheConfig::from_env(),
    };
    let cache_dir = CacheDir::new(project_root, cache_config)?;
    Ok(DiskShardStorage::for_cache_dir(&cache_dir))
}

/// Keeps the index of a whole project up to date on a pool of worker threads.
///
/// Workers start immediately. The index follows the compilation database's
/// change notifications and can also be fed explicitly with
/// [`BackgroundIndex::enqueue`]. Dropping the index stops it.
pub struct BackgroundIndex {
    inner: Arc<Inner>,
    workers: Mutex<Option<WorkerPool>>,
    watch: Mutex<Option<WatchGuard>>,
}

struct Inner {
    queue: BackgroundQueue,
    versions: Arc<ShardVersionTable>,
    rebuilder: Arc<Rebuilder>,
    loader: Loader,
    indexer: Indexer,
    merger: Merger,
    shuffle_worklist: bool,
}

impl BackgroundIndex {
    pub fn new(config: &BackgroundIndexConfig, collaborators: Collaborators) -> Self {
        let Collaborators {
            extractor,
            compilation_database,
            storage,
            live_index,
            on_progress,
        } = collaborators;

        let threads = config.effective_threads();
        let versions = Arc::new(ShardVersionTable::new());
        let rebuilder = Arc::new(Rebuilder::new(
            Arc::clone(&live_index),
            threads,
            config.effective_tus_before_rebuild(),
        ));

        let inner = Arc::new(Inner {
            queue: BackgroundQueue::with_progress(on_progress),
            loader: Loader::new(
                Arc::clone(&storage),
                Arc::clone(&compilation_database),
                Arc::clone(&versions),
                Arc::clone(&live_index),
                Arc::clone(&rebuilder),
            ),
            indexer: Indexer::new(extractor, Arc::clone(&versions)),
            merger: Merger::new(storage, Arc::clone(&versions), live_index),
            versions,
            rebuilder,
            shuffle_worklist: config.shuffle_worklist,
        });

        let workers = {
            let inner = Arc::clone(&inner);
            WorkerPool::spawn("nova-background-index", threads, move |_| {
                inner.queue.work(|| {
                    inner.rebuilder.idle();
                })
            })
        };
        tracing::info!(
            target: "nova.index",
            threads = workers.len(),
            "started background index"
        );

        // The listener must not keep the index alive.
        let weak: Weak<Inner> = Arc::downgrade(&inner);
        let watch = compilation_database.watch(Box::new(move |changed: &[PathBuf]| {
            if let Some(inner) = weak.upgrade() {
                inner.enqueue(changed.to_vec());
            }
        }));

        Self {
            inner,
            workers: Mutex::new(Some(workers)),
            watch: Mutex::new(Some(watch)),
        }
    }

    /// Schedule a scan of `changed_files`; stale translation units found by
    /// the scan are queued for indexing.
    pub fn enqueue(&self, changed_files: Vec<PathBuf>) {
        self.inner.enqueue(changed_files);
    }

    /// Prioritize indexing of the translation unit related to `path` when
    /// `path` is a header (`foo.h` boosts `foo.cpp`).
    pub fn boost_related(&self, path: &Path) {
        if is_header_file(path) {
            self.inner
                .queue
                .boost(&file_stem(path), QueuePriority::IndexBoostedFile);
        }
    }

    /// Drop pending work, refuse further rebuilds and join the workers.
    ///
    /// In-flight tasks run to completion first. Calling `stop` again is a
    /// no-op.
    pub fn stop(&self) {
        self.watch.lock().take();
        self.inner.rebuilder.shutdown();
        self.inner.queue.stop();
        if let Some(workers) = self.workers.lock().take() {
            workers.join();
            tracing::info!(target: "nova.index", "stopped background index");
        }
    }

    /// The most recently published snapshot.
    pub fn snapshot(&self) -> Arc<IndexSnapshot> {
        self.inner.rebuilder.snapshot()
    }

    /// Publish a snapshot of the current live index right away.
    pub fn rebuild_now(&self) -> bool {
        self.inner.rebuilder.rebuild_now()
    }

    /// Wait until no task is queued or running; `false` on timeout.
    pub fn block_until_idle(&self, timeout: Option<Duration>) -> bool {
        self.inner.queue.block_until_idle(timeout)
    }

    pub fn stats(&self) -> QueueStats {
        self.inner.queue.stats()
    }

    /// The recorded version of `path`, if it has been indexed or loaded.
    pub fn shard_version(&self, path: &Path) -> Option<ShardVersion> {
        self.inner.versions.get(path)
    }

    pub fn rebuilder(&self) -> &Rebuilder {
        &self.inner.rebuilder
    }
}

impl Drop for BackgroundIndex {
    fn drop(&mut self) {
        self.stop();
    }
}

impl Inner {
    fn enqueue(self: &Arc<Self>, changed_files: Vec<PathBuf>) {
        if changed_files.is_empty() {
            return;
        }
        self.queue.push(self.scan_task(changed_files));
    }

    fn scan_task(self: &Arc<Self>, changed_files: Vec<PathBuf>) -> Task {
        let inner = Arc::clone(self);
        Task::new(move || {
            let mut worklist = inner.loader.scan(&changed_files);
            if inner.shuffle_worklist {
                worklist.shuffle(&mut rand::thread_rng());
            }
            tracing::info!(
                target: "nova.index",
                count = worklist.len(),
                "enqueueing translation units for indexing"
            );
            let tasks: Vec<Task> = worklist
                .into_iter()
                .map(|command| inner.index_task(command))
                .collect();
            inner.queue.append(tasks);
        })
        .with_priority(QueuePriority::LoadShards)
        .with_thread_priority(ThreadPriority::Normal)
    }

    fn index_task(self: &Arc<Self>, command: CompileCommand) -> Task {
        let tag = command.filename_stem();
        let inner = Arc::clone(self);
        Task::new(move || match inner.indexer.index(&command) {
            Ok(unit) => {
                inner.merger.merge_unit(unit);
                inner.rebuilder.indexed_tu();
            }
            Err(err) => tracing::error!(
                target: "nova.index",
                path = %command.absolute_path().display(),
                error = %err,
                "failed to index translation unit"
            ),
        })
        .with_priority(QueuePriority::IndexFile)
        .with_tag(tag)
        .with_thread_priority(ThreadPriority::Background)
    }
}
