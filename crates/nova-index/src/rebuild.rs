use std::sync::Arc;

use parking_lot::Mutex;

use crate::{IndexSnapshot, LiveIndex};

/// Decides when to fold the live index into a fresh [`IndexSnapshot`].
///
/// Rebuilds are triggered by indexing progress, by the worker pool going idle,
/// by the end of shard loading, or on demand. Each build is stamped with a
/// version and a slower build never replaces a newer published one.
pub struct Rebuilder {
    live: Arc<dyn LiveIndex>,
    tus_before_first_build: usize,
    tus_before_rebuild: usize,
    state: Mutex<RebuildState>,
}

#[derive(Default)]
struct RebuildState {
    active_version: u64,
    started_version: u64,
    indexed_tus: usize,
    indexed_tus_at_last_rebuild: usize,
    /// Nesting depth of start_loading/done_loading.
    loading: usize,
    loaded_shards: usize,
    should_stop: bool,
    published: Arc<IndexSnapshot>,
}

impl Rebuilder {
    pub fn new(
        live: Arc<dyn LiveIndex>,
        tus_before_first_build: usize,
        tus_before_rebuild: usize,
    ) -> Self {
        Self {
            live,
            tus_before_first_build: tus_before_first_build.max(1),
            tus_before_rebuild: tus_before_rebuild.max(1),
            state: Mutex::new(RebuildState::default()),
        }
    }

    /// Called once per successfully indexed translation unit.
    pub fn indexed_tu(&self) -> bool {
        self.maybe_rebuild("after indexing enough files", |state| {
            state.indexed_tus += 1;
            if state.loading > 0 || state.active_version != state.started_version {
                return false;
            }
            self.enough_tus_to_rebuild(state)
        })
    }

    /// Called by a worker when the queue drains. Cheap when there is nothing
    /// new to publish.
    pub fn idle(&self) -> bool {
        self.maybe_rebuild("when background indexer is idle", |state| {
            state.loading == 0
                && state.indexed_tus > state.indexed_tus_at_last_rebuild
                && (state.active_version > 0 || state.indexed_tus >= self.tus_before_first_build)
        })
    }

    pub fn start_loading(&self) {
        let mut state = self.state.lock();
        if state.loading == 0 {
            state.loaded_shards = 0;
        }
        state.loading += 1;
    }

    /// Starts a loading phase that ends when the returned guard is dropped,
    /// including when the loading code unwinds.
    pub fn begin_loading(&self) -> LoadingGuard<'_> {
        self.start_loading();
        LoadingGuard { rebuilder: self }
    }

    pub fn loaded_shards(&self, count: usize) {
        let mut state = self.state.lock();
        debug_assert!(state.loading > 0, "loaded_shards outside of loading");
        state.loaded_shards += count;
    }

    /// Ends a loading phase; publishes a snapshot if anything was restored.
    pub fn done_loading(&self) -> bool {
        self.maybe_rebuild("after loading index from disk", |state| {
            state.loading = state.loading.saturating_sub(1);
            if state.loading > 0 {
                return false;
            }
            state.loaded_shards > 0 || self.enough_tus_to_rebuild(state)
        })
    }

    /// Ends a loading phase without building; used while unwinding.
    fn abandon_loading(&self) {
        let mut state = self.state.lock();
        state.loading = state.loading.saturating_sub(1);
    }

    /// Build and publish a snapshot now, regardless of thresholds.
    pub fn rebuild_now(&self) -> bool {
        self.maybe_rebuild("on request", |_| true)
    }

    /// Refuse all further rebuilds.
    pub fn shutdown(&self) {
        self.state.lock().should_stop = true;
    }

    /// The most recently published snapshot (empty before the first build).
    pub fn snapshot(&self) -> Arc<IndexSnapshot> {
        Arc::clone(&self.state.lock().published)
    }

    /// Version of the published snapshot; 0 before the first build.
    pub fn version(&self) -> u64 {
        self.state.lock().active_version
    }

    pub fn indexed_tus(&self) -> usize {
        self.state.lock().indexed_tus
    }

    fn enough_tus_to_rebuild(&self, state: &RebuildState) -> bool {
        if state.active_version == 0 {
            state.indexed_tus >= self.tus_before_first_build
        } else {
            state.indexed_tus >= state.indexed_tus_at_last_rebuild + self.tus_before_rebuild
        }
    }

    /// Run `check` under the lock; if it agrees, build outside the lock and
    /// publish unless a newer build got there first.
    fn maybe_rebuild(
        &self,
        reason: &'static str,
        check: impl FnOnce(&mut RebuildState) -> bool,
    ) -> bool {
        let version = {
            let mut state = self.state.lock();
            if state.should_stop || !check(&mut state) {
                return false;
            }
            state.started_version += 1;
            state.indexed_tus_at_last_rebuild = state.indexed_tus;
            state.started_version
        };

        tracing::debug!(target: "nova.index", version, reason, "building index snapshot");
        let snapshot = Arc::new(self.live.build_snapshot());

        let mut state = self.state.lock();
        if state.should_stop {
            tracing::debug!(
                target: "nova.index",
                version,
                "discarding snapshot built during shutdown"
            );
            return false;
        }
        if version <= state.active_version {
            tracing::debug!(
                target: "nova.index",
                version,
                active = state.active_version,
                "discarding snapshot superseded by a newer build"
            );
            return false;
        }
        state.active_version = version;
        tracing::info!(
            target: "nova.index",
            version,
            reason,
            symbols = snapshot.symbol_count(),
            files = snapshot.file_count(),
            "published index snapshot"
        );
        state.published = snapshot;
        true
    }
}

/// Open loading phase of a [`Rebuilder`]; see [`Rebuilder::begin_loading`].
#[must_use = "the loading phase ends when the guard is dropped"]
pub struct LoadingGuard<'a> {
    rebuilder: &'a Rebuilder,
}

impl LoadingGuard<'_> {
    pub fn loaded_shards(&self, count: usize) {
        self.rebuilder.loaded_shards(count);
    }
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        if std::thread::panicking() {
            self.rebuilder.abandon_loading();
        } else {
            self.rebuilder.done_loading();
        }
    }
}
