use std::path::Path;
use std::sync::Arc;

use nova_cache::ShardStorage;
use nova_core::IndexResult;

use crate::{
    FileShardedIndex, IndexedUnit, LiveIndex, ShardVersion, ShardVersionTable, VersionSnapshot,
};

/// What one [`Merger::update`] call did.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MergeOutcome {
    /// Files whose data differed from the snapshot.
    pub selected: usize,
    /// Shards written to storage.
    pub stored: usize,
    /// Shards applied to the live index.
    pub applied: usize,
}

/// Folds a translation unit's result into storage, the version table and the
/// live index.
pub struct Merger {
    storage: Arc<dyn ShardStorage>,
    versions: Arc<ShardVersionTable>,
    live: Arc<dyn LiveIndex>,
}

impl Merger {
    pub fn new(
        storage: Arc<dyn ShardStorage>,
        versions: Arc<ShardVersionTable>,
        live: Arc<dyn LiveIndex>,
    ) -> Self {
        Self {
            storage,
            versions,
            live,
        }
    }

    pub fn merge_unit(&self, unit: IndexedUnit) -> MergeOutcome {
        let had_errors = unit.had_errors();
        self.update(&unit.main_file, unit.result, &unit.versions, had_errors)
    }

    /// Update every file of `result` that is new, changed, or recovering from
    /// a broken compile relative to `snapshot`.
    ///
    /// Storage failures are logged and do not stop the live index update.
    /// Concurrent updates of the same file are last-writer-wins, except that a
    /// result identical to the recorded version is never reapplied.
    pub fn update(
        &self,
        main_file: &Path,
        result: IndexResult,
        snapshot: &VersionSnapshot,
        had_errors: bool,
    ) -> MergeOutcome {
        let selected: Vec<_> = result
            .sources
            .iter()
            .map(|(path, node)| (path.clone(), ShardVersion::new(node.digest, had_errors)))
            .filter(|(path, version)| snapshot.needs_update(path, version))
            .collect();

        let mut outcome = MergeOutcome {
            selected: selected.len(),
            ..MergeOutcome::default()
        };
        let sharded = FileShardedIndex::new(result, main_file);

        for (path, version) in selected {
            let Some(shard) = sharded.shard(&path) else {
                continue;
            };

            // Stored before the live update, which consumes the slabs.
            match self.storage.store_shard(&path, &shard) {
                Ok(()) => outcome.stored += 1,
                Err(err) => tracing::warn!(
                    target: "nova.index",
                    path = %path.display(),
                    error = %err,
                    "failed to write index shard"
                ),
            }

            let is_main_file = path == main_file;
            let applied = self.versions.update_if_newer(&path, version, || {
                self.live.merge(
                    &path,
                    Some(shard.symbols),
                    Some(shard.refs),
                    Some(shard.relations),
                    is_main_file,
                );
            });
            if applied {
                outcome.applied += 1;
            } else {
                tracing::debug!(
                    target: "nova.index",
                    path = %path.display(),
                    "index already up to date; skipping"
                );
            }
        }

        tracing::debug!(
            target: "nova.index",
            path = %main_file.display(),
            selected = outcome.selected,
            stored = outcome.stored,
            applied = outcome.applied,
            "merged translation unit"
        );
        outcome
    }
}
