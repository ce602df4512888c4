use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use nova_core::FileDigest;
use parking_lot::{Mutex, MutexGuard};

/// What the index last recorded for one file.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ShardVersion {
    pub digest: FileDigest,
    pub had_errors: bool,
}

impl ShardVersion {
    pub fn new(digest: FileDigest, had_errors: bool) -> Self {
        Self { digest, had_errors }
    }

    /// Whether data described by `self` should replace data described by
    /// `previous`: the contents changed, or the previous compile was broken and
    /// this one is clean.
    pub fn supersedes(&self, previous: &ShardVersion) -> bool {
        self.digest != previous.digest || (previous.had_errors && !self.had_errors)
    }
}

/// Process-wide record of the last indexed version of every file.
///
/// The live index for a path is only ever updated while this table's lock is
/// held, so the table never claims a version newer than the live index has.
#[derive(Debug, Default)]
pub struct ShardVersionTable {
    versions: Mutex<HashMap<PathBuf, ShardVersion>>,
}

impl ShardVersionTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, path: &Path) -> Option<ShardVersion> {
        self.versions.lock().get(path).copied()
    }

    pub fn len(&self) -> usize {
        self.versions.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.versions.lock().is_empty()
    }

    /// Copy of the whole table, to be consulted without re-locking per file.
    pub fn snapshot(&self) -> VersionSnapshot {
        VersionSnapshot(Arc::new(self.versions.lock().clone()))
    }

    /// Record `version` for `path` and run `apply` under the table lock, unless
    /// the recorded version is already at least as good.
    ///
    /// Returns whether the entry was updated.
    pub fn update_if_newer(
        &self,
        path: &Path,
        version: ShardVersion,
        apply: impl FnOnce(),
    ) -> bool {
        let mut versions = self.versions.lock();
        if let Some(current) = versions.get(path) {
            if !version.supersedes(current) {
                return false;
            }
        }
        versions.insert(path.to_path_buf(), version);
        apply();
        true
    }

    /// Hold the lock across a batch of unconditional updates.
    pub(crate) fn lock(&self) -> MutexGuard<'_, HashMap<PathBuf, ShardVersion>> {
        self.versions.lock()
    }
}

/// Immutable, cheaply clonable copy of a [`ShardVersionTable`].
#[derive(Clone, Debug, Default)]
pub struct VersionSnapshot(Arc<HashMap<PathBuf, ShardVersion>>);

impl VersionSnapshot {
    pub fn get(&self, path: &Path) -> Option<&ShardVersion> {
        self.0.get(path)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Whether a freshly computed `candidate` for `path` would change what the
    /// snapshot records.
    pub fn needs_update(&self, path: &Path, candidate: &ShardVersion) -> bool {
        self.get(path)
            .map_or(true, |previous| candidate.supersedes(previous))
    }
}

/// Tells an [`crate::Extractor`] which visited files are worth collecting.
///
/// A file is skipped when its digest matches the recorded version and that
/// version came from a clean compile.
#[derive(Clone, Debug, Default)]
pub struct ContentFilter {
    versions: VersionSnapshot,
}

impl ContentFilter {
    pub fn new(versions: VersionSnapshot) -> Self {
        Self { versions }
    }

    /// A filter that accepts every file.
    pub fn accept_all() -> Self {
        Self::default()
    }

    pub fn should_index(&self, path: &Path, digest: FileDigest) -> bool {
        match self.versions.get(path) {
            Some(previous) => previous.digest != digest || previous.had_errors,
            None => true,
        }
    }

    /// The recorded error state for `path`, if the file was indexed before.
    pub fn had_prior_errors(&self, path: &Path) -> Option<bool> {
        self.versions.get(path).map(|version| version.had_errors)
    }
}
