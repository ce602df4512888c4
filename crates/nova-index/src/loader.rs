use std::collections::{BTreeSet, HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use nova_cache::ShardStorage;
use nova_core::{digest_file, CompileCommand, FileDigest, Shard};

use crate::{CompilationDatabase, LiveIndex, Rebuilder, ShardVersion, ShardVersionTable};

/// A persisted shard restored for one file, or the record that none exists.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LoadedShard {
    pub absolute_path: PathBuf,
    /// Digest the shard was built from; [`FileDigest::UNKNOWN`] without a shard.
    pub digest: FileDigest,
    pub had_errors: bool,
    /// The file was the main file of the compile that produced the shard.
    pub is_tu: bool,
    /// Translation unit to recompile if this file turns out to be stale.
    pub dependent_tu: PathBuf,
    pub shard: Option<Shard>,
}

/// Restore shards for `main_files` and, transitively, for every file they
/// include according to the stored include graphs.
///
/// Files are visited breadth-first and at most once; the first translation
/// unit that reaches a file becomes its [`LoadedShard::dependent_tu`].
pub fn load_index_shards(main_files: &[PathBuf], storage: &dyn ShardStorage) -> Vec<LoadedShard> {
    let mut visited: HashSet<PathBuf> = HashSet::new();
    let mut pending: VecDeque<(PathBuf, PathBuf)> = VecDeque::new();
    let mut loaded = Vec::new();

    for main_file in main_files {
        pending.push_back((main_file.clone(), main_file.clone()));
        while let Some((path, dependent_tu)) = pending.pop_front() {
            if !visited.insert(path.clone()) {
                continue;
            }

            let Some(shard) = storage.load_shard(&path) else {
                loaded.push(LoadedShard {
                    absolute_path: path,
                    digest: FileDigest::UNKNOWN,
                    had_errors: false,
                    is_tu: false,
                    dependent_tu,
                    shard: None,
                });
                continue;
            };

            let node = shard.node(&path).cloned().unwrap_or_default();
            for include in &node.direct_includes {
                if !visited.contains(include) {
                    pending.push_back((include.clone(), dependent_tu.clone()));
                }
            }
            loaded.push(LoadedShard {
                absolute_path: path,
                digest: node.digest,
                had_errors: node.flags.had_errors,
                is_tu: node.flags.is_tu,
                dependent_tu,
                shard: Some(shard),
            });
        }
    }

    loaded
}

/// Whether `loaded` no longer reflects the file on disk: there is no shard,
/// the contents changed, or the shard came from a broken compile.
///
/// A file that cannot be read is never stale; there is nothing to reindex.
pub fn is_stale(loaded: &LoadedShard) -> bool {
    let current = match digest_file(&loaded.absolute_path) {
        Ok(digest) => digest,
        Err(err) => {
            tracing::debug!(
                target: "nova.index",
                path = %loaded.absolute_path.display(),
                error = %err,
                "cannot read file to check shard staleness"
            );
            return false;
        }
    };
    loaded.shard.is_none() || current != loaded.digest || loaded.had_errors
}

/// Restores persisted shards into the live index and decides which
/// translation units need to be recompiled.
pub struct Loader {
    storage: Arc<dyn ShardStorage>,
    compilation_database: Arc<dyn CompilationDatabase>,
    versions: Arc<ShardVersionTable>,
    live: Arc<dyn LiveIndex>,
    rebuilder: Arc<Rebuilder>,
}

impl Loader {
    pub fn new(
        storage: Arc<dyn ShardStorage>,
        compilation_database: Arc<dyn CompilationDatabase>,
        versions: Arc<ShardVersionTable>,
        live: Arc<dyn LiveIndex>,
        rebuilder: Arc<Rebuilder>,
    ) -> Self {
        Self {
            storage,
            compilation_database,
            versions,
            live,
            rebuilder,
        }
    }

    /// Load stored shards for `main_files` and return the compile commands of
    /// every translation unit with a stale file.
    ///
    /// Stale shards are still applied: old data is better than none while the
    /// recompile is pending. Translation units without a compile command are
    /// dropped.
    pub fn scan(&self, main_files: &[PathBuf]) -> Vec<CompileCommand> {
        let loading = self.rebuilder.begin_loading();
        let loaded = load_index_shards(main_files, self.storage.as_ref());

        let mut restored = 0usize;
        {
            let mut versions = self.versions.lock();
            for shard in &loaded {
                let Some(contents) = &shard.shard else {
                    continue;
                };
                versions.insert(
                    shard.absolute_path.clone(),
                    ShardVersion::new(shard.digest, shard.had_errors),
                );
                self.live.merge(
                    &shard.absolute_path,
                    Some(contents.symbols.clone()),
                    Some(contents.refs.clone()),
                    Some(contents.relations.clone()),
                    shard.is_tu,
                );
                restored += 1;
            }
        }
        loading.loaded_shards(restored);
        drop(loading);

        let stale_tus: BTreeSet<&Path> = loaded
            .iter()
            .filter(|shard| is_stale(shard))
            .map(|shard| shard.dependent_tu.as_path())
            .collect();

        let mut commands = Vec::with_capacity(stale_tus.len());
        for tu in stale_tus {
            match self.compilation_database.compile_command(tu) {
                Some(command) => commands.push(command),
                None => tracing::debug!(
                    target: "nova.index",
                    path = %tu.display(),
                    "no compile command for stale translation unit; skipping"
                ),
            }
        }

        tracing::info!(
            target: "nova.index",
            requested = main_files.len(),
            visited = loaded.len(),
            restored,
            stale = commands.len(),
            "loaded index shards"
        );
        commands
    }
}
