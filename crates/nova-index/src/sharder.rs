use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use nova_core::{IncludeGraph, IncludeGraphNode, IndexResult, Shard, SymbolId};

/// Splits one translation unit's [`IndexResult`] into per-file [`Shard`]s.
///
/// Every file in the include graph gets a shard, even an empty one, so a
/// file that contributes nothing is still recorded as indexed. Records owned
/// by files outside the include graph are dropped.
#[derive(Debug)]
pub struct FileShardedIndex {
    result: IndexResult,
    main_file: PathBuf,
    files: BTreeMap<PathBuf, FileSlices>,
}

/// Indices into the result's slabs.
#[derive(Debug, Default)]
struct FileSlices {
    symbols: Vec<usize>,
    refs: Vec<usize>,
    relations: Vec<usize>,
}

impl FileShardedIndex {
    pub fn new(result: IndexResult, main_file: impl Into<PathBuf>) -> Self {
        let mut files: BTreeMap<PathBuf, FileSlices> = result
            .sources
            .keys()
            .map(|path| (path.clone(), FileSlices::default()))
            .collect();

        // Relations live with the declaration of their subject.
        let mut subject_files: HashMap<SymbolId, &Path> = HashMap::new();
        for (idx, symbol) in result.symbols.iter().enumerate() {
            for file in symbol.owning_files() {
                if let Some(slices) = files.get_mut(file) {
                    slices.symbols.push(idx);
                }
            }
            if let Some(file) = symbol.owning_files().next() {
                subject_files.entry(symbol.id).or_insert(file);
            }
        }
        for (idx, r) in result.refs.iter().enumerate() {
            if let Some(slices) = files.get_mut(&r.location.file) {
                slices.refs.push(idx);
            }
        }
        for (idx, relation) in result.relations.iter().enumerate() {
            let Some(file) = subject_files.get(&relation.subject) else {
                continue;
            };
            if let Some(slices) = files.get_mut(*file) {
                slices.relations.push(idx);
            }
        }

        Self {
            result,
            main_file: main_file.into(),
            files,
        }
    }

    pub fn main_file(&self) -> &Path {
        &self.main_file
    }

    /// Files that receive a shard, in path order.
    pub fn files(&self) -> impl Iterator<Item = &Path> {
        self.files.keys().map(PathBuf::as_path)
    }

    pub fn sources(&self) -> &IncludeGraph {
        &self.result.sources
    }

    /// Build the shard for `path`, or `None` if the file was not part of the
    /// compile.
    ///
    /// The shard's include graph holds the file's own node and a stub for each
    /// file it includes directly. Only the main file keeps the compile command.
    pub fn shard(&self, path: &Path) -> Option<Shard> {
        let slices = self.files.get(path)?;
        let node = self.result.sources.get(path)?;

        let mut sources = IncludeGraph::new();
        for include in &node.direct_includes {
            sources.insert(include.clone(), IncludeGraphNode::stub());
        }
        sources.insert(path.to_path_buf(), node.clone());

        Some(Shard {
            symbols: slices
                .symbols
                .iter()
                .map(|&idx| self.result.symbols[idx].clone())
                .collect(),
            refs: slices
                .refs
                .iter()
                .map(|&idx| self.result.refs[idx].clone())
                .collect(),
            relations: slices
                .relations
                .iter()
                .map(|&idx| self.result.relations[idx])
                .collect(),
            sources,
            command: if path == self.main_file {
                self.result.command.clone()
            } else {
                None
            },
        })
    }

    /// Every shard, keyed by file.
    pub fn into_shards(self) -> BTreeMap<PathBuf, Shard> {
        self.files()
            .filter_map(|path| Some((path.to_path_buf(), self.shard(path)?)))
            .collect()
    }
}
