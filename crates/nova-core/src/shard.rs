use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::{CompileCommand, IncludeGraph, IncludeGraphNode, Ref, Relation, Symbol};

/// Everything an extractor produced for one translation unit.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct IndexResult {
    pub symbols: Vec<Symbol>,
    pub refs: Vec<Ref>,
    pub relations: Vec<Relation>,
    /// Files visited during the compile, with their digests.
    pub sources: IncludeGraph,
    pub command: Option<CompileCommand>,
    /// The translation unit did not compile cleanly; the data may be partial.
    pub had_errors: bool,
}

/// One file's slice of an [`IndexResult`].
///
/// `sources` holds the file's own include-graph node plus stub nodes for the
/// files it includes directly, which is enough to walk the include graph from
/// persisted shards alone.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Shard {
    pub symbols: Vec<Symbol>,
    pub refs: Vec<Ref>,
    pub relations: Vec<Relation>,
    pub sources: IncludeGraph,
    /// Only set on the main file of a translation unit.
    pub command: Option<CompileCommand>,
}

impl Shard {
    /// The include-graph node describing `path` itself.
    pub fn node(&self, path: &Path) -> Option<&IncludeGraphNode> {
        self.sources.get(path)
    }

    pub fn is_main_file(&self, path: &Path) -> bool {
        self.node(path).is_some_and(|node| node.flags.is_tu)
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty() && self.refs.is_empty() && self.relations.is_empty()
    }
}
