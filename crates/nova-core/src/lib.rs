//! Core shared types for Nova's background indexer.
//!
//! Everything that flows between the indexing pipeline stages lives here: file
//! digests, compile commands, the per-translation-unit [`IndexResult`] produced
//! by an extractor, and the per-file [`Shard`] slices that get persisted and
//! merged into the live index.
//!
//! The symbol/reference records are intentionally minimal; the pipeline only
//! needs to know which file owns each record.

mod command;
mod digest;
mod include_graph;
mod shard;
mod symbol;

pub use command::{file_stem, is_header_file, CompileCommand};
pub use digest::{digest, digest_file, FileDigest};
pub use include_graph::{IncludeGraph, IncludeGraphNode, SourceFlags};
pub use shard::{IndexResult, Shard};
pub use symbol::{
    Ref, RefKind, Relation, RelationKind, Symbol, SymbolId, SymbolKind, SymbolLocation,
};
