//! Background indexing pipeline.
//!
//! [`BackgroundIndex`] keeps a symbol index of a whole project up to date
//! without blocking its callers:
//!
//! 1. a change notification enqueues a *scan* task, which restores persisted
//!    shards through the [`Loader`] and works out which translation units are
//!    stale;
//! 2. one *index* task per stale translation unit runs the [`Indexer`], which
//!    invokes the external [`Extractor`] and skips files whose contents did not
//!    change;
//! 3. the [`Merger`] splits the result per file ([`FileShardedIndex`]),
//!    persists the shards and applies them to the [`LiveIndex`];
//! 4. the [`Rebuilder`] periodically publishes a consolidated
//!    [`IndexSnapshot`] for queries.

mod background;
mod collaborators;
mod compile_db;
mod error;
mod file_symbols;
mod indexer;
mod loader;
mod merger;
mod rebuild;
mod sharder;
mod versions;

pub use background::{open_disk_storage, BackgroundIndex, Collaborators};
pub use collaborators::{ChangeListener, CompilationDatabase, Extractor, LiveIndex, WatchGuard};
pub use compile_db::MemoryCompilationDatabase;
pub use error::{ExtractError, IndexError};
pub use file_symbols::{FileSymbols, IndexSnapshot};
pub use indexer::{IndexedUnit, Indexer};
pub use loader::{is_stale, load_index_shards, LoadedShard, Loader};
pub use merger::{MergeOutcome, Merger};
pub use rebuild::{LoadingGuard, Rebuilder};
pub use sharder::FileShardedIndex;
pub use versions::{ContentFilter, ShardVersion, ShardVersionTable, VersionSnapshot};
