//! Persistent, per-file storage for background index shards.
//!
//! Shards are a cache, never the source of truth: every read failure degrades
//! to a miss and the indexer simply recompiles the affected translation unit.
//!
//! ## On-disk layout
//!
//! Project-scoped shard caches live under `<cache_root>/<project_hash>/index/`:
//! - `<file name>.<path hash>.idx`: one [`nova_core::Shard`] per source file,
//!   `bincode` encoded inside a versioned envelope that also records the
//!   absolute source path (see [`encode_shard`]).

mod cache_dir;
mod error;
mod shard_store;
mod util;

pub use cache_dir::{CacheConfig, CacheDir};
pub use error::CacheError;
pub use shard_store::{
    decode_shard, encode_shard, shard_file_name, DiskShardStorage, MemoryShardStorage,
    ShardStorage, SHARD_FILE_FORMAT_VERSION,
};
pub use util::{atomic_write, BINCODE_PAYLOAD_LIMIT_BYTES};

pub type Result<T> = std::result::Result<T, CacheError>;
