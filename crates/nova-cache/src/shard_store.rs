use std::collections::HashMap;
use std::path::{Path, PathBuf};

use nova_core::Shard;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::cache_dir::CacheDir;
use crate::error::CacheError;
use crate::util::{
    atomic_write, bincode_deserialize, bincode_deserialize_prefix, bincode_serialize,
    read_file_limited,
};

const SHARD_FILE_MAGIC: [u8; 8] = *b"NOVAIDX\0";
pub const SHARD_FILE_FORMAT_VERSION: u32 = 1;

/// Persistent storage for per-file index shards.
///
/// Implementations must tolerate concurrent calls for different paths; writes
/// for the same path may race and the last one wins.
pub trait ShardStorage: Send + Sync {
    /// Load the shard for `path`, or `None` if there is no usable shard.
    fn load_shard(&self, path: &Path) -> Option<Shard>;

    fn store_shard(&self, path: &Path, shard: &Shard) -> Result<(), CacheError>;
}

#[derive(Serialize)]
struct ShardFile<'a> {
    magic: [u8; 8],
    format_version: u32,
    source: &'a Path,
    payload: &'a Shard,
}

#[derive(Deserialize)]
struct ShardFileOwned {
    magic: [u8; 8],
    format_version: u32,
    source: PathBuf,
    payload: Shard,
}

/// Header fields only; decoded first so version mismatches are reported even
/// when the payload layout changed.
#[derive(Deserialize)]
struct ShardFileHeader {
    magic: [u8; 8],
    format_version: u32,
}

/// Encode `shard` (belonging to `source`) into the on-disk envelope.
pub fn encode_shard(source: &Path, shard: &Shard) -> Result<Vec<u8>, CacheError> {
    bincode_serialize(&ShardFile {
        magic: SHARD_FILE_MAGIC,
        format_version: SHARD_FILE_FORMAT_VERSION,
        source,
        payload: shard,
    })
}

/// Decode a shard file, verifying magic, format version and that it was
/// written for `source`.
pub fn decode_shard(source: &Path, bytes: &[u8]) -> Result<Shard, CacheError> {
    if bytes.len() < SHARD_FILE_MAGIC.len() || bytes[..SHARD_FILE_MAGIC.len()] != SHARD_FILE_MAGIC
    {
        return Err(CacheError::BadMagic);
    }

    let header: ShardFileHeader = bincode_deserialize_prefix(bytes)?;
    debug_assert_eq!(header.magic, SHARD_FILE_MAGIC);
    if header.format_version != SHARD_FILE_FORMAT_VERSION {
        return Err(CacheError::IncompatibleFormatVersion {
            expected: SHARD_FILE_FORMAT_VERSION,
            found: header.format_version,
        });
    }

    let file: ShardFileOwned = bincode_deserialize(bytes)?;
    debug_assert_eq!(file.magic, SHARD_FILE_MAGIC);
    debug_assert_eq!(file.format_version, SHARD_FILE_FORMAT_VERSION);
    if file.source != source {
        return Err(CacheError::SourceMismatch {
            expected: source.to_path_buf(),
            found: file.source,
        });
    }
    if file.payload.node(source).is_none() {
        return Err(CacheError::MissingOwnNode {
            path: source.to_path_buf(),
        });
    }
    Ok(file.payload)
}

/// `<file name>.<16 hex digits of the path hash>.idx`
///
/// Keeps shard files recognizable while avoiding collisions between equally
/// named files in different directories.
pub fn shard_file_name(source: &Path) -> String {
    let name = source
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let hash = nova_core::digest(source.to_string_lossy().as_bytes()).to_hex();
    format!("{name}.{}.idx", &hash[..16])
}

/// Stores one shard file per source file under a project cache directory.
#[derive(Clone, Debug)]
pub struct DiskShardStorage {
    dir: PathBuf,
}

impl DiskShardStorage {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn for_cache_dir(cache_dir: &CacheDir) -> Self {
        Self::new(cache_dir.shards_dir())
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn shard_path(&self, source: &Path) -> PathBuf {
        self.dir.join(shard_file_name(source))
    }
}

impl ShardStorage for DiskShardStorage {
    fn load_shard(&self, path: &Path) -> Option<Shard> {
        let file = self.shard_path(path);
        let bytes = read_file_limited(&file)?;
        match decode_shard(path, &bytes) {
            Ok(shard) => Some(shard),
            Err(err) => {
                tracing::warn!(
                    target: "nova.cache",
                    path = %path.display(),
                    shard_file = %file.display(),
                    error = %err,
                    "ignoring unusable index shard"
                );
                None
            }
        }
    }

    fn store_shard(&self, path: &Path, shard: &Shard) -> Result<(), CacheError> {
        let bytes = encode_shard(path, shard)?;
        atomic_write(&self.shard_path(path), &bytes)
    }
}

/// Keeps shards in memory; useful when persistence is disabled and in tests.
#[derive(Debug, Default)]
pub struct MemoryShardStorage {
    shards: Mutex<HashMap<PathBuf, Shard>>,
    writes: Mutex<Vec<PathBuf>>,
}

impl MemoryShardStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.shards.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, path: &Path) -> Option<Shard> {
        self.shards.lock().get(path).cloned()
    }

    /// Every `store_shard` call so far, in call order.
    pub fn writes(&self) -> Vec<PathBuf> {
        self.writes.lock().clone()
    }
}

impl ShardStorage for MemoryShardStorage {
    fn load_shard(&self, path: &Path) -> Option<Shard> {
        self.get(path)
    }

    fn store_shard(&self, path: &Path, shard: &Shard) -> Result<(), CacheError> {
        self.writes.lock().push(path.to_path_buf());
        self.shards.lock().insert(path.to_path_buf(), shard.clone());
        Ok(())
    }
}
