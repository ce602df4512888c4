use crate::error::CacheError;
use std::path::{Path, PathBuf};

/// Configuration for selecting the on-disk cache root.
#[derive(Clone, Debug, Default)]
pub struct CacheConfig {
    /// Override the global cache directory (the project hash is still appended).
    pub cache_root_override: Option<PathBuf>,
}

impl CacheConfig {
    pub fn from_env() -> Self {
        Self {
            cache_root_override: std::env::var_os("NOVA_CACHE_DIR").map(PathBuf::from),
        }
    }
}

/// Per-project cache directory: `<cache_root>/<project_hash>/`.
#[derive(Clone, Debug)]
pub struct CacheDir {
    project_root: PathBuf,
    project_hash: String,
    root: PathBuf,
}

impl CacheDir {
    pub fn new(project_root: impl AsRef<Path>, config: CacheConfig) -> Result<Self, CacheError> {
        let project_root = std::fs::canonicalize(project_root)?;
        let project_hash =
            nova_core::digest(project_root.to_string_lossy().as_bytes()).to_hex();

        let base = match config.cache_root_override {
            Some(root) => root,
            None => default_cache_root()?,
        };
        let root = base.join(&project_hash);
        std::fs::create_dir_all(root.join("index"))?;

        Ok(Self {
            project_root,
            project_hash,
            root,
        })
    }

    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    pub fn project_hash(&self) -> &str {
        &self.project_hash
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding one `.idx` file per indexed source file.
    pub fn shards_dir(&self) -> PathBuf {
        self.root.join("index")
    }
}

fn default_cache_root() -> Result<PathBuf, CacheError> {
    let home = std::env::var_os("HOME")
        .or_else(|| std::env::var_os("USERPROFILE"))
        .map(PathBuf::from)
        .ok_or(CacheError::MissingHomeDir)?;

    Ok(home.join(".nova").join("cache"))
}
