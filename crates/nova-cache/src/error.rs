use std::path::PathBuf;

/// Errors produced by shard persistence.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("failed to determine home directory for default cache path")]
    MissingHomeDir,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("bincode error: {0}")]
    Bincode(#[from] bincode::Error),

    #[error("not a shard file (bad magic bytes)")]
    BadMagic,

    #[error("incompatible shard format version: expected {expected}, found {found}")]
    IncompatibleFormatVersion { expected: u32, found: u32 },

    #[error("shard belongs to {}, expected {}", .found.display(), .expected.display())]
    SourceMismatch { expected: PathBuf, found: PathBuf },

    #[error("shard for {} has no include-graph node for the file itself", .path.display())]
    MissingOwnNode { path: PathBuf },
}
