use std::path::PathBuf;

use nova_cache::CacheError;
use thiserror::Error;

/// Failure reported by an [`crate::Extractor`].
#[derive(Debug, Error)]
pub enum ExtractError {
    /// The front-end could not be set up for the command (bad flags, missing
    /// toolchain, ...).
    #[error("failed to set up the front-end: {0}")]
    Setup(String),
    /// The front-end started but did not produce a result.
    #[error("front-end execution failed: {0}")]
    Execution(String),
}

#[derive(Debug, Error)]
pub enum IndexError {
    #[error("failed to read {}: {source}", .path.display())]
    ReadSource {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid compile command for {}: {reason}", .path.display())]
    InvalidCommand { path: PathBuf, reason: String },

    #[error(transparent)]
    Extract(#[from] ExtractError),

    #[error(transparent)]
    Cache(#[from] CacheError),
}
