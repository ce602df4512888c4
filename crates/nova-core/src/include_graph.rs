use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::FileDigest;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceFlags {
    /// The file is the main file of a translation unit.
    pub is_tu: bool,
    /// The file was seen during a compile that did not finish cleanly.
    pub had_errors: bool,
}

/// One file visited while compiling a translation unit.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncludeGraphNode {
    pub digest: FileDigest,
    pub flags: SourceFlags,
    /// Absolute paths of the files this file includes directly.
    pub direct_includes: Vec<PathBuf>,
}

impl IncludeGraphNode {
    pub fn new(digest: FileDigest) -> Self {
        Self {
            digest,
            ..Self::default()
        }
    }

    /// A placeholder for a file known only as the target of an include edge.
    pub fn stub() -> Self {
        Self::default()
    }
}

/// Every file touched by a compile, keyed by absolute path.
pub type IncludeGraph = BTreeMap<PathBuf, IncludeGraphNode>;
