use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::{self, Read};
use std::path::Path;

const DIGEST_LEN: usize = 16;

/// Truncated BLAKE3 hash of a file's contents.
///
/// Used exclusively for staleness checks, so 128 bits are plenty. The all-zero
/// digest is reserved to mean "unknown" (e.g. include-graph stubs for files
/// that were only seen as an include edge).
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FileDigest([u8; DIGEST_LEN]);

impl FileDigest {
    pub const UNKNOWN: FileDigest = FileDigest([0; DIGEST_LEN]);

    pub const fn from_bytes(bytes: [u8; DIGEST_LEN]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; DIGEST_LEN] {
        &self.0
    }

    pub fn is_unknown(&self) -> bool {
        *self == Self::UNKNOWN
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Debug for FileDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FileDigest({})", self.to_hex())
    }
}

impl fmt::Display for FileDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Compute the digest of an in-memory buffer.
pub fn digest(contents: impl AsRef<[u8]>) -> FileDigest {
    let hash = blake3::hash(contents.as_ref());
    truncate(hash)
}

/// Compute the digest of a file on disk, streaming its contents.
pub fn digest_file(path: impl AsRef<Path>) -> io::Result<FileDigest> {
    let mut file = std::fs::File::open(path)?;
    let mut hasher = blake3::Hasher::new();
    let mut buf = [0_u8; 64 * 1024];
    loop {
        let read = file.read(&mut buf)?;
        if read == 0 {
            break;
        }
        hasher.update(&buf[..read]);
    }
    Ok(truncate(hasher.finalize()))
}

fn truncate(hash: blake3::Hash) -> FileDigest {
    let mut out = [0_u8; DIGEST_LEN];
    out.copy_from_slice(&hash.as_bytes()[..DIGEST_LEN]);
    // A real file hashing to the sentinel would be indistinguishable from "unknown".
    if out == [0; DIGEST_LEN] {
        out[0] = 1;
    }
    FileDigest(out)
}
