use crate::error::CacheError;
use bincode::Options;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

/// Upper bound for any shard file we will attempt to decode.
///
/// A corrupted length prefix must turn into a cache miss, not a huge allocation.
pub const BINCODE_PAYLOAD_LIMIT_BYTES: usize = 64 * 1024 * 1024;

static TMP_COUNTER: AtomicU64 = AtomicU64::new(0);

pub(crate) fn bincode_options() -> impl bincode::Options + Copy {
    bincode::DefaultOptions::new()
        .with_fixint_encoding()
        .with_little_endian()
}

pub(crate) fn bincode_serialize<T: Serialize>(value: &T) -> Result<Vec<u8>, CacheError> {
    Ok(bincode_options().serialize(value)?)
}

pub(crate) fn bincode_deserialize<T: for<'de> Deserialize<'de>>(
    bytes: &[u8],
) -> Result<T, CacheError> {
    Ok(bincode_options()
        .with_limit(BINCODE_PAYLOAD_LIMIT_BYTES as u64)
        .deserialize(bytes)?)
}

/// Like [`bincode_deserialize`] but only decodes a prefix of `bytes`.
pub(crate) fn bincode_deserialize_prefix<T: for<'de> Deserialize<'de>>(
    bytes: &[u8],
) -> Result<T, CacheError> {
    Ok(bincode_options()
        .with_limit(BINCODE_PAYLOAD_LIMIT_BYTES as u64)
        .allow_trailing_bytes()
        .deserialize(bytes)?)
}

/// Read a cache file, returning `None` for misses, non-regular files and
/// oversized payloads.
pub(crate) fn read_file_limited(path: &Path) -> Option<Vec<u8>> {
    let meta = match fs::symlink_metadata(path) {
        Ok(meta) => meta,
        Err(err) => {
            if err.kind() != io::ErrorKind::NotFound {
                tracing::debug!(
                    target = "nova.cache",
                    path = %path.display(),
                    error = %err,
                    "failed to stat shard file"
                );
            }
            return None;
        }
    };
    if !meta.is_file() || meta.len() > BINCODE_PAYLOAD_LIMIT_BYTES as u64 {
        tracing::debug!(
            target = "nova.cache",
            path = %path.display(),
            len = meta.len(),
            "ignoring shard file that is not a regular file or is too large"
        );
        return None;
    }

    match fs::read(path) {
        Ok(bytes) if bytes.len() <= BINCODE_PAYLOAD_LIMIT_BYTES => Some(bytes),
        Ok(_) => None,
        Err(err) => {
            if err.kind() != io::ErrorKind::NotFound {
                tracing::debug!(
                    target = "nova.cache",
                    path = %path.display(),
                    error = %err,
                    "failed to read shard file"
                );
            }
            None
        }
    }
}

/// Write `bytes` to `path` so that readers observe either the old or the new
/// contents, never a torn file.
///
/// Concurrent writers to the same path are safe; the last rename wins.
pub fn atomic_write(path: &Path, bytes: &[u8]) -> Result<(), CacheError> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        Some(_) => Path::new("."),
        None => return Err(io::Error::other("path has no parent").into()),
    };
    fs::create_dir_all(parent)?;

    let (tmp_path, mut file) = open_unique_tmp_file(path, parent)?;
    let written = file.write_all(bytes).and_then(|()| file.sync_all());
    drop(file);

    let result = written.and_then(|()| replace_file(&tmp_path, path));
    if let Err(err) = result {
        if let Err(remove_err) = fs::remove_file(&tmp_path) {
            if remove_err.kind() != io::ErrorKind::NotFound {
                tracing::debug!(
                    target = "nova.cache",
                    path = %tmp_path.display(),
                    error = %remove_err,
                    "failed to remove temporary shard file"
                );
            }
        }
        return Err(err.into());
    }
    Ok(())
}

fn replace_file(from: &Path, to: &Path) -> io::Result<()> {
    match fs::rename(from, to) {
        Ok(()) => Ok(()),
        // `rename` does not replace an existing file on Windows.
        Err(err) if cfg!(windows) && to.exists() => {
            match fs::remove_file(to) {
                Ok(()) => {}
                Err(remove_err) if remove_err.kind() == io::ErrorKind::NotFound => {}
                Err(_) => return Err(err),
            }
            fs::rename(from, to)
        }
        Err(err) => Err(err),
    }
}

fn open_unique_tmp_file(dest: &Path, parent: &Path) -> io::Result<(PathBuf, fs::File)> {
    let file_name = dest
        .file_name()
        .ok_or_else(|| io::Error::other("destination path has no file name"))?;
    let pid = std::process::id();

    loop {
        let counter = TMP_COUNTER.fetch_add(1, Ordering::Relaxed);
        let mut tmp_name = file_name.to_os_string();
        tmp_name.push(format!(".tmp.{pid}.{counter}"));
        let tmp_path = parent.join(tmp_name);

        match fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&tmp_path)
        {
            Ok(file) => return Ok((tmp_path, file)),
            Err(err) if err.kind() == io::ErrorKind::AlreadyExists => continue,
            Err(err) => return Err(err),
        }
    }
}
