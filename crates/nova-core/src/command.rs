use serde::{Deserialize, Serialize};
use std::path::{Component, Path, PathBuf};

/// The build command used to compile one translation unit.
///
/// `filename` is either absolute or relative to `directory`, which is not
/// necessarily the process working directory.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CompileCommand {
    pub directory: PathBuf,
    pub filename: PathBuf,
    pub arguments: Vec<String>,
}

impl CompileCommand {
    pub fn new(
        directory: impl Into<PathBuf>,
        filename: impl Into<PathBuf>,
        arguments: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            directory: directory.into(),
            filename: filename.into(),
            arguments: arguments.into_iter().map(Into::into).collect(),
        }
    }

    /// Absolute, lexically normalized path of the compiled file.
    pub fn absolute_path(&self) -> PathBuf {
        if self.filename.is_absolute() {
            return self.filename.clone();
        }
        normalize_lexically(&self.directory.join(&self.filename))
    }

    /// File name without its extension (`src/a.cpp` -> `a`).
    ///
    /// Used as the queue tag so that a header and its implementation file
    /// (`a.h` / `a.cpp`) share a tag.
    pub fn filename_stem(&self) -> String {
        file_stem(&self.filename)
    }
}

/// File name of `path` without its extension.
pub fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default()
}

const HEADER_EXTENSIONS: &[&str] = &["h", "hh", "hpp", "hxx", "h++", "inc", "inl", "ipp", "tcc"];

/// Whether `path` looks like a header by its extension.
pub fn is_header_file(path: impl AsRef<Path>) -> bool {
    path.as_ref()
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            HEADER_EXTENSIONS
                .iter()
                .any(|known| known.eq_ignore_ascii_case(ext))
        })
}

/// Remove `.` components and fold `..` into their parent without touching the
/// filesystem (symlinks are not resolved).
fn normalize_lexically(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                let popped = matches!(out.components().next_back(), Some(Component::Normal(_)))
                    && out.pop();
                if !popped && !out.has_root() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}
