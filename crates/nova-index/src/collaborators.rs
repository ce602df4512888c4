//! Capabilities the pipeline consumes but does not implement.

use std::fmt;
use std::path::{Path, PathBuf};

use nova_core::{CompileCommand, IndexResult, Ref, Relation, Symbol};

use crate::{ContentFilter, ExtractError, IndexSnapshot};

/// Compiler front-end: turns one translation unit into symbols, references,
/// relations and the include graph of every file it visited.
///
/// Data for files rejected by `filter` should be left out of the result, but
/// those files must still appear in [`IndexResult::sources`] with their
/// current digest.
pub trait Extractor: Send + Sync {
    fn extract(
        &self,
        command: &CompileCommand,
        filter: &ContentFilter,
    ) -> Result<IndexResult, ExtractError>;
}

/// Callback receiving the absolute paths of files whose compile commands
/// changed.
pub type ChangeListener = Box<dyn Fn(&[PathBuf]) + Send + Sync>;

/// Source of compile commands for the project.
pub trait CompilationDatabase: Send + Sync {
    fn compile_command(&self, path: &Path) -> Option<CompileCommand>;

    /// Subscribe to command changes until the returned guard is dropped.
    fn watch(&self, listener: ChangeListener) -> WatchGuard;
}

/// Keeps a [`CompilationDatabase::watch`] subscription alive.
#[must_use = "dropping the guard unsubscribes immediately"]
pub struct WatchGuard {
    unsubscribe: Option<Box<dyn FnOnce() + Send>>,
}

impl WatchGuard {
    pub fn new(unsubscribe: impl FnOnce() + Send + 'static) -> Self {
        Self {
            unsubscribe: Some(Box::new(unsubscribe)),
        }
    }

    /// A guard for databases that never change.
    pub fn noop() -> Self {
        Self { unsubscribe: None }
    }
}

impl Drop for WatchGuard {
    fn drop(&mut self) {
        if let Some(unsubscribe) = self.unsubscribe.take() {
            unsubscribe();
        }
    }
}

impl fmt::Debug for WatchGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WatchGuard")
            .field("active", &self.unsubscribe.is_some())
            .finish()
    }
}

/// Per-file store behind the queryable index.
///
/// `merge` must be safe to call concurrently for the same and for different
/// paths.
pub trait LiveIndex: Send + Sync {
    /// Replace `path`'s contribution. A `None` slab leaves that slab
    /// untouched; `Some(vec![])` clears it.
    ///
    /// `is_main_file` marks files whose references should be counted (headers
    /// are seen by many translation units and would be counted repeatedly).
    fn merge(
        &self,
        path: &Path,
        symbols: Option<Vec<Symbol>>,
        refs: Option<Vec<Ref>>,
        relations: Option<Vec<Relation>>,
        is_main_file: bool,
    );

    /// Fold every file's contribution into one queryable snapshot.
    fn build_snapshot(&self) -> IndexSnapshot;
}
