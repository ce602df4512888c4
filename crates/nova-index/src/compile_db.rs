use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};

use nova_core::CompileCommand;
use parking_lot::Mutex;

use crate::{ChangeListener, CompilationDatabase, WatchGuard};

/// In-memory [`CompilationDatabase`] keyed by each command's absolute path.
///
/// Every change notifies the registered listeners with the affected paths.
#[derive(Default)]
pub struct MemoryCompilationDatabase {
    inner: Arc<DatabaseInner>,
}

#[derive(Default)]
struct DatabaseInner {
    commands: Mutex<HashMap<PathBuf, CompileCommand>>,
    listeners: Mutex<Listeners>,
}

#[derive(Default)]
struct Listeners {
    next_id: u64,
    by_id: BTreeMap<u64, Arc<ChangeListener>>,
}

impl MemoryCompilationDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a database without notifying anyone.
    pub fn from_commands(commands: impl IntoIterator<Item = CompileCommand>) -> Self {
        let db = Self::new();
        db.inner.commands.lock().extend(
            commands
                .into_iter()
                .map(|command| (command.absolute_path(), command)),
        );
        db
    }

    /// Add or replace commands, then notify listeners.
    pub fn set_commands(&self, commands: impl IntoIterator<Item = CompileCommand>) {
        let changed: Vec<PathBuf> = {
            let mut stored = self.inner.commands.lock();
            commands
                .into_iter()
                .map(|command| {
                    let path = command.absolute_path();
                    stored.insert(path.clone(), command);
                    path
                })
                .collect()
        };
        self.notify(&changed);
    }

    pub fn set_command(&self, command: CompileCommand) {
        self.set_commands(std::iter::once(command));
    }

    /// Forget the command for `path`, notifying listeners if there was one.
    pub fn remove_command(&self, path: &Path) -> Option<CompileCommand> {
        let removed = self.inner.commands.lock().remove(path);
        if removed.is_some() {
            self.notify(&[path.to_path_buf()]);
        }
        removed
    }

    /// Absolute paths of every known translation unit, sorted.
    pub fn files(&self) -> Vec<PathBuf> {
        let mut files: Vec<_> = self.inner.commands.lock().keys().cloned().collect();
        files.sort();
        files
    }

    pub fn listener_count(&self) -> usize {
        self.inner.listeners.lock().by_id.len()
    }

    fn notify(&self, changed: &[PathBuf]) {
        if changed.is_empty() {
            return;
        }
        // Listeners run without the lock so they may (un)subscribe.
        let listeners: Vec<_> = self.inner.listeners.lock().by_id.values().cloned().collect();
        for listener in listeners {
            (*listener)(changed);
        }
    }
}

impl CompilationDatabase for MemoryCompilationDatabase {
    fn compile_command(&self, path: &Path) -> Option<CompileCommand> {
        self.inner.commands.lock().get(path).cloned()
    }

    fn watch(&self, listener: ChangeListener) -> WatchGuard {
        let id = {
            let mut listeners = self.inner.listeners.lock();
            let id = listeners.next_id;
            listeners.next_id += 1;
            listeners.by_id.insert(id, Arc::new(listener));
            id
        };

        let inner: Weak<DatabaseInner> = Arc::downgrade(&self.inner);
        WatchGuard::new(move || {
            if let Some(inner) = inner.upgrade() {
                inner.listeners.lock().by_id.remove(&id);
            }
        })
    }
}
