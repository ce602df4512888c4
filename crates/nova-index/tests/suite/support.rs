//! Fixtures shared by the integration tests.
//!
//! [`FakeExtractor`] "compiles" a tiny line-based language so tests can drive
//! the pipeline with real files:
//!
//! ```text
//! #include "other.h"   include a file relative to this one
//! def NAME             declare and define NAME here
//! decl NAME            declare NAME here
//! use NAME             reference NAME
//! error                the compile fails (data is still produced)
//! ```
//!
//! An include of a file that does not exist also marks the compile as failed.

use std::collections::HashSet;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use nova_cache::{MemoryShardStorage, ShardStorage};
use nova_config::BackgroundIndexConfig;
use nova_core::{
    digest, CompileCommand, IncludeGraphNode, IndexResult, Ref, RefKind, Symbol, SymbolId,
    SymbolKind, SymbolLocation,
};
use nova_index::{
    BackgroundIndex, Collaborators, ContentFilter, ExtractError, Extractor, FileSymbols,
    MemoryCompilationDatabase,
};
use parking_lot::{Condvar, Mutex};
use tracing_subscriber::fmt::MakeWriter;

pub const IDLE_TIMEOUT: Duration = Duration::from_secs(30);

pub fn symbol_id(name: &str) -> SymbolId {
    let bytes = digest(name);
    let mut id = [0u8; 8];
    id.copy_from_slice(&bytes.as_bytes()[..8]);
    SymbolId(u64::from_le_bytes(id))
}

#[derive(Default)]
pub struct FakeExtractor {
    calls: Mutex<Vec<PathBuf>>,
    failing: Mutex<HashSet<PathBuf>>,
    gate: Mutex<Option<(PathBuf, Arc<Gate>)>>,
}

impl FakeExtractor {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Main files passed to `extract`, in call order.
    pub fn calls(&self) -> Vec<PathBuf> {
        self.calls.lock().clone()
    }

    pub fn fail_setup_for(&self, path: &Path) {
        self.failing.lock().insert(path.to_path_buf());
    }

    /// Block the extraction of `path` until the returned gate is opened.
    pub fn gate(&self, path: &Path) -> Arc<Gate> {
        let gate = Arc::new(Gate::default());
        *self.gate.lock() = Some((path.to_path_buf(), Arc::clone(&gate)));
        gate
    }

    fn gate_for(&self, path: &Path) -> Option<Arc<Gate>> {
        self.gate
            .lock()
            .as_ref()
            .filter(|(gated, _)| gated == path)
            .map(|(_, gate)| Arc::clone(gate))
    }
}

impl Extractor for FakeExtractor {
    fn extract(
        &self,
        command: &CompileCommand,
        filter: &ContentFilter,
    ) -> Result<IndexResult, ExtractError> {
        let main_file = command.absolute_path();
        self.calls.lock().push(main_file.clone());
        if let Some(gate) = self.gate_for(&main_file) {
            gate.pass();
        }
        if self.failing.lock().contains(&main_file) {
            return Err(ExtractError::Setup(format!(
                "cannot compile {}",
                main_file.display()
            )));
        }

        let mut result = IndexResult::default();
        let mut pending = vec![main_file];
        while let Some(path) = pending.pop() {
            if result.sources.contains_key(&path) {
                continue;
            }
            let text = std::fs::read_to_string(&path)
                .map_err(|err| ExtractError::Execution(format!("{}: {err}", path.display())))?;
            let file_digest = digest(&text);
            let collect = filter.should_index(&path, file_digest);
            let mut node = IncludeGraphNode::new(file_digest);

            for (idx, line) in text.lines().enumerate() {
                let location = SymbolLocation::new(&path, idx as u32 + 1, 1);
                let line = line.trim();
                if let Some(target) = line.strip_prefix("#include ") {
                    let target = path
                        .parent()
                        .unwrap_or(Path::new("/"))
                        .join(target.trim().trim_matches('"'));
                    if target.is_file() {
                        node.direct_includes.push(target.clone());
                        pending.push(target);
                    } else {
                        result.had_errors = true;
                    }
                } else if line == "error" {
                    result.had_errors = true;
                } else if !collect {
                    continue;
                } else if let Some(name) = line.strip_prefix("def ") {
                    result.symbols.push(Symbol {
                        id: symbol_id(name),
                        name: name.to_string(),
                        kind: SymbolKind::Function,
                        declaration: Some(location.clone()),
                        definition: Some(location.clone()),
                    });
                    result.refs.push(Ref {
                        symbol: symbol_id(name),
                        kind: RefKind::Definition,
                        location,
                    });
                } else if let Some(name) = line.strip_prefix("decl ") {
                    result.symbols.push(Symbol {
                        id: symbol_id(name),
                        name: name.to_string(),
                        kind: SymbolKind::Function,
                        declaration: Some(location.clone()),
                        definition: None,
                    });
                    result.refs.push(Ref {
                        symbol: symbol_id(name),
                        kind: RefKind::Declaration,
                        location,
                    });
                } else if let Some(name) = line.strip_prefix("use ") {
                    result.refs.push(Ref {
                        symbol: symbol_id(name),
                        kind: RefKind::Reference,
                        location,
                    });
                }
            }
            result.sources.insert(path, node);
        }
        Ok(result)
    }
}

/// Lets a test hold a worker inside `extract`.
#[derive(Default)]
pub struct Gate {
    state: Mutex<GateState>,
    cv: Condvar,
}

#[derive(Default)]
struct GateState {
    entered: bool,
    open: bool,
}

impl Gate {
    fn pass(&self) {
        let mut state = self.state.lock();
        state.entered = true;
        self.cv.notify_all();
        while !state.open {
            self.cv.wait(&mut state);
        }
    }

    pub fn wait_until_entered(&self) {
        let mut state = self.state.lock();
        while !state.entered {
            assert!(
                !self.cv.wait_for(&mut state, IDLE_TIMEOUT).timed_out(),
                "gated extraction never started"
            );
        }
    }

    pub fn open(&self) {
        self.state.lock().open = true;
        self.cv.notify_all();
    }
}

/// A project on disk plus its compilation database.
pub struct Project {
    dir: tempfile::TempDir,
    pub db: Arc<MemoryCompilationDatabase>,
}

impl Project {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().unwrap(),
            db: Arc::new(MemoryCompilationDatabase::new()),
        }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn path(&self, rel: &str) -> PathBuf {
        self.dir.path().join(rel)
    }

    pub fn write(&self, rel: &str, contents: &str) -> PathBuf {
        let path = self.path(rel);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(&path, contents).unwrap();
        path
    }

    /// Write a translation unit and register its compile command.
    pub fn add_tu(&self, rel: &str, contents: &str) -> PathBuf {
        let path = self.write(rel, contents);
        self.db.set_command(self.command(rel));
        path
    }

    pub fn command(&self, rel: &str) -> CompileCommand {
        CompileCommand::new(self.root(), rel, ["cc", "-c", rel])
    }
}

/// A project wired to in-memory collaborators.
pub struct Fixture {
    pub project: Project,
    pub storage: Arc<MemoryShardStorage>,
    pub live: Arc<FileSymbols>,
    pub extractor: Arc<FakeExtractor>,
}

impl Fixture {
    pub fn new() -> Self {
        Self {
            project: Project::new(),
            storage: Arc::new(MemoryShardStorage::new()),
            live: Arc::new(FileSymbols::new()),
            extractor: FakeExtractor::new(),
        }
    }

    pub fn start(&self, threads: usize) -> BackgroundIndex {
        self.start_with_storage(threads, self.storage.clone())
    }

    pub fn start_with_storage(
        &self,
        threads: usize,
        storage: Arc<dyn ShardStorage>,
    ) -> BackgroundIndex {
        BackgroundIndex::new(
            &config(threads),
            Collaborators {
                extractor: self.extractor.clone(),
                compilation_database: self.project.db.clone(),
                storage,
                live_index: self.live.clone(),
                on_progress: None,
            },
        )
    }
}

/// Deterministic configuration: no shuffling, `threads` workers.
pub fn config(threads: usize) -> BackgroundIndexConfig {
    BackgroundIndexConfig {
        threads,
        tus_before_rebuild: 100,
        shuffle_worklist: false,
        cache_root: None,
    }
}

pub fn wait_idle(index: &BackgroundIndex) {
    assert!(
        index.block_until_idle(Some(IDLE_TIMEOUT)),
        "background index did not become idle"
    );
}

/// Captures formatted log output for assertions.
#[derive(Clone, Default)]
pub struct SharedLogBuffer(Arc<Mutex<Vec<u8>>>);

impl SharedLogBuffer {
    pub fn as_string(&self) -> String {
        String::from_utf8_lossy(&self.0.lock()).to_string()
    }
}

pub struct SharedLogWriter(Arc<Mutex<Vec<u8>>>);

impl io::Write for SharedLogWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for SharedLogBuffer {
    type Writer = SharedLogWriter;

    fn make_writer(&'a self) -> Self::Writer {
        SharedLogWriter(self.0.clone())
    }
}
