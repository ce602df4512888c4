//! The pipeline stages driven directly, without worker threads.

use std::path::Path;
use std::sync::Arc;

use nova_cache::{CacheError, MemoryShardStorage, ShardStorage};
use nova_core::Shard;
use nova_index::{
    FileSymbols, Indexer, Loader, MergeOutcome, Merger, Rebuilder, ShardVersionTable,
};

use super::support::{FakeExtractor, Project, SharedLogBuffer};

struct Pipeline {
    project: Project,
    storage: Arc<MemoryShardStorage>,
    versions: Arc<ShardVersionTable>,
    live: Arc<FileSymbols>,
    extractor: Arc<FakeExtractor>,
    indexer: Indexer,
    merger: Merger,
}

impl Pipeline {
    fn new() -> Self {
        let project = Project::new();
        let storage = Arc::new(MemoryShardStorage::new());
        let versions = Arc::new(ShardVersionTable::new());
        let live = Arc::new(FileSymbols::new());
        let extractor = FakeExtractor::new();
        Self {
            indexer: Indexer::new(extractor.clone(), versions.clone()),
            merger: Merger::new(storage.clone(), versions.clone(), live.clone()),
            project,
            storage,
            versions,
            live,
            extractor,
        }
    }

    fn loader(&self) -> Loader {
        let rebuilder = Arc::new(Rebuilder::new(self.live.clone(), 1, 1));
        Loader::new(
            self.storage.clone(),
            self.project.db.clone(),
            self.versions.clone(),
            self.live.clone(),
            rebuilder,
        )
    }

    fn index(&self, rel: &str) -> MergeOutcome {
        let unit = self.indexer.index(&self.project.command(rel)).unwrap();
        self.merger.merge_unit(unit)
    }
}

#[test]
fn never_indexed_translation_units_are_always_scheduled() {
    let pipeline = Pipeline::new();
    let a = pipeline.project.add_tu("a.cpp", "def A\n");
    let b = pipeline.project.add_tu("src/b.cpp", "def B\n");

    let worklist = pipeline.loader().scan(&[a.clone(), b.clone()]);
    let mut scheduled: Vec<_> = worklist.iter().map(|command| command.absolute_path()).collect();
    scheduled.sort();
    assert_eq!(scheduled, vec![a, b]);
    assert!(pipeline.versions.is_empty());
}

#[test]
fn reindexing_an_unchanged_translation_unit_changes_nothing() {
    let pipeline = Pipeline::new();
    let header = pipeline.project.write("a.h", "def A\n");
    let main = pipeline.project.add_tu("a.cpp", "#include \"a.h\"\nuse A\n");

    let first = pipeline.index("a.cpp");
    assert_eq!(first.applied, 2);
    let versions_before = (
        pipeline.versions.get(&main),
        pipeline.versions.get(&header),
    );

    let second = pipeline.index("a.cpp");
    assert_eq!(second, MergeOutcome::default());
    assert_eq!(pipeline.storage.writes().len(), 2);
    assert_eq!(
        (pipeline.versions.get(&main), pipeline.versions.get(&header)),
        versions_before
    );
    assert_eq!(pipeline.extractor.calls().len(), 2);
}

#[test]
fn identical_concurrent_results_are_applied_once() {
    let pipeline = Pipeline::new();
    pipeline.project.write("a.h", "def A\n");
    let main = pipeline.project.add_tu("a.cpp", "#include \"a.h\"\n");
    let command = pipeline.project.command("a.cpp");

    // Both compiles start before either result lands.
    let first = pipeline.indexer.index(&command).unwrap();
    let second = pipeline.indexer.index(&command).unwrap();

    let applied_first = pipeline.merger.merge_unit(first);
    let applied_second = pipeline.merger.merge_unit(second);

    assert_eq!(applied_first.applied, 2);
    assert_eq!(applied_second.selected, 2);
    assert_eq!(applied_second.applied, 0);
    assert_eq!(pipeline.live.file_count(), 2);
    assert!(pipeline.live.contains(&main));
}

#[test]
fn loaded_shards_seed_versions_and_the_live_index() {
    let pipeline = Pipeline::new();
    let header = pipeline.project.write("a.h", "def A\n");
    let main = pipeline.project.add_tu("a.cpp", "#include \"a.h\"\n");
    pipeline.index("a.cpp");

    // A fresh process: same storage, empty tables.
    let versions = Arc::new(ShardVersionTable::new());
    let live = Arc::new(FileSymbols::new());
    let rebuilder = Arc::new(Rebuilder::new(live.clone(), 1, 1));
    let loader = Loader::new(
        pipeline.storage.clone(),
        pipeline.project.db.clone(),
        versions.clone(),
        live.clone(),
        rebuilder.clone(),
    );

    pipeline.project.write("a.h", "def A\ndef B\n");
    let worklist = loader.scan(&[main.clone()]);

    // The stale header is still served until the recompile lands.
    assert_eq!(live.symbols_in(&header).len(), 1);
    assert_eq!(versions.get(&header), pipeline.versions.get(&header));
    assert_eq!(worklist.len(), 1);
    assert_eq!(worklist[0].absolute_path(), main);
    assert_eq!(rebuilder.version(), 1);
    assert_eq!(rebuilder.snapshot().lookup_name("A").count(), 1);
}

struct FullDisk;

impl ShardStorage for FullDisk {
    fn load_shard(&self, _path: &Path) -> Option<Shard> {
        None
    }

    fn store_shard(&self, _path: &Path, _shard: &Shard) -> Result<(), CacheError> {
        Err(CacheError::Io(std::io::Error::other("no space left on device")))
    }
}

#[test]
fn storage_failures_are_logged_and_the_live_index_still_updates() {
    let pipeline = Pipeline::new();
    let main = pipeline.project.add_tu("a.cpp", "def A\n");
    let merger = Merger::new(
        Arc::new(FullDisk),
        pipeline.versions.clone(),
        pipeline.live.clone(),
    );

    let logs = SharedLogBuffer::default();
    let subscriber = tracing_subscriber::fmt()
        .with_ansi(false)
        .without_time()
        .with_max_level(tracing::Level::WARN)
        .with_writer(logs.clone())
        .finish();

    let outcome = tracing::subscriber::with_default(subscriber, || {
        let unit = pipeline
            .indexer
            .index(&pipeline.project.command("a.cpp"))
            .unwrap();
        merger.merge_unit(unit)
    });

    assert_eq!((outcome.stored, outcome.applied), (0, 1));
    assert!(pipeline.live.contains(&main));
    let text = logs.as_string();
    assert!(
        text.contains("failed to write index shard"),
        "expected storage warning, got:\n{text}"
    );
    assert!(text.contains("no space left on device"));
}
