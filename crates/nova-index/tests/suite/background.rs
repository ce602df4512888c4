use std::sync::Arc;

use nova_core::digest;
use nova_index::{BackgroundIndex, Collaborators, ShardVersion};
use parking_lot::Mutex;

use super::support::{config, symbol_id, wait_idle, Fixture};

#[test]
fn first_scan_indexes_and_second_scan_is_a_no_op() {
    let fixture = Fixture::new();
    let project = &fixture.project;
    let header = project.write("a.h", "def A\n");
    let main = project.add_tu("a.cpp", "#include \"a.h\"\nuse A\ndef main\n");

    let index = fixture.start(1);
    index.enqueue(vec![main.clone()]);
    wait_idle(&index);

    assert_eq!(fixture.extractor.calls(), vec![main.clone()]);
    let mut writes = fixture.storage.writes();
    writes.sort();
    assert_eq!(writes, vec![main.clone(), header.clone()]);
    assert!(fixture.live.contains(&main));
    assert!(fixture.live.contains(&header));
    assert_eq!(
        index.shard_version(&header),
        Some(ShardVersion::new(digest("def A\n"), false))
    );
    assert_eq!(
        index.shard_version(&main),
        Some(ShardVersion::new(
            digest("#include \"a.h\"\nuse A\ndef main\n"),
            false
        ))
    );

    // One worker: the first indexed translation unit publishes a snapshot.
    let snapshot = index.snapshot();
    let a = snapshot.lookup_name("A").next().expect("A is indexed");
    assert_eq!(a.definition.as_ref().unwrap().file, header);
    assert_eq!(snapshot.reference_count(symbol_id("A")), 1);

    index.enqueue(vec![main.clone()]);
    wait_idle(&index);
    assert_eq!(fixture.extractor.calls().len(), 1);
    assert_eq!(fixture.storage.writes().len(), 2);
}

#[test]
fn changed_header_reindexes_its_translation_unit() {
    let fixture = Fixture::new();
    let project = &fixture.project;
    let header = project.write("a.h", "def A\n");
    let main = project.add_tu("a.cpp", "#include \"a.h\"\nuse A\n");

    let index = fixture.start(1);
    index.enqueue(vec![main.clone()]);
    wait_idle(&index);

    project.write("a.h", "def A\ndef B\n");
    index.enqueue(vec![main.clone()]);
    wait_idle(&index);

    assert_eq!(fixture.extractor.calls(), vec![main.clone(), main.clone()]);
    assert_eq!(
        index.shard_version(&header).unwrap().digest,
        digest("def A\ndef B\n")
    );
    // The main file itself did not change, so only the header is rewritten.
    assert_eq!(
        fixture.storage.writes(),
        vec![main.clone(), header.clone(), header.clone()]
    );
    assert_eq!(fixture.live.symbols_in(&header).len(), 2);
}

#[test]
fn failed_compile_is_superseded_by_a_clean_one_with_the_same_digest() {
    let fixture = Fixture::new();
    let project = &fixture.project;
    let main = project.add_tu("a.cpp", "#include \"gen.h\"\ndef main\n");

    let index = fixture.start(1);
    index.enqueue(vec![main.clone()]);
    wait_idle(&index);

    let broken = index.shard_version(&main).unwrap();
    assert!(broken.had_errors);

    // Creating the missing header fixes the compile without touching a.cpp.
    let header = project.write("gen.h", "def GENERATED\n");
    index.enqueue(vec![main.clone()]);
    wait_idle(&index);

    let fixed = index.shard_version(&main).unwrap();
    assert_eq!(fixed.digest, broken.digest);
    assert!(!fixed.had_errors);
    assert_eq!(fixture.extractor.calls().len(), 2);
    assert!(fixture.live.contains(&header));

    // Clean now: nothing left to do.
    index.enqueue(vec![main.clone()]);
    wait_idle(&index);
    assert_eq!(fixture.extractor.calls().len(), 2);
}

#[test]
fn boosting_a_header_moves_its_pending_task_ahead() {
    let fixture = Fixture::new();
    let project = &fixture.project;
    project.write("c.h", "def C\n");
    let a = project.add_tu("a.cpp", "def A\n");
    let b = project.add_tu("b.cpp", "def B\n");
    let c = project.add_tu("c.cpp", "#include \"c.h\"\n");
    let gate = fixture.extractor.gate(&a);

    let index = fixture.start(1);
    index.enqueue(vec![a.clone(), b.clone(), c.clone()]);
    gate.wait_until_entered();

    // `a` is already running and `b.cpp` is not a header.
    index.boost_related(&project.path("a.h"));
    index.boost_related(&b);
    index.boost_related(&project.path("c.h"));
    gate.open();
    wait_idle(&index);

    assert_eq!(fixture.extractor.calls(), vec![a, c, b]);
}

#[test]
fn failed_translation_units_do_not_stop_the_others() {
    let fixture = Fixture::new();
    let project = &fixture.project;
    let bad = project.add_tu("bad.cpp", "def BAD\n");
    let good = project.add_tu("good.cpp", "def GOOD\n");
    fixture.extractor.fail_setup_for(&bad);

    let index = fixture.start(2);
    index.enqueue(vec![bad.clone(), good.clone()]);
    wait_idle(&index);

    assert!(index.shard_version(&bad).is_none());
    assert!(index.shard_version(&good).is_some());
    assert!(!fixture.live.contains(&bad));
    assert_eq!(index.rebuilder().indexed_tus(), 1);

    // No retry until the next notification.
    wait_idle(&index);
    let bad_calls = fixture
        .extractor
        .calls()
        .iter()
        .filter(|path| **path == bad)
        .count();
    assert_eq!(bad_calls, 1);
}

#[test]
fn translation_units_without_commands_are_dropped() {
    let fixture = Fixture::new();
    let orphan = fixture.project.write("orphan.cpp", "def ORPHAN\n");

    let index = fixture.start(1);
    index.enqueue(vec![orphan]);
    wait_idle(&index);

    assert!(fixture.extractor.calls().is_empty());
    assert_eq!(index.stats().completed, 1);
}

#[test]
fn compilation_database_changes_are_indexed_until_the_index_is_dropped() {
    let fixture = Fixture::new();
    let index = fixture.start(1);
    assert_eq!(fixture.project.db.listener_count(), 1);

    let main = fixture.project.add_tu("new.cpp", "def NEW\n");
    wait_idle(&index);
    assert_eq!(fixture.extractor.calls(), vec![main]);

    drop(index);
    assert_eq!(fixture.project.db.listener_count(), 0);
    fixture.project.add_tu("later.cpp", "def LATER\n");
    assert_eq!(fixture.extractor.calls().len(), 1);
}

#[test]
fn stop_drops_work_submitted_afterwards() {
    let fixture = Fixture::new();
    let main = fixture.project.add_tu("a.cpp", "def A\n");

    let index = fixture.start(2);
    index.stop();
    index.enqueue(vec![main]);
    index.stop();

    assert!(index.block_until_idle(Some(std::time::Duration::from_millis(100))));
    assert!(fixture.extractor.calls().is_empty());
    assert_eq!(index.stats().cancelled, 1);
    assert_eq!(fixture.project.db.listener_count(), 0);
}

#[test]
fn progress_observer_sees_completed_tasks() {
    let fixture = Fixture::new();
    let main = fixture.project.add_tu("a.cpp", "def A\n");
    let seen = Arc::new(Mutex::new(Vec::new()));

    let index = {
        let seen = Arc::clone(&seen);
        BackgroundIndex::new(
            &config(1),
            Collaborators {
                extractor: fixture.extractor.clone(),
                compilation_database: fixture.project.db.clone(),
                storage: fixture.storage.clone(),
                live_index: fixture.live.clone(),
                on_progress: Some(Box::new(move |stats| seen.lock().push(stats))),
            },
        )
    };
    index.enqueue(vec![main]);
    wait_idle(&index);

    let seen = seen.lock();
    let last = seen.last().expect("progress was reported");
    // One scan task plus one index task.
    assert_eq!((last.enqueued, last.completed, last.active), (2, 2, 0));
    assert_eq!(last.last_idle, 2);
    assert!(seen.iter().any(|stats| stats.active == 1));
}

#[test]
fn rebuild_now_publishes_below_the_initial_threshold() {
    let fixture = Fixture::new();
    let main = fixture.project.add_tu("a.cpp", "def A\n");

    let index = fixture.start(4);
    index.enqueue(vec![main]);
    wait_idle(&index);
    assert!(index.snapshot().is_empty());

    assert!(index.rebuild_now());
    assert_eq!(index.snapshot().lookup_name("A").count(), 1);
}
