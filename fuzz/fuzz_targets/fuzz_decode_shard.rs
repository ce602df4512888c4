#![no_main]

use std::path::Path;

use libfuzzer_sys::fuzz_target;
use nova_cache::{decode_shard, encode_shard, DiskShardStorage, ShardStorage};

const MAX_INPUT_SIZE: usize = 256 * 1024;

fn run_input(input: &[u8]) {
    let cap = input.len().min(MAX_INPUT_SIZE);
    let input = &input[..cap];
    let mode = input.first().copied().unwrap_or(0);
    let source = Path::new("/fuzz/src/a.h");

    if mode & 1 == 0 {
        // Anything that decodes must survive a re-encode and decode to the
        // same shard.
        if let Ok(shard) = decode_shard(source, input) {
            let bytes = encode_shard(source, &shard).expect("re-encoding a decoded shard");
            let again = decode_shard(source, &bytes).expect("decoding a re-encoded shard");
            assert_eq!(shard, again);
        }
    } else {
        // Same bytes through the storage read path (size cap, miss handling).
        let dir = tempfile::tempdir().expect("failed to create tempdir");
        let storage = DiskShardStorage::new(dir.path());
        std::fs::write(storage.shard_path(source), &input[1..]).expect("failed to write shard");
        let _ = storage.load_shard(source);
    }
}

fuzz_target!(|data: &[u8]| {
    run_input(data);
});
