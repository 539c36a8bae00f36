//! End-to-end scenarios against a real (temp-directory) native store.

use lmdb_kv::{Env, EnvOptions, Error, Op, OwnedBytes, OwnedStr, PutFlags, RangeTag, Str};

fn test_env(init_db_size_mb: usize) -> (tempfile::TempDir, Env) {
    let dir = tempfile::tempdir().unwrap();
    let opts = EnvOptions::default().init_db_size_mb(init_db_size_mb).use_readers(8).max_readers(8);
    let env = Env::open(dir.path(), opts).unwrap();
    (dir, env)
}

#[test]
fn open_put_get_and_entries() {
    let (_dir, env) = test_env(8);
    let dbi = env.open_dbi("kv").unwrap();

    let key = dbi.encode_key::<str, Str>("greeting").unwrap();
    let val = dbi.encode_val::<[u8], lmdb_kv::Bytes>(b"hello").unwrap();
    env.transact(&[Op::Put(dbi.clone(), key, val, PutFlags::default())]).unwrap();

    let value = env.get_value::<str, Vec<u8>, Str, OwnedBytes>(&dbi, "greeting").unwrap();
    assert_eq!(value, Some(b"hello".to_vec()));

    let missing = env.get_value::<str, Vec<u8>, Str, OwnedBytes>(&dbi, "nope").unwrap();
    assert_eq!(missing, None);

    assert_eq!(env.entries(&dbi).unwrap(), 1);
}

#[test]
fn range_grammar_over_keys_1_to_100() {
    let (_dir, env) = test_env(8);
    let dbi = env.open_dbi("kv").unwrap();

    let ops: Vec<Op> = (0..100)
        .map(|i| {
            let key = dbi.encode_key::<str, Str>(&format!("{i:03}")).unwrap();
            let val = dbi.encode_val::<str, Str>(&i.to_string()).unwrap();
            Op::Put(dbi.clone(), key, val, PutFlags::default())
        })
        .collect();
    env.transact(&ops).unwrap();

    let all = env.get_range::<String, String, OwnedStr, OwnedStr>(&dbi, RangeTag::All, &[], &[]).unwrap();
    assert_eq!(all.len(), 100);
    assert_eq!(all.first().unwrap().0, "000");
    assert_eq!(all.last().unwrap().0, "099");

    let all_back =
        env.get_range::<String, String, OwnedStr, OwnedStr>(&dbi, RangeTag::AllBack, &[], &[]).unwrap();
    assert_eq!(all_back.first().unwrap().0, "099");
    assert_eq!(all_back.last().unwrap().0, "000");

    let start = b"010".to_vec();
    let stop = b"020".to_vec();
    let closed =
        env.get_range::<String, String, OwnedStr, OwnedStr>(&dbi, RangeTag::Closed, &start, &stop).unwrap();
    assert_eq!(closed.len(), 11);
    assert_eq!(closed.first().unwrap().0, "010");
    assert_eq!(closed.last().unwrap().0, "020");

    let closed_open = env
        .get_range::<String, String, OwnedStr, OwnedStr>(&dbi, RangeTag::ClosedOpen, &start, &stop)
        .unwrap();
    assert_eq!(closed_open.len(), 10);
    assert_eq!(closed_open.last().unwrap().0, "019");

    let at_least =
        env.range_count(&dbi, RangeTag::AtLeast, &start, &[]).unwrap();
    assert_eq!(at_least, 90);

    let less_than = env.range_count(&dbi, RangeTag::LessThan, &[], &start).unwrap();
    assert_eq!(less_than, 10);

    // Backward, bounded: 30..20 descending, inclusive of both ends (the
    // seek-start argument is the high end, since a backward walk anchors
    // there first and steps down to the stop bound).
    let closed_back = env
        .get_range::<String, String, OwnedStr, OwnedStr>(&dbi, RangeTag::ClosedBack, &stop, &start)
        .unwrap();
    assert_eq!(closed_back.len(), 11);
    assert_eq!(closed_back.first().unwrap().0, "020");
    assert_eq!(closed_back.last().unwrap().0, "010");

    // Backward, single-bounded: everything at or below the anchor, descending.
    let at_least_back =
        env.get_range::<String, String, OwnedStr, OwnedStr>(&dbi, RangeTag::AtLeastBack, &stop, &[]).unwrap();
    assert_eq!(at_least_back.len(), 21);
    assert_eq!(at_least_back.first().unwrap().0, "020");
    assert_eq!(at_least_back.last().unwrap().0, "000");
}

#[test]
fn oversized_value_grows_and_retries() {
    let (_dir, env) = test_env(64);
    let dbi = env.open_dbi("kv").unwrap();

    // Default growable value cell starts at 16 KiB; this exceeds it several
    // times over and forces the grow-on-overflow path in `BufferCell::encode`.
    let big = vec![0xABu8; 200_000];
    let key = dbi.encode_key::<str, Str>("blob").unwrap();
    let val = dbi.encode_val::<[u8], lmdb_kv::Bytes>(&big).unwrap();
    env.transact(&[Op::Put(dbi.clone(), key, val, PutFlags::default())]).unwrap();

    let roundtrip = env.get_value::<str, Vec<u8>, Str, OwnedBytes>(&dbi, "blob").unwrap();
    assert_eq!(roundtrip, Some(big));
}

#[test]
fn map_full_resize_and_retry() {
    // A deliberately tiny map forces MDB_MAP_FULL well before 1000 rows of
    // a few KiB each would otherwise fit, exercising `Env::transact`'s
    // grow-and-retry loop.
    let (_dir, env) = test_env(1);
    let dbi = env.open_dbi("kv").unwrap();

    for batch in 0..20 {
        let ops: Vec<Op> = (0..50)
            .map(|i| {
                let n = batch * 50 + i;
                let key = dbi.encode_key::<str, Str>(&format!("{n:06}")).unwrap();
                let val = dbi.encode_val::<[u8], lmdb_kv::Bytes>(&vec![0u8; 2_000]).unwrap();
                Op::Put(dbi.clone(), key, val, PutFlags::default())
            })
            .collect();
        env.transact(&ops).unwrap();
    }

    assert_eq!(env.entries(&dbi).unwrap(), 1000);
    let stat = env.stat().unwrap();
    assert!(stat.map_size > 1024 * 1024);
}

#[test]
fn clear_dbi_truncates_drop_dbi_removes() {
    let (_dir, env) = test_env(8);
    let dbi = env.open_dbi("kv").unwrap();

    let key = dbi.encode_key::<str, Str>("a").unwrap();
    let val = dbi.encode_val::<[u8], lmdb_kv::Bytes>(b"1").unwrap();
    env.transact(&[Op::Put(dbi.clone(), key, val, PutFlags::default())]).unwrap();
    assert_eq!(env.entries(&dbi).unwrap(), 1);

    env.clear_dbi("kv").unwrap();
    assert_eq!(env.entries(&dbi).unwrap(), 0);
    // The handle is still registered after a clear.
    assert!(env.get_dbi("kv").is_ok());

    env.drop_dbi("kv").unwrap();
    assert!(matches!(env.get_dbi("kv"), Err(Error::UnknownDbi(_))));
}

#[test]
fn concurrent_get_value_bounds_rtx_pool_allocation() {
    let (_dir, env) = test_env(8);
    let dbi = env.open_dbi("kv").unwrap();
    let key = dbi.encode_key::<str, Str>("shared").unwrap();
    let val = dbi.encode_val::<[u8], lmdb_kv::Bytes>(b"v").unwrap();
    env.transact(&[Op::Put(dbi.clone(), key, val, PutFlags::default())]).unwrap();

    std::thread::scope(|scope| {
        for _ in 0..16 {
            let env = &env;
            let dbi = &dbi;
            scope.spawn(move || {
                for _ in 0..50 {
                    let v = env.get_value::<str, Vec<u8>, Str, OwnedBytes>(dbi, "shared").unwrap();
                    assert_eq!(v, Some(b"v".to_vec()));
                }
            });
        }
    });

    // use_readers was configured to 8, so the pool never grows past that
    // even with 16 contending threads.
    assert!(env.allocated_rtx_count() <= 8);
}
