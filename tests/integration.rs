//! TRIDENT - Integration Tests
//! End-to-end tests validating the full store lifecycle:
//! open → put → get → delete → flush → crash recovery.

mod common {
    use std::time::Duration;

    use trident::Config;

    /// A Config pointing at a temporary directory, with thresholds small
    /// enough to exercise flushing from tests.
    pub fn temp_config(dir: &std::path::Path) -> Config {
        Config::new(dir)
            .with_flush_threshold(64 * 1024)
            .with_flush_interval(Duration::from_millis(50))
    }
}

use trident::engine::access::FileAccessChoice;
use trident::KeyValueStore;

#[test]
fn test_basic_put_get_delete() {
    let dir = tempfile::tempdir().unwrap();
    let store = KeyValueStore::open(common::temp_config(dir.path())).unwrap();

    assert!(store.put(b"name", b"trident"));
    assert!(store.put(b"version", b"0.1.0"));

    assert_eq!(store.get(b"name"), Some(b"trident".to_vec()));
    assert_eq!(store.get(b"version"), Some(b"0.1.0".to_vec()));
    assert_eq!(store.get(b"missing"), None);

    assert!(store.delete(b"name"));
    assert_eq!(store.get(b"name"), None);

    assert_eq!(store.get(b"version"), Some(b"0.1.0".to_vec()));
}

#[test]
fn test_overwrite_value() {
    let dir = tempfile::tempdir().unwrap();
    let store = KeyValueStore::open(common::temp_config(dir.path())).unwrap();

    store.put(b"key", b"old");
    assert_eq!(store.get(b"key"), Some(b"old".to_vec()));

    store.put(b"key", b"new");
    assert_eq!(store.get(b"key"), Some(b"new".to_vec()));

    assert_eq!(store.memtable_item_count(), 1);
}

#[test]
fn test_flush_preserves_all_keys() {
    let dir = tempfile::tempdir().unwrap();
    let store = KeyValueStore::open(common::temp_config(dir.path())).unwrap();

    for i in 0..500 {
        let key = format!("key_{:04}", i);
        let value = format!("value_{:04}", i);
        store.put(key.as_bytes(), value.as_bytes());
    }
    store.flush().unwrap();

    // Everything now comes from the SSTable tier.
    assert_eq!(store.sstable_count(), 1);
    assert_eq!(store.memtable_item_count(), 0);
    for i in 0..500 {
        let key = format!("key_{:04}", i);
        assert_eq!(
            store.get(key.as_bytes()),
            Some(format!("value_{:04}", i).into_bytes()),
            "lost {key} across flush"
        );
    }
}

#[test]
fn test_delete_shadows_flushed_value() {
    let dir = tempfile::tempdir().unwrap();
    let store = KeyValueStore::open(common::temp_config(dir.path())).unwrap();

    store.put(b"key", b"value");
    store.flush().unwrap();
    assert_eq!(store.get(b"key"), Some(b"value".to_vec()));

    // The key only exists on disk now; deleting must plant a tombstone
    // that stops reads from falling through to the SSTable.
    assert!(store.delete(b"key"));
    assert_eq!(store.get(b"key"), None);

    // Even after the tombstone itself reaches an SSTable.
    store.flush().unwrap();
    store.flush().unwrap();
    assert_eq!(store.get(b"key"), None);
}

#[test]
fn test_write_after_flush_wins_over_sstable() {
    let dir = tempfile::tempdir().unwrap();
    let store = KeyValueStore::open(common::temp_config(dir.path())).unwrap();

    store.put(b"a", b"1");
    store.put(b"b", b"2");
    assert_eq!(store.get(b"a"), Some(b"1".to_vec()));

    store.delete(b"b");
    assert_eq!(store.get(b"b"), None);

    store.flush().unwrap();
    assert_eq!(store.get(b"a"), Some(b"1".to_vec()));
    assert_eq!(store.get(b"b"), None);

    store.put(b"a", b"3");
    assert_eq!(store.get(b"a"), Some(b"3".to_vec()));
}

#[test]
fn test_crash_recovery() {
    let dir = tempfile::tempdir().unwrap();

    // Phase 1: write data and drop the store without stopping it. Every
    // append is already durable, so this simulates a crash.
    {
        let store = KeyValueStore::open(common::temp_config(dir.path())).unwrap();
        store.put(b"persistent_key", b"persistent_value");
        store.put(b"ephemeral", b"data");
        store.delete(b"ephemeral");
    }

    // Phase 2: reopen and verify commit-log replay.
    {
        let store = KeyValueStore::open(common::temp_config(dir.path())).unwrap();
        assert_eq!(
            store.get(b"persistent_key"),
            Some(b"persistent_value".to_vec())
        );
        assert_eq!(store.get(b"ephemeral"), None);
    }
}

#[test]
fn test_recovery_includes_sstables() {
    let dir = tempfile::tempdir().unwrap();

    {
        let store = KeyValueStore::open(common::temp_config(dir.path())).unwrap();
        for i in 0..100 {
            store.put(format!("key_{i:03}").as_bytes(), b"flushed");
        }
        store.flush().unwrap();
        store.put(b"unflushed", b"in_log_only");
    }

    {
        let store = KeyValueStore::open(common::temp_config(dir.path())).unwrap();
        assert_eq!(store.sstable_count(), 1);
        assert_eq!(store.get(b"key_042"), Some(b"flushed".to_vec()));
        assert_eq!(store.get(b"unflushed"), Some(b"in_log_only".to_vec()));
    }
}

#[test]
fn test_single_commit_log_refuses_to_open() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("commit-log-lonely"), []).unwrap();

    assert!(KeyValueStore::open(common::temp_config(dir.path())).is_err());
}

#[test]
fn test_memory_mapped_access_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let config = common::temp_config(dir.path()).with_file_access(FileAccessChoice::MemoryMapped);
    let store = KeyValueStore::open(config).unwrap();

    for i in 0..300 {
        store.put(format!("key_{i:03}").as_bytes(), format!("value_{i:03}").as_bytes());
    }
    store.flush().unwrap();

    for i in 0..300 {
        assert_eq!(
            store.get(format!("key_{i:03}").as_bytes()),
            Some(format!("value_{i:03}").into_bytes())
        );
    }
    assert_eq!(store.get(b"not_there"), None);
}

#[test]
fn test_scheduler_flushes_past_threshold() {
    let dir = tempfile::tempdir().unwrap();
    let config = common::temp_config(dir.path()).with_flush_threshold(256);
    let store = KeyValueStore::open(config).unwrap();
    store.start();

    for i in 0..100 {
        store.put(format!("key_{i:03}").as_bytes(), format!("value_{i:03}").as_bytes());
    }

    // The scheduler ticks every 50ms; give it a few ticks.
    let mut waited = 0;
    while store.sstable_count() == 0 && waited < 100 {
        std::thread::sleep(std::time::Duration::from_millis(50));
        waited += 1;
    }
    store.stop(false);

    assert!(store.sstable_count() >= 1);
    for i in 0..100 {
        assert_eq!(
            store.get(format!("key_{i:03}").as_bytes()),
            Some(format!("value_{i:03}").into_bytes())
        );
    }
}

#[test]
fn test_large_values() {
    let dir = tempfile::tempdir().unwrap();
    let store = KeyValueStore::open(common::temp_config(dir.path())).unwrap();

    let large_value = vec![0xABu8; 10_000];
    store.put(b"big", &large_value);
    assert_eq!(store.get(b"big"), Some(large_value.clone()));

    store.flush().unwrap();
    assert_eq!(store.get(b"big"), Some(large_value));
}

#[test]
fn test_unicode_keys() {
    let dir = tempfile::tempdir().unwrap();
    let store = KeyValueStore::open(common::temp_config(dir.path())).unwrap();

    store.put("café".as_bytes(), b"coffee");
    store.put("日本語".as_bytes(), b"japanese");
    store.put("🦀".as_bytes(), b"crab");

    assert_eq!(store.get("café".as_bytes()), Some(b"coffee".to_vec()));
    assert_eq!(store.get("日本語".as_bytes()), Some(b"japanese".to_vec()));
    assert_eq!(store.get("🦀".as_bytes()), Some(b"crab".to_vec()));
}
