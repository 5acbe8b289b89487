//! Tests for crash recovery
//!
//! These tests verify:
//! - A partial final commit is cut off and earlier commits survive
//! - Damage in the middle of the file is reported, never skipped
//! - Foreign, empty and half-initialized files are handled at open
//! - The store keeps working after a truncating recovery

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use ruledb::store::Store;
use ruledb::{Config, ErrorKind, RuleDbError, DEFAULT_BUCKET};
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn config_for(path: &Path) -> Config {
    Config::builder()
        .db_path(path)
        .lock_timeout(Duration::from_millis(100))
        .build()
}

/// Write two keys in separate commits; returns the file size after each commit
fn write_two_commits(path: &Path) -> (u64, u64, u64) {
    let store = Store::open(config_for(path)).unwrap();
    let after_open = store.stats().unwrap().file_size;
    store.put(DEFAULT_BUCKET, b"first", b"1").unwrap();
    let after_first = store.stats().unwrap().file_size;
    store.put(DEFAULT_BUCKET, b"second", b"2").unwrap();
    let after_second = store.stats().unwrap().file_size;
    store.close().unwrap();
    (after_open, after_first, after_second)
}

fn temp_path() -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("recovery.db");
    (temp_dir, path)
}

// =============================================================================
// Torn Tail Tests
// =============================================================================

#[test]
fn test_recovery_drops_trailing_garbage() {
    let (_temp, path) = temp_path();
    let (_, _, full_len) = write_two_commits(&path);

    // Fewer bytes than a frame header
    let mut file = OpenOptions::new().append(true).open(&path).unwrap();
    file.write_all(&[0xAB, 0xCD, 0xEF]).unwrap();
    drop(file);

    let store = Store::open(config_for(&path)).unwrap();

    assert_eq!(store.recovery().bytes_truncated, 3);
    assert_eq!(store.recovery().records_recovered, 3);
    assert_eq!(store.get(DEFAULT_BUCKET, b"second").unwrap().as_deref(), Some(&b"2"[..]));
    assert_eq!(fs::metadata(&path).unwrap().len(), full_len);
}

#[test]
fn test_recovery_drops_partial_last_commit() {
    let (_temp, path) = temp_path();
    let (_, after_first, full_len) = write_two_commits(&path);

    // Crash in the middle of writing the second commit
    let file = OpenOptions::new().write(true).open(&path).unwrap();
    file.set_len(full_len - 4).unwrap();
    drop(file);

    let store = Store::open(config_for(&path)).unwrap();

    assert_eq!(store.recovery().bytes_truncated, full_len - 4 - after_first);
    assert_eq!(store.get(DEFAULT_BUCKET, b"first").unwrap().as_deref(), Some(&b"1"[..]));
    assert_eq!(store.get(DEFAULT_BUCKET, b"second").unwrap(), None);
}

#[test]
fn test_recovery_drops_damaged_last_commit() {
    let (_temp, path) = temp_path();
    let (_, after_first, full_len) = write_two_commits(&path);

    // Length is intact but the payload no longer matches its checksum
    let mut bytes = fs::read(&path).unwrap();
    let last = (full_len - 1) as usize;
    bytes[last] ^= 0xFF;
    fs::write(&path, &bytes).unwrap();

    let store = Store::open(config_for(&path)).unwrap();

    assert_eq!(store.recovery().bytes_truncated, full_len - after_first);
    assert_eq!(store.get(DEFAULT_BUCKET, b"first").unwrap().as_deref(), Some(&b"1"[..]));
    assert_eq!(store.get(DEFAULT_BUCKET, b"second").unwrap(), None);
}

#[test]
fn test_commits_after_truncation_persist() {
    let (_temp, path) = temp_path();
    let (_, _, full_len) = write_two_commits(&path);

    let file = OpenOptions::new().write(true).open(&path).unwrap();
    file.set_len(full_len - 1).unwrap();
    drop(file);

    {
        let store = Store::open(config_for(&path)).unwrap();
        store.put(DEFAULT_BUCKET, b"third", b"3").unwrap();
        store.close().unwrap();
    }

    let store = Store::open(config_for(&path)).unwrap();
    assert_eq!(store.recovery().bytes_truncated, 0);
    assert_eq!(store.get(DEFAULT_BUCKET, b"first").unwrap().as_deref(), Some(&b"1"[..]));
    assert_eq!(store.get(DEFAULT_BUCKET, b"second").unwrap(), None);
    assert_eq!(store.get(DEFAULT_BUCKET, b"third").unwrap().as_deref(), Some(&b"3"[..]));
}

// =============================================================================
// Corruption Tests
// =============================================================================

#[test]
fn test_damage_before_last_commit_is_corruption() {
    let (_temp, path) = temp_path();
    let (after_open, after_first, _) = write_two_commits(&path);

    // Flip a payload byte of the first put; the second put follows it
    let mut bytes = fs::read(&path).unwrap();
    let inside_first = (after_open + (after_first - after_open) / 2) as usize;
    bytes[inside_first] ^= 0xFF;
    fs::write(&path, &bytes).unwrap();

    let err = Store::open(config_for(&path)).err().unwrap();

    assert!(matches!(err, RuleDbError::Corruption(_)), "got {:?}", err);
    assert_eq!(err.kind(), ErrorKind::Io);

    // The damaged file is left as it was
    assert_eq!(fs::read(&path).unwrap(), bytes);
}

#[test]
fn test_damaged_length_before_last_commit_is_corruption() {
    let (_temp, path) = temp_path();
    let (after_open, _, full_len) = write_two_commits(&path);

    // High byte of the first put's length: the frame now claims to run
    // far past the end of the file
    let mut bytes = fs::read(&path).unwrap();
    bytes[(after_open + 3) as usize] ^= 0xFF;
    fs::write(&path, &bytes).unwrap();

    let err = Store::open(config_for(&path)).err().unwrap();

    assert!(matches!(err, RuleDbError::Corruption(_)), "got {:?}", err);
    assert_eq!(fs::metadata(&path).unwrap().len(), full_len);
    assert_eq!(fs::read(&path).unwrap(), bytes);
}

#[test]
fn test_damaged_length_of_last_commit_is_truncated() {
    let (_temp, path) = temp_path();
    let (_, after_first, _) = write_two_commits(&path);

    let mut bytes = fs::read(&path).unwrap();
    bytes[(after_first + 3) as usize] ^= 0xFF;
    fs::write(&path, &bytes).unwrap();

    let store = Store::open(config_for(&path)).unwrap();

    assert_eq!(store.get(DEFAULT_BUCKET, b"first").unwrap().as_deref(), Some(&b"1"[..]));
    assert_eq!(store.get(DEFAULT_BUCKET, b"second").unwrap(), None);
    assert_eq!(fs::metadata(&path).unwrap().len(), after_first);
}

#[test]
fn test_unfinished_header_is_reinitialized() {
    let (_temp, path) = temp_path();
    // Crash while a new file's header was being written
    fs::write(&path, b"RLDB\x01").unwrap();

    let store = Store::open(config_for(&path)).unwrap();
    store.put(DEFAULT_BUCKET, b"k", b"v").unwrap();
    store.close().unwrap();

    let store = Store::open(config_for(&path)).unwrap();
    assert_eq!(store.get(DEFAULT_BUCKET, b"k").unwrap().as_deref(), Some(&b"v"[..]));
}

#[test]
fn test_short_foreign_file_is_corruption() {
    let (_temp, path) = temp_path();
    fs::write(&path, b"XY").unwrap();

    let err = Store::open(config_for(&path)).err().unwrap();

    assert!(matches!(err, RuleDbError::Corruption(_)));
    assert_eq!(fs::read(&path).unwrap(), b"XY");
}

#[test]
fn test_empty_file_is_initialized() {
    let (_temp, path) = temp_path();
    fs::write(&path, b"").unwrap();

    let store = Store::open(config_for(&path)).unwrap();

    assert_eq!(store.recovery().records_recovered, 0);
    assert!(store.view(|tx| Ok(tx.bucket(DEFAULT_BUCKET).is_some())).unwrap());
    assert!(fs::metadata(&path).unwrap().len() > 0);
}
