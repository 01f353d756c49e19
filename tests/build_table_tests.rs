// Table build driver tests: successful builds, empty input, and cleanup
// after a failure at every step.

mod common;

use std::fs;
use std::path::Path;
use std::sync::Arc;

use common::{sequential_entries, FailingIterator, Fault, FaultyEnv, TrailingErrorIterator};
use lsm_table::filename::table_file_name;
use lsm_table::sstable::reader::Table;
use lsm_table::{
    build_table, DiskEnv, Env, Error, FileMetaData, Options, StorageIterator, TableCache,
    VecIterator,
};
use tempfile::tempdir;

/// Run a build of `entries` as file `number` through `env`.
fn build_with(
    dir: &Path,
    env: Arc<dyn Env>,
    options: &Options,
    iter: &mut dyn StorageIterator,
    number: u64,
) -> (lsm_table::Result<()>, FileMetaData) {
    let cache = TableCache::new(dir, Arc::clone(&env), options);
    let mut meta = FileMetaData::new(number);
    let status = build_table(dir, env.as_ref(), options, &cache, iter, &mut meta);
    (status, meta)
}

fn dir_is_empty(dir: &Path) -> bool {
    fs::read_dir(dir).unwrap().next().is_none()
}

// =============================================================================
// Successful build: file kept, metadata filled in, contents readable
// =============================================================================
#[test]
fn build_writes_verified_table() {
    let dir = tempdir().unwrap();
    let options = Options::default();
    let entries = sequential_entries(1000);
    let mut iter = VecIterator::new(entries.clone());

    let (status, meta) = build_with(dir.path(), Arc::new(DiskEnv), &options, &mut iter, 5);
    status.unwrap();

    let path = table_file_name(dir.path(), 5);
    assert!(path.exists());
    assert_eq!(meta.number, 5);
    assert_eq!(meta.smallest, b"key_00000");
    assert_eq!(meta.largest, b"key_00999");
    assert_eq!(meta.entry_count, 1000);
    assert_eq!(meta.file_size, fs::metadata(&path).unwrap().len());

    let cache = TableCache::new(dir.path(), Arc::new(DiskEnv), &options);
    for (k, v) in &entries {
        assert_eq!(cache.get(5, meta.file_size, k).unwrap().as_ref(), Some(v));
    }
    assert_eq!(cache.get(5, meta.file_size, b"key_01000").unwrap(), None);
}

#[test]
fn built_table_iterates_in_order() {
    let dir = tempdir().unwrap();
    let options = Options::default().block_size(128).block_restart_interval(4);
    let entries = sequential_entries(300);
    let mut iter = VecIterator::new(entries.clone());

    let (status, meta) = build_with(dir.path(), Arc::new(DiskEnv), &options, &mut iter, 9);
    status.unwrap();

    let file = DiskEnv
        .new_random_access_file(&table_file_name(dir.path(), 9))
        .unwrap();
    let table = Table::open(&options, file, meta.file_size).unwrap();
    assert!(table.num_data_blocks() > 10);

    let mut it = table.iter();
    let mut seen = Vec::new();
    it.seek_to_first();
    while it.is_valid() {
        seen.push((it.key().to_vec(), it.value().to_vec()));
        it.next();
    }
    it.status().unwrap();
    assert_eq!(seen, entries);
}

// =============================================================================
// apple / application / banana, restart interval 2, single data block
// =============================================================================
#[test]
fn small_table_scenario() {
    let dir = tempdir().unwrap();
    let options = Options::default().block_restart_interval(2);
    let mut iter = VecIterator::new(vec![
        (b"apple".to_vec(), b"1".to_vec()),
        (b"application".to_vec(), b"2".to_vec()),
        (b"banana".to_vec(), b"3".to_vec()),
    ]);

    let (status, meta) = build_with(dir.path(), Arc::new(DiskEnv), &options, &mut iter, 1);
    status.unwrap();
    assert_eq!(meta.smallest, b"apple");
    assert_eq!(meta.largest, b"banana");

    // The data block sits verbatim at the start of the file.
    let bytes = fs::read(table_file_name(dir.path(), 1)).unwrap();
    let mut expected = Vec::new();
    expected.extend_from_slice(&[0, 5, 1]);
    expected.extend_from_slice(b"apple1");
    expected.extend_from_slice(&[4, 7, 1]);
    expected.extend_from_slice(b"ication2");
    expected.extend_from_slice(&[0, 6, 1]);
    expected.extend_from_slice(b"banana3");
    expected.extend_from_slice(&[0, 0, 0, 0, 20, 0, 0, 0, 2, 0, 0, 0]);
    assert_eq!(&bytes[..expected.len()], expected.as_slice());
    // no compression
    assert_eq!(bytes[expected.len()], 0);
}

// =============================================================================
// Empty input: success, size 0, no file
// =============================================================================
#[test]
fn empty_input_creates_no_file() {
    let dir = tempdir().unwrap();
    let mut iter = VecIterator::new(Vec::new());

    let (status, meta) = build_with(
        dir.path(),
        Arc::new(DiskEnv),
        &Options::default(),
        &mut iter,
        3,
    );
    assert!(status.is_ok());
    assert_eq!(meta.file_size, 0);
    assert!(!table_file_name(dir.path(), 3).exists());
    assert!(dir_is_empty(dir.path()));
}

// =============================================================================
// A failure at any step leaves no file behind
// =============================================================================
fn assert_failed_build_cleans_up(fault: Fault) -> Error {
    let dir = tempdir().unwrap();
    let env: Arc<dyn Env> = Arc::new(FaultyEnv::new(Some(fault)));
    // small blocks so writes happen during add() as well as finish()
    let options = Options::default().block_size(256);
    let mut iter = VecIterator::new(sequential_entries(200));

    let (status, _meta) = build_with(dir.path(), env, &options, &mut iter, 11);
    let err = status.expect_err("build should fail");
    assert!(
        !table_file_name(dir.path(), 11).exists(),
        "{fault:?}: table file left behind"
    );
    assert!(dir_is_empty(dir.path()), "{fault:?}: stray files");
    err
}

#[test]
fn create_failure_cleans_up() {
    assert!(assert_failed_build_cleans_up(Fault::Create).is_io());
}

#[test]
fn write_failure_cleans_up() {
    assert!(assert_failed_build_cleans_up(Fault::Write).is_io());
}

#[test]
fn sync_failure_cleans_up() {
    assert!(assert_failed_build_cleans_up(Fault::Sync).is_io());
}

#[test]
fn close_failure_cleans_up() {
    assert!(assert_failed_build_cleans_up(Fault::Close).is_io());
}

#[test]
fn verify_open_failure_cleans_up() {
    assert!(assert_failed_build_cleans_up(Fault::Open).is_io());
}

#[test]
fn unreadable_table_cleans_up() {
    // written and synced fine, but the bytes on disk are garbage
    assert!(assert_failed_build_cleans_up(Fault::Garble).is_corruption());
}

// =============================================================================
// Upstream iterator error overrides a successful write
// =============================================================================
#[test]
fn iterator_error_supersedes_success() {
    let dir = tempdir().unwrap();
    let mut iter = FailingIterator::new(
        sequential_entries(50),
        Error::Corruption("memtable entry checksum".into()),
    );

    let (status, _meta) = build_with(
        dir.path(),
        Arc::new(DiskEnv),
        &Options::default(),
        &mut iter,
        4,
    );
    assert!(status.unwrap_err().is_corruption());
    assert!(!table_file_name(dir.path(), 4).exists());
}

#[test]
fn iterator_error_on_empty_input_reported() {
    let dir = tempdir().unwrap();
    let mut iter = FailingIterator::new(Vec::new(), Error::Corruption("bad source".into()));

    let (status, meta) = build_with(
        dir.path(),
        Arc::new(DiskEnv),
        &Options::default(),
        &mut iter,
        4,
    );
    assert!(status.is_err());
    assert_eq!(meta.file_size, 0);
    assert!(dir_is_empty(dir.path()));
}

#[test]
fn source_drained_after_write_failure() {
    let dir = tempdir().unwrap();
    let env: Arc<dyn Env> = Arc::new(FaultyEnv::new(Some(Fault::Write)));
    // small blocks so the first write fails long before the source ends
    let options = Options::default().block_size(256);
    let mut iter = TrailingErrorIterator::new(
        sequential_entries(200),
        Error::Corruption("truncated memtable".into()),
    );

    let (status, _meta) = build_with(dir.path(), env, &options, &mut iter, 6);
    assert_eq!(iter.consumed, 200);
    assert!(status.unwrap_err().is_corruption());
    assert!(dir_is_empty(dir.path()));
}

#[test]
fn missing_db_directory_is_created() {
    let dir = tempdir().unwrap();
    let dbname = dir.path().join("db");
    let mut iter = VecIterator::new(sequential_entries(10));

    let (status, meta) = build_with(&dbname, Arc::new(DiskEnv), &Options::default(), &mut iter, 1);
    status.unwrap();
    assert_eq!(
        fs::metadata(table_file_name(&dbname, 1)).unwrap().len(),
        meta.file_size
    );
}

// =============================================================================
// Caller bugs
// =============================================================================
#[test]
fn unsorted_input_rejected_and_removed() {
    let dir = tempdir().unwrap();
    let mut iter = VecIterator::new(vec![
        (b"b".to_vec(), b"1".to_vec()),
        (b"a".to_vec(), b"2".to_vec()),
    ]);

    let (status, _meta) = build_with(
        dir.path(),
        Arc::new(DiskEnv),
        &Options::default(),
        &mut iter,
        8,
    );
    assert!(status.unwrap_err().is_precondition());
    assert!(dir_is_empty(dir.path()));
}

#[test]
fn invalid_options_rejected_before_io() {
    let dir = tempdir().unwrap();
    let options = Options::default().block_restart_interval(0);
    let mut iter = VecIterator::new(sequential_entries(10));

    let (status, _meta) = build_with(dir.path(), Arc::new(DiskEnv), &options, &mut iter, 2);
    assert!(matches!(status, Err(Error::InvalidArgument(_))));
    assert!(dir_is_empty(dir.path()));
}

// =============================================================================
// Independent builds can run on separate threads
// =============================================================================
#[test]
fn concurrent_builds_with_distinct_numbers() {
    let dir = tempdir().unwrap();
    let env: Arc<dyn Env> = Arc::new(DiskEnv);
    let options = Options::default().block_size(512);
    let cache = TableCache::new(dir.path(), Arc::clone(&env), &options);

    let metas: Vec<FileMetaData> = std::thread::scope(|s| {
        let handles: Vec<_> = (1..=4u64)
            .map(|number| {
                let (env, options, cache) = (&env, &options, &cache);
                let dir = dir.path();
                s.spawn(move || {
                    let mut iter = VecIterator::new(sequential_entries(100 * number as usize));
                    let mut meta = FileMetaData::new(number);
                    build_table(dir, env.as_ref(), options, cache, &mut iter, &mut meta).unwrap();
                    meta
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    for meta in &metas {
        assert_eq!(meta.entry_count, 100 * meta.number);
        let path = table_file_name(dir.path(), meta.number);
        assert_eq!(fs::metadata(path).unwrap().len(), meta.file_size);
    }
}
