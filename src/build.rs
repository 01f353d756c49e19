use std::path::Path;
use std::time::Instant;

use tracing::{debug, info, warn};

use crate::env::{Env, WritableFile};
use crate::error::Result;
use crate::filename::table_file_name;
use crate::iterator::StorageIterator;
use crate::options::Options;
use crate::sstable::builder::TableBuilder;
use crate::table_cache::TableCache;
use crate::types::FileMetaData;

/// Build table file `meta.number` from the contents of `iter`.
///
/// Used for memtable flushes and compaction output. The build is
/// all-or-nothing:
/// - `Ok(())` with `meta.file_size > 0`: the file is written, synced,
///   closed, reopened successfully, and `meta` describes it.
/// - `Ok(())` with `meta.file_size == 0`: `iter` was empty; no file exists.
/// - `Err(_)`: no file exists and `meta` must be ignored.
///
/// An error reported by `iter.status()` overrides the build's own result.
/// Nothing is retried here.
pub fn build_table(
    dbname: &Path,
    env: &dyn Env,
    options: &Options,
    table_cache: &TableCache,
    iter: &mut dyn StorageIterator,
    meta: &mut FileMetaData,
) -> Result<()> {
    meta.file_size = 0;
    options.validate()?;
    iter.seek_to_first();

    let fname = table_file_name(dbname, meta.number);
    let start = Instant::now();
    let mut status = Ok(());
    if iter.is_valid() {
        debug!(file_number = meta.number, "building table {}", fname.display());
        env.create_dir_all(dbname)?;
        let mut file = env.new_writable_file(&fname)?;
        status = write_table(file.as_mut(), options, iter, meta);
        drop(file);

        if status.is_ok() {
            // Verify that the table is usable
            let it = table_cache.new_iterator(meta.number, meta.file_size);
            status = it.status();
        }
    }

    // Check for input iterator errors
    if let Err(e) = iter.status() {
        status = Err(e);
    }

    if status.is_ok() && meta.file_size > 0 {
        info!(
            file_number = meta.number,
            file_size = meta.file_size,
            entries = meta.entry_count,
            elapsed_us = start.elapsed().as_micros() as u64,
            "built table {}",
            fname.display()
        );
    } else {
        table_cache.evict(meta.number);
        if let Err(e) = env.remove_file(&fname) {
            warn!(file_number = meta.number, error = %e, "failed to remove {}", fname.display());
        }
        if let Err(e) = &status {
            warn!(file_number = meta.number, error = %e, "table build failed");
        }
    }
    status
}

/// Drain `iter` into a table builder over `file`, then sync and close it.
///
/// The source is always read to the end, even after the builder fails, so
/// an error the source reports on exhaustion is seen by the caller.
fn write_table(
    file: &mut dyn WritableFile,
    options: &Options,
    iter: &mut dyn StorageIterator,
    meta: &mut FileMetaData,
) -> Result<()> {
    let mut builder = TableBuilder::new(options, &mut *file);
    meta.smallest = iter.key().to_vec();

    let mut added = Ok(());
    let mut last_key = Vec::new();
    let mut count = 0u64;
    while iter.is_valid() {
        if added.is_ok() {
            added = builder.add(iter.key(), iter.value());
        }
        last_key.clear();
        last_key.extend_from_slice(iter.key());
        count += 1;
        iter.next();
    }
    if count > 0 {
        meta.largest = last_key;
    }
    meta.entry_count = count;
    added?;

    // Finish and check for builder errors
    builder.finish()?;
    meta.file_size = builder.file_size();
    debug_assert!(meta.file_size > 0, "finished table has zero size");
    drop(builder);

    // Finish and check for file errors
    file.sync()?;
    file.close()
}
