use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use lru::LruCache;
use parking_lot::Mutex;
use tracing::debug;

use crate::env::Env;
use crate::error::Result;
use crate::filename::table_file_name;
use crate::iterator::{ErrorIterator, StorageIterator};
use crate::options::Options;
use crate::sstable::reader::Table;

/// LRU cache of open tables, keyed by file number.
///
/// Opening a table reads its footer and index block, so a table that opens
/// is at least structurally sound. The build driver relies on that for its
/// post-write check.
pub struct TableCache {
    dbname: PathBuf,
    env: Arc<dyn Env>,
    options: Options,
    cache: Mutex<LruCache<u64, Arc<Table>>>,
}

impl TableCache {
    pub fn new(dbname: &Path, env: Arc<dyn Env>, options: &Options) -> Self {
        let capacity = NonZeroUsize::new(options.table_cache_capacity).unwrap_or(NonZeroUsize::MIN);
        TableCache {
            dbname: dbname.to_path_buf(),
            env,
            options: options.clone(),
            cache: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Get or open table `file_number`.
    pub fn find_table(&self, file_number: u64, file_size: u64) -> Result<Arc<Table>> {
        if let Some(table) = self.cache.lock().get(&file_number) {
            return Ok(Arc::clone(table));
        }

        let path = table_file_name(&self.dbname, file_number);
        let file = self.env.new_random_access_file(&path)?;
        let table = Arc::new(Table::open(&self.options, file, file_size)?);
        debug!(file_number, file_size, "opened table {}", path.display());

        self.cache.lock().put(file_number, Arc::clone(&table));
        Ok(table)
    }

    /// Iterator over table `file_number`. If the table cannot be opened the
    /// iterator is empty and `status()` carries the error.
    pub fn new_iterator(&self, file_number: u64, file_size: u64) -> Box<dyn StorageIterator> {
        match self.find_table(file_number, file_size) {
            Ok(table) => Box::new(table.iter()),
            Err(e) => Box::new(ErrorIterator::new(e)),
        }
    }

    /// Point lookup in table `file_number`.
    pub fn get(&self, file_number: u64, file_size: u64, key: &[u8]) -> Result<Option<Vec<u8>>> {
        self.find_table(file_number, file_size)?.get(key)
    }

    /// Drop the cached handle for a file that is being deleted.
    pub fn evict(&self, file_number: u64) {
        if self.cache.lock().pop(&file_number).is_some() {
            debug!(file_number, "evicted table from cache");
        }
    }

    /// Number of open tables held.
    pub fn len(&self) -> usize {
        self.cache.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.lock().is_empty()
    }
}
