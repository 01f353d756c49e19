use std::fmt;
use std::sync::Arc;

use crate::comparator::{BytewiseComparator, Comparator};
use crate::error::{Error, Result};

/// Configuration for building and reading tables.
///
/// Passed explicitly to every component; there is no global state.
#[derive(Clone)]
pub struct Options {
    /// Key ordering. Must match between the builder and every reader.
    pub comparator: Arc<dyn Comparator>,
    /// Target uncompressed size of a data block. A block is cut once its
    /// size estimate reaches this value.
    pub block_size: usize,
    /// Number of entries between restart points.
    pub block_restart_interval: usize,
    /// Check block trailer CRCs on read.
    pub verify_checksums: bool,
    /// Max number of open tables held by the table cache.
    pub table_cache_capacity: usize,
}

impl Options {
    pub fn comparator(mut self, comparator: Arc<dyn Comparator>) -> Self {
        self.comparator = comparator;
        self
    }

    pub fn block_size(mut self, block_size: usize) -> Self {
        self.block_size = block_size;
        self
    }

    pub fn block_restart_interval(mut self, interval: usize) -> Self {
        self.block_restart_interval = interval;
        self
    }

    pub fn verify_checksums(mut self, verify: bool) -> Self {
        self.verify_checksums = verify;
        self
    }

    pub fn table_cache_capacity(mut self, capacity: usize) -> Self {
        self.table_cache_capacity = capacity;
        self
    }

    /// Reject settings no component can work with.
    pub fn validate(&self) -> Result<()> {
        if self.block_restart_interval == 0 {
            return Err(Error::InvalidArgument(
                "block_restart_interval must be >= 1".into(),
            ));
        }
        if self.block_size == 0 {
            return Err(Error::InvalidArgument("block_size must be > 0".into()));
        }
        Ok(())
    }
}

impl Default for Options {
    fn default() -> Self {
        Options {
            comparator: Arc::new(BytewiseComparator),
            block_size: 4096,
            block_restart_interval: 16,
            verify_checksums: true,
            table_cache_capacity: 1000,
        }
    }
}

impl fmt::Debug for Options {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Options")
            .field("comparator", &self.comparator.name())
            .field("block_size", &self.block_size)
            .field("block_restart_interval", &self.block_restart_interval)
            .field("verify_checksums", &self.verify_checksums)
            .field("table_cache_capacity", &self.table_cache_capacity)
            .finish()
    }
}
