use std::sync::Arc;

use crate::comparator::{BytewiseComparator, Comparator};
use crate::error::Result;
use crate::iterator::StorageIterator;
use crate::types::{Key, Value};

/// Iterator over an in-memory, already sorted run of entries.
///
/// This is what a frozen memtable hands to the table build driver.
/// Ordering is the caller's contract; seeks assume it.
pub struct VecIterator {
    entries: Vec<(Key, Value)>,
    comparator: Arc<dyn Comparator>,
    /// entries.len() when not positioned.
    pos: usize,
}

impl VecIterator {
    /// Sorted by the bytewise comparator.
    pub fn new(entries: Vec<(Key, Value)>) -> Self {
        Self::with_comparator(entries, Arc::new(BytewiseComparator))
    }

    pub fn with_comparator(entries: Vec<(Key, Value)>, comparator: Arc<dyn Comparator>) -> Self {
        let pos = entries.len();
        VecIterator {
            entries,
            comparator,
            pos,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl StorageIterator for VecIterator {
    fn seek_to_first(&mut self) {
        self.pos = 0;
    }

    fn seek(&mut self, target: &[u8]) {
        self.pos = self
            .entries
            .partition_point(|(k, _)| self.comparator.compare(k, target).is_lt());
    }

    fn is_valid(&self) -> bool {
        self.pos < self.entries.len()
    }

    fn next(&mut self) {
        debug_assert!(self.is_valid());
        self.pos += 1;
    }

    fn key(&self) -> &[u8] {
        &self.entries[self.pos].0
    }

    fn value(&self) -> &[u8] {
        &self.entries[self.pos].1
    }

    fn status(&self) -> Result<()> {
        Ok(())
    }
}
