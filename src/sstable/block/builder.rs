use std::sync::Arc;

use crate::coding::{put_fixed32, put_varint32};
use crate::comparator::Comparator;
use crate::error::{Error, Result};
use crate::options::Options;

/// Accumulates sorted key-value pairs and serializes them into a block.
///
/// Keys are prefix-compressed: each entry drops the prefix it shares with
/// the previous key. Every `restart_interval` entries the full key is stored
/// again. That entry is a "restart point", and a reader can start decoding
/// from any of them without looking further back.
///
/// On-disk layout of a block:
/// ```text
/// ┌──────────────────────────────────────────────────────────────────┐
/// │ Entry 0: [shared][non_shared][value_len][key_suffix][value]       │
/// │ Entry 1: ...                                                      │
/// │ Entry N: ...                                                      │
/// ├──────────────────────────────────────────────────────────────────┤
/// │ Restart array: [restart_0(4B)][restart_1(4B)]...                  │
/// │ Num restarts (4B)                                                 │
/// └──────────────────────────────────────────────────────────────────┘
/// ```
/// `shared`, `non_shared` and `value_len` are varint32s; restart offsets and
/// the count are fixed32 little-endian. `shared == 0` at every restart point.
///
/// Lookup cost is a binary search over the restart array plus a linear scan
/// of at most `restart_interval` entries.
pub struct BlockBuilder {
    comparator: Arc<dyn Comparator>,
    restart_interval: usize,
    buffer: Vec<u8>,
    /// Offsets of restart points. Always starts with 0.
    restarts: Vec<u32>,
    /// Entries emitted since the last restart.
    counter: usize,
    /// Full copy of the last key added.
    last_key: Vec<u8>,
    num_entries: usize,
    finished: bool,
}

/// Lengths and offsets are stored as 32-bit integers.
fn length_u32(len: usize, what: &str) -> Result<u32> {
    u32::try_from(len)
        .map_err(|_| Error::Precondition(format!("{what} length {len} does not fit in 32 bits")))
}

impl BlockBuilder {
    /// Create a block builder using the options' comparator and restart interval.
    ///
    /// # Panics
    /// Panics if `block_restart_interval` is 0. `Options::validate` rejects that.
    pub fn new(options: &Options) -> Self {
        Self::with_restart_interval(options, options.block_restart_interval)
    }

    /// Same as `new` but overrides the restart interval. The index block
    /// restarts at every entry.
    pub fn with_restart_interval(options: &Options, restart_interval: usize) -> Self {
        assert!(restart_interval >= 1, "restart interval must be >= 1");
        BlockBuilder {
            comparator: Arc::clone(&options.comparator),
            restart_interval,
            buffer: Vec::new(),
            restarts: vec![0],
            counter: 0,
            last_key: Vec::new(),
            num_entries: 0,
            finished: false,
        }
    }

    /// Add a key-value pair to the block.
    ///
    /// `key` must sort strictly after every key already in the block.
    /// Out-of-order keys and adds after `finish` are rejected with
    /// `Error::Precondition` and leave the block untouched.
    pub fn add(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        if self.finished {
            return Err(Error::Precondition("add() after finish()".into()));
        }
        if self.counter > self.restart_interval {
            return Err(Error::Precondition(format!(
                "{} entries since last restart exceeds interval {}",
                self.counter, self.restart_interval
            )));
        }
        if !self.buffer.is_empty() && self.comparator.compare(key, &self.last_key).is_le() {
            return Err(Error::Precondition(format!(
                "key {:?} does not sort after previous key {:?}",
                String::from_utf8_lossy(key),
                String::from_utf8_lossy(&self.last_key)
            )));
        }

        let restart = self.counter >= self.restart_interval;
        let shared = if restart {
            0
        } else {
            self.last_key
                .iter()
                .zip(key)
                .take_while(|(a, b)| a == b)
                .count()
        };
        let non_shared = key.len() - shared;
        // All lengths and offsets are checked before the block is touched.
        let shared_len = length_u32(shared, "shared key prefix")?;
        let non_shared_len = length_u32(non_shared, "key suffix")?;
        let value_len = length_u32(value.len(), "value")?;
        let offset = length_u32(self.buffer.len(), "block offset")?;

        if restart {
            // Restart compression
            self.restarts.push(offset);
            self.counter = 0;
        }

        // <shared><non_shared><value_len><key_suffix><value>
        put_varint32(&mut self.buffer, shared_len);
        put_varint32(&mut self.buffer, non_shared_len);
        put_varint32(&mut self.buffer, value_len);
        self.buffer.extend_from_slice(&key[shared..]);
        self.buffer.extend_from_slice(value);

        self.last_key.truncate(shared);
        self.last_key.extend_from_slice(&key[shared..]);
        debug_assert_eq!(self.last_key.as_slice(), key);
        self.counter += 1;
        self.num_entries += 1;
        Ok(())
    }

    /// Upper bound on the finished block's size (data + restarts + count).
    pub fn current_size_estimate(&self) -> usize {
        self.buffer.len() + self.restarts.len() * 4 + 4
    }

    /// Finalize the block: append the restart array and its length.
    /// The returned slice stays valid until the next `reset`.
    pub fn finish(&mut self) -> &[u8] {
        if !self.finished {
            for &restart in &self.restarts {
                put_fixed32(&mut self.buffer, restart);
            }
            put_fixed32(&mut self.buffer, self.restarts.len() as u32);
            self.finished = true;
        }
        &self.buffer
    }

    /// Clear all state so the builder can produce the next block.
    /// Allocated buffers are kept.
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.restarts.clear();
        self.restarts.push(0);
        self.counter = 0;
        self.last_key.clear();
        self.num_entries = 0;
        self.finished = false;
    }

    /// Whether the block is empty (no entries added).
    pub fn is_empty(&self) -> bool {
        self.num_entries == 0
    }

    pub fn num_entries(&self) -> usize {
        self.num_entries
    }

    /// Last key added, empty if none.
    pub fn last_key(&self) -> &[u8] {
        &self.last_key
    }
}
