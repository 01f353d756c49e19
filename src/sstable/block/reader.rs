use std::fmt;
use std::sync::Arc;

use crate::coding::{decode_fixed32, get_varint32};
use crate::comparator::Comparator;
use crate::error::{Error, Result};
use crate::iterator::StorageIterator;

/// A decoded, immutable block. Cheap to clone.
///
/// Decoding only validates the restart trailer. Entries are parsed lazily
/// by `BlockIterator`, which reports malformed entries through `status()`.
#[derive(Clone)]
pub struct Block {
    data: Arc<Vec<u8>>,
    /// Offset of the restart array.
    restart_offset: usize,
    num_restarts: u32,
}

impl fmt::Debug for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Block")
            .field("size", &self.data.len())
            .field("num_restarts", &self.num_restarts)
            .finish()
    }
}

impl Block {
    /// Wrap the bytes produced by `BlockBuilder::finish`.
    pub fn decode(data: Vec<u8>) -> Result<Self> {
        if data.len() < 4 {
            return Err(Error::Corruption(format!(
                "block of {} bytes has no restart count",
                data.len()
            )));
        }
        let num_restarts = decode_fixed32(&data[data.len() - 4..]);
        let max_restarts = (data.len() - 4) / 4;
        if num_restarts == 0 || num_restarts as usize > max_restarts {
            return Err(Error::Corruption(format!(
                "bad restart count {num_restarts} for block of {} bytes",
                data.len()
            )));
        }
        let restart_offset = data.len() - (1 + num_restarts as usize) * 4;
        Ok(Block {
            data: Arc::new(data),
            restart_offset,
            num_restarts,
        })
    }

    pub fn num_restarts(&self) -> u32 {
        self.num_restarts
    }

    /// Byte offset of restart point `index`, relative to the block start.
    pub fn restart_point(&self, index: u32) -> u32 {
        debug_assert!(index < self.num_restarts);
        let pos = self.restart_offset + index as usize * 4;
        decode_fixed32(&self.data[pos..])
    }

    /// Iterator over the block's entries, ordered by `comparator`.
    pub fn iter(&self, comparator: Arc<dyn Comparator>) -> BlockIterator {
        BlockIterator {
            block: self.clone(),
            comparator,
            current: self.restart_offset,
            restart_index: self.num_restarts,
            key: Vec::new(),
            value_offset: self.restart_offset,
            value_len: 0,
            status: None,
        }
    }
}

/// Header of one entry: (shared, non_shared, value_len, header_len).
///
/// None if the header is malformed or the key suffix and value run past
/// the end of `src`.
fn decode_entry(src: &[u8]) -> Option<(usize, usize, usize, usize)> {
    let (shared, n1) = get_varint32(src)?;
    let (non_shared, n2) = get_varint32(&src[n1..])?;
    let (value_len, n3) = get_varint32(&src[n1 + n2..])?;
    let header_len = n1 + n2 + n3;
    let (non_shared, value_len) = (non_shared as usize, value_len as usize);
    if src.len() - header_len < non_shared + value_len {
        return None;
    }
    Some((shared as usize, non_shared, value_len, header_len))
}

/// Cursor over one block.
///
/// `seek` binary-searches the restart array for the last restart point
/// whose key is < target, then scans forward.
pub struct BlockIterator {
    block: Block,
    comparator: Arc<dyn Comparator>,
    /// Offset of the current entry; `block.restart_offset` when invalid.
    current: usize,
    /// Restart run containing `current`.
    restart_index: u32,
    key: Vec<u8>,
    value_offset: usize,
    value_len: usize,
    status: Option<Error>,
}

impl BlockIterator {
    fn next_entry_offset(&self) -> usize {
        self.value_offset + self.value_len
    }

    fn seek_to_restart_point(&mut self, index: u32) {
        self.key.clear();
        self.restart_index = index;
        // parse_next_key() starts at the end of the current value
        self.value_offset = self.block.restart_point(index) as usize;
        self.value_len = 0;
    }

    fn corruption(&mut self, msg: &str) {
        self.current = self.block.restart_offset;
        self.restart_index = self.block.num_restarts;
        self.key.clear();
        self.value_offset = self.block.restart_offset;
        self.value_len = 0;
        self.status = Some(Error::Corruption(msg.to_string()));
    }

    fn parse_next_key(&mut self) -> bool {
        self.current = self.next_entry_offset();
        let limit = self.block.restart_offset;
        if self.current >= limit {
            self.current = limit;
            self.restart_index = self.block.num_restarts;
            return false;
        }

        let block_data = Arc::clone(&self.block.data);
        let data = &block_data[self.current..limit];
        let Some((shared, non_shared, value_len, header_len)) = decode_entry(data) else {
            self.corruption("bad entry in block");
            return false;
        };
        if self.key.len() < shared {
            self.corruption("entry shares more than the previous key holds");
            return false;
        }

        self.key.truncate(shared);
        self.key
            .extend_from_slice(&data[header_len..header_len + non_shared]);
        self.value_offset = self.current + header_len + non_shared;
        self.value_len = value_len;
        while self.restart_index + 1 < self.block.num_restarts
            && (self.block.restart_point(self.restart_index + 1) as usize) < self.current
        {
            self.restart_index += 1;
        }
        true
    }
}

impl StorageIterator for BlockIterator {
    fn seek_to_first(&mut self) {
        self.seek_to_restart_point(0);
        self.parse_next_key();
    }

    fn seek(&mut self, target: &[u8]) {
        // Find the last restart point with key < target.
        let mut left = 0u32;
        let mut right = self.block.num_restarts - 1;
        while left < right {
            let mid = (left + right).div_ceil(2);
            let offset = self.block.restart_point(mid) as usize;
            let limit = self.block.restart_offset;
            if offset >= limit {
                self.corruption("restart point past end of entries");
                return;
            }
            let block_data = Arc::clone(&self.block.data);
            let data = &block_data[offset..limit];
            let ordering = match decode_entry(data) {
                Some((0, non_shared, _, header_len)) => self
                    .comparator
                    .compare(&data[header_len..header_len + non_shared], target),
                _ => {
                    self.corruption("bad entry at restart point");
                    return;
                }
            };
            if ordering.is_lt() {
                left = mid;
            } else {
                right = mid - 1;
            }
        }

        self.seek_to_restart_point(left);
        while self.parse_next_key() {
            if self.comparator.compare(&self.key, target).is_ge() {
                return;
            }
        }
    }

    fn is_valid(&self) -> bool {
        self.current < self.block.restart_offset
    }

    fn next(&mut self) {
        debug_assert!(self.is_valid());
        self.parse_next_key();
    }

    fn key(&self) -> &[u8] {
        &self.key
    }

    fn value(&self) -> &[u8] {
        &self.block.data[self.value_offset..self.value_offset + self.value_len]
    }

    fn status(&self) -> Result<()> {
        match &self.status {
            Some(e) => Err(e.clone()),
            None => Ok(()),
        }
    }
}
