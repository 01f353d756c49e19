use std::fmt;
use std::io;
use std::sync::Arc;

use crate::coding::decode_fixed32;
use crate::env::RandomAccessFile;
use crate::error::{Error, Result};
use crate::iterator::StorageIterator;
use crate::options::Options;
use crate::sstable::block::reader::{Block, BlockIterator};
use crate::sstable::footer::{
    block_checksum, BlockHandle, Footer, BLOCK_TRAILER_SIZE, NO_COMPRESSION,
};

/// Read the block at `handle` and check its trailer.
pub fn read_block(
    file: &dyn RandomAccessFile,
    handle: &BlockHandle,
    verify_checksums: bool,
) -> Result<Block> {
    let n = handle.size as usize;
    let mut buf = match file.read(handle.offset, n + BLOCK_TRAILER_SIZE) {
        Ok(buf) => buf,
        Err(Error::Io(e)) if e.kind() == io::ErrorKind::UnexpectedEof => {
            return Err(Error::Corruption(format!(
                "truncated block read at offset {}",
                handle.offset
            )));
        }
        Err(e) => return Err(e),
    };

    let compression_type = buf[n];
    if verify_checksums {
        let expected = decode_fixed32(&buf[n + 1..]);
        let actual = block_checksum(&buf[..n], compression_type);
        if expected != actual {
            return Err(Error::Corruption(format!(
                "block checksum mismatch at offset {}: expected {expected:#x}, got {actual:#x}",
                handle.offset
            )));
        }
    }
    if compression_type != NO_COMPRESSION {
        return Err(Error::Corruption(format!(
            "unsupported compression type {compression_type}"
        )));
    }

    buf.truncate(n);
    Block::decode(buf)
}

/// An opened table file.
///
/// On open:
/// 1. Read footer (last 40 bytes) → find index and metaindex blocks
/// 2. Read and check the index block
/// 3. Ready for queries (data blocks read on demand)
pub struct Table {
    file: Arc<dyn RandomAccessFile>,
    options: Options,
    index_block: Block,
    footer: Footer,
    file_size: u64,
}

impl fmt::Debug for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Table")
            .field("file_size", &self.file_size)
            .field("footer", &self.footer)
            .field("index_block", &self.index_block)
            .finish_non_exhaustive()
    }
}

impl Table {
    pub fn open(options: &Options, file: Arc<dyn RandomAccessFile>, file_size: u64) -> Result<Self> {
        if file_size < Footer::SIZE as u64 {
            return Err(Error::Corruption(format!(
                "file of {file_size} bytes is too short to be a table"
            )));
        }

        let footer_offset = file_size - Footer::SIZE as u64;
        let footer = Footer::decode(&file.read(footer_offset, Footer::SIZE)?)?;

        let index = footer.index_handle;
        let index_end = index
            .offset
            .saturating_add(index.size)
            .saturating_add(BLOCK_TRAILER_SIZE as u64);
        if index_end > footer_offset {
            return Err(Error::Corruption(format!(
                "index block [{}, +{}) overlaps footer at {footer_offset}",
                index.offset, index.size
            )));
        }
        let index_block = read_block(file.as_ref(), &index, options.verify_checksums)?;

        Ok(Table {
            file,
            options: options.clone(),
            index_block,
            footer,
            file_size,
        })
    }

    /// Iterator over every entry in the table.
    pub fn iter(&self) -> TableIterator {
        TableIterator {
            file: Arc::clone(&self.file),
            options: self.options.clone(),
            index_iter: self.index_block.iter(Arc::clone(&self.options.comparator)),
            data_iter: None,
            data_handle: None,
            file_size: self.file_size,
            status: None,
        }
    }

    /// Point lookup.
    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let mut it = self.iter();
        it.seek(key);
        let found = if it.is_valid() && self.options.comparator.compare(it.key(), key).is_eq() {
            Some(it.value().to_vec())
        } else {
            None
        };
        it.status()?;
        Ok(found)
    }

    /// Number of data blocks.
    pub fn num_data_blocks(&self) -> usize {
        let mut it = self.index_block.iter(Arc::clone(&self.options.comparator));
        let mut n = 0;
        it.seek_to_first();
        while it.is_valid() {
            n += 1;
            it.next();
        }
        n
    }
}

/// Two-level iterator: walks the index block and, for each entry, the data
/// block it points to.
///
/// A data block that cannot be read is skipped; the first such error is
/// kept and reported by `status()`.
pub struct TableIterator {
    file: Arc<dyn RandomAccessFile>,
    options: Options,
    index_iter: BlockIterator,
    data_iter: Option<BlockIterator>,
    /// Block `data_iter` was loaded from.
    data_handle: Option<BlockHandle>,
    file_size: u64,
    status: Option<Error>,
}

impl TableIterator {
    fn save_error(&mut self, err: Error) {
        if self.status.is_none() {
            self.status = Some(err);
        }
    }

    fn init_data_block(&mut self) {
        if !self.index_iter.is_valid() {
            self.data_iter = None;
            self.data_handle = None;
            return;
        }

        let handle = match BlockHandle::decode(self.index_iter.value()) {
            Ok((handle, _)) => handle,
            Err(e) => {
                self.save_error(e);
                self.data_iter = None;
                self.data_handle = None;
                return;
            }
        };
        if self.data_iter.is_some() && self.data_handle == Some(handle) {
            return;
        }
        let end = handle
            .offset
            .saturating_add(handle.size)
            .saturating_add(BLOCK_TRAILER_SIZE as u64);
        if end > self.file_size {
            self.save_error(Error::Corruption(format!(
                "data block [{}, +{}) past end of file",
                handle.offset, handle.size
            )));
            self.data_iter = None;
            self.data_handle = None;
            return;
        }

        match read_block(self.file.as_ref(), &handle, self.options.verify_checksums) {
            Ok(block) => {
                self.data_iter = Some(block.iter(Arc::clone(&self.options.comparator)));
                self.data_handle = Some(handle);
            }
            Err(e) => {
                self.save_error(e);
                self.data_iter = None;
                self.data_handle = None;
            }
        }
    }

    fn skip_empty_data_blocks_forward(&mut self) {
        while !self.data_iter.as_ref().is_some_and(|d| d.is_valid()) {
            if let Some(Err(e)) = self.data_iter.as_ref().map(|d| d.status()) {
                self.save_error(e);
            }
            if !self.index_iter.is_valid() {
                self.data_iter = None;
                self.data_handle = None;
                return;
            }
            self.index_iter.next();
            self.init_data_block();
            if let Some(data_iter) = self.data_iter.as_mut() {
                data_iter.seek_to_first();
            }
        }
    }
}

impl StorageIterator for TableIterator {
    fn seek_to_first(&mut self) {
        self.index_iter.seek_to_first();
        self.init_data_block();
        if let Some(data_iter) = self.data_iter.as_mut() {
            data_iter.seek_to_first();
        }
        self.skip_empty_data_blocks_forward();
    }

    fn seek(&mut self, target: &[u8]) {
        self.index_iter.seek(target);
        self.init_data_block();
        if let Some(data_iter) = self.data_iter.as_mut() {
            data_iter.seek(target);
        }
        self.skip_empty_data_blocks_forward();
    }

    fn is_valid(&self) -> bool {
        self.data_iter.as_ref().is_some_and(|d| d.is_valid())
    }

    fn next(&mut self) {
        debug_assert!(self.is_valid());
        if let Some(data_iter) = self.data_iter.as_mut() {
            data_iter.next();
        }
        self.skip_empty_data_blocks_forward();
    }

    fn key(&self) -> &[u8] {
        match &self.data_iter {
            Some(d) => d.key(),
            None => &[],
        }
    }

    fn value(&self) -> &[u8] {
        match &self.data_iter {
            Some(d) => d.value(),
            None => &[],
        }
    }

    fn status(&self) -> Result<()> {
        self.index_iter.status()?;
        if let Some(data_iter) = &self.data_iter {
            data_iter.status()?;
        }
        match &self.status {
            Some(e) => Err(e.clone()),
            None => Ok(()),
        }
    }
}
