use crate::env::WritableFile;
use crate::error::{Error, Result};
use crate::options::Options;
use crate::sstable::block::builder::BlockBuilder;
use crate::sstable::footer::{block_checksum, BlockHandle, Footer, NO_COMPRESSION};

/// Builds a table file from a sorted stream of key-value pairs.
///
/// Build process:
/// 1. Add entries one by one (must be in sorted order)
/// 2. Entries fill up data blocks; once a block's size estimate reaches
///    `block_size` it is written out and indexed by its last key
/// 3. finish() flushes the last block, writes the metaindex block, the
///    index block and the footer
///
/// The builder only appends. Syncing and closing the file is the owner's
/// job, after the builder is dropped.
///
/// After the first failed write every later call returns the same error.
pub struct TableBuilder<'a> {
    options: Options,
    file: &'a mut dyn WritableFile,
    /// Current write position in the file.
    offset: u64,
    data_block: BlockBuilder,
    /// One entry per flushed data block: last key → BlockHandle.
    index_block: BlockBuilder,
    last_key: Vec<u8>,
    num_entries: u64,
    status: Option<Error>,
    closed: bool,
}

impl<'a> TableBuilder<'a> {
    pub fn new(options: &Options, file: &'a mut dyn WritableFile) -> Self {
        TableBuilder {
            options: options.clone(),
            file,
            offset: 0,
            data_block: BlockBuilder::new(options),
            index_block: BlockBuilder::with_restart_interval(options, 1),
            last_key: Vec::new(),
            num_entries: 0,
            status: None,
            closed: false,
        }
    }

    /// Add a key-value pair. `key` must sort after every key added so far.
    pub fn add(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        self.check_open()?;
        if self.num_entries > 0 && self.options.comparator.compare(key, &self.last_key).is_le() {
            return Err(Error::Precondition(format!(
                "table keys out of order: {:?} after {:?}",
                String::from_utf8_lossy(key),
                String::from_utf8_lossy(&self.last_key)
            )));
        }

        self.data_block.add(key, value)?;
        self.last_key.clear();
        self.last_key.extend_from_slice(key);
        self.num_entries += 1;

        if self.data_block.current_size_estimate() >= self.options.block_size {
            self.flush()?;
        }
        Ok(())
    }

    /// Write the current data block, if any, and index it.
    pub fn flush(&mut self) -> Result<()> {
        self.check_open()?;
        if self.data_block.is_empty() {
            return Ok(());
        }

        let result = write_block(self.file, &mut self.offset, &mut self.data_block)
            .and_then(|handle| {
                let mut encoded = Vec::with_capacity(BlockHandle::MAX_ENCODED_LEN);
                handle.encode_to(&mut encoded);
                self.index_block.add(&self.last_key, &encoded)
            })
            .and_then(|()| self.file.flush());
        self.record(result)
    }

    /// Finalize the table: flush the last block, then write the metaindex
    /// block, the index block and the footer.
    pub fn finish(&mut self) -> Result<()> {
        self.flush()?;
        self.closed = true;

        // No filters are built, so the metaindex is an empty block.
        let mut metaindex_block = BlockBuilder::new(&self.options);
        let result = write_block(self.file, &mut self.offset, &mut metaindex_block)
            .and_then(|metaindex_handle| {
                let index_handle =
                    write_block(self.file, &mut self.offset, &mut self.index_block)?;
                let footer = Footer {
                    metaindex_handle,
                    index_handle,
                };
                self.file.append(&footer.encode())?;
                self.offset += Footer::SIZE as u64;
                self.file.flush()
            });
        self.record(result)
    }

    /// Number of entries added so far.
    pub fn num_entries(&self) -> u64 {
        self.num_entries
    }

    /// Bytes written so far. After a successful `finish` this is the final
    /// file size.
    pub fn file_size(&self) -> u64 {
        self.offset
    }

    /// The first write error, if any.
    pub fn status(&self) -> Result<()> {
        match &self.status {
            Some(e) => Err(e.clone()),
            None => Ok(()),
        }
    }

    fn check_open(&self) -> Result<()> {
        self.status()?;
        if self.closed {
            return Err(Error::Precondition("table builder already finished".into()));
        }
        Ok(())
    }

    fn record(&mut self, result: Result<()>) -> Result<()> {
        if let Err(e) = &result {
            self.status = Some(e.clone());
        }
        result
    }
}

/// Append a finished block plus its trailer and reset the block builder.
fn write_block(
    file: &mut dyn WritableFile,
    offset: &mut u64,
    block: &mut BlockBuilder,
) -> Result<BlockHandle> {
    let contents = block.finish();
    let handle = BlockHandle::new(*offset, contents.len() as u64);

    let mut trailer = [0u8; 5];
    trailer[0] = NO_COMPRESSION;
    trailer[1..].copy_from_slice(&block_checksum(contents, NO_COMPRESSION).to_le_bytes());
    file.append(contents)?;
    file.append(&trailer)?;

    *offset += handle.size + trailer.len() as u64;
    block.reset();
    Ok(handle)
}
