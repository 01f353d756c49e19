use crate::coding::{decode_fixed64, get_varint64, put_fixed64, put_varint64};
use crate::error::{Error, Result};

/// Magic number to identify table files.
pub const TABLE_MAGIC: u64 = 0xdb47_7524_8b80_fb57;

/// Every block on disk is followed by a 1-byte compression type and a
/// 4-byte CRC32 of the block contents plus the type byte.
pub const BLOCK_TRAILER_SIZE: usize = 5;

/// The only compression type written: blocks are stored as-is.
pub const NO_COMPRESSION: u8 = 0;

/// CRC stored in a block trailer.
pub fn block_checksum(contents: &[u8], compression_type: u8) -> u32 {
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(contents);
    hasher.update(&[compression_type]);
    hasher.finalize()
}

/// Location of a block within the file. `size` excludes the trailer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BlockHandle {
    pub offset: u64,
    pub size: u64,
}

impl BlockHandle {
    /// Upper bound on the encoded length: two varint64s.
    pub const MAX_ENCODED_LEN: usize = 10 + 10;

    pub fn new(offset: u64, size: u64) -> Self {
        BlockHandle { offset, size }
    }

    /// Encode as [offset varint64][size varint64].
    pub fn encode_to(&self, dst: &mut Vec<u8>) {
        put_varint64(dst, self.offset);
        put_varint64(dst, self.size);
    }

    /// Decode a handle, returning (handle, bytes_consumed).
    pub fn decode(data: &[u8]) -> Result<(Self, usize)> {
        let (offset, n1) =
            get_varint64(data).ok_or_else(|| Error::Corruption("bad block handle".into()))?;
        let (size, n2) = get_varint64(&data[n1..])
            .ok_or_else(|| Error::Corruption("bad block handle".into()))?;
        Ok((BlockHandle { offset, size }, n1 + n2))
    }
}

/// The footer sits at the end of the table file.
/// It tells the reader where to find the index and metaindex blocks.
///
/// ```text
/// ┌──────────────────────────────────────┐
/// │ Metaindex block offset (8B)          │
/// │ Metaindex block size (8B)            │
/// │ Index block offset (8B)              │
/// │ Index block size (8B)                │
/// │ Magic number (8B)                    │
/// └──────────────────────────────────────┘
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Footer {
    pub metaindex_handle: BlockHandle,
    pub index_handle: BlockHandle,
}

impl Footer {
    /// Size of the footer in bytes (fixed).
    pub const SIZE: usize = 8 * 5;

    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(Self::SIZE);
        put_fixed64(&mut buf, self.metaindex_handle.offset);
        put_fixed64(&mut buf, self.metaindex_handle.size);
        put_fixed64(&mut buf, self.index_handle.offset);
        put_fixed64(&mut buf, self.index_handle.size);
        put_fixed64(&mut buf, TABLE_MAGIC);
        buf
    }

    pub fn decode(data: &[u8]) -> Result<Self> {
        if data.len() < Self::SIZE {
            return Err(Error::Corruption("footer too short".into()));
        }
        let magic = decode_fixed64(&data[32..40]);
        if magic != TABLE_MAGIC {
            return Err(Error::Corruption(format!(
                "bad magic: expected {TABLE_MAGIC:#x}, got {magic:#x}"
            )));
        }
        Ok(Footer {
            metaindex_handle: BlockHandle::new(
                decode_fixed64(&data[0..8]),
                decode_fixed64(&data[8..16]),
            ),
            index_handle: BlockHandle::new(
                decode_fixed64(&data[16..24]),
                decode_fixed64(&data[24..32]),
            ),
        })
    }
}
