/// Raw key bytes.
pub type Key = Vec<u8>;

/// Raw value bytes.
pub type Value = Vec<u8>;

/// Metadata about a table file, produced by a build and recorded by the
/// version set.
///
/// The caller fills in `number` before the build. Everything else is written
/// by the build and is only meaningful if the build returned `Ok` with a
/// nonzero `file_size`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileMetaData {
    /// Unique file number; determines the file name.
    pub number: u64,
    /// File size in bytes.
    pub file_size: u64,
    /// Smallest key in the table (first key, since entries are sorted).
    pub smallest: Key,
    /// Largest key in the table.
    pub largest: Key,
    /// Number of entries written.
    pub entry_count: u64,
}

impl FileMetaData {
    /// Fresh record for a build targeting file `number`.
    pub fn new(number: u64) -> Self {
        FileMetaData {
            number,
            ..Default::default()
        }
    }
}
