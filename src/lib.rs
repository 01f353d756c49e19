//! # SSTable construction for an LSM-tree storage engine
//!
//! Turns a sorted stream of key-value pairs into an immutable table file:
//! prefix-compressed data blocks with restart points, an index block, and a
//! fixed-size footer.
//!
//! ## Core idea
//! A table is written once, start to finish, and never modified. The
//! build driver ([`build_table`]) either produces a synced, re-opened,
//! verified file and describes it in a [`FileMetaData`], or removes the
//! file and reports why. No half-written table is ever left behind.

pub mod build;
pub mod coding;
pub mod comparator;
pub mod env;
pub mod error;
pub mod filename;
pub mod iterator;
pub mod options;
pub mod sstable;
pub mod table_cache;
pub mod types;

// Public re-exports for the top-level API
pub use build::build_table;
pub use comparator::{BytewiseComparator, Comparator};
pub use env::{DiskEnv, Env, RandomAccessFile, WritableFile};
pub use error::{Error, Result};
pub use iterator::{StorageIterator, VecIterator};
pub use options::Options;
pub use table_cache::TableCache;
pub use types::FileMetaData;
