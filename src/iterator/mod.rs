mod vec;

pub use vec::VecIterator;

use crate::error::{Error, Result};

/// The central iteration abstraction.
///
/// Every sorted data source (in-memory run, block, table) implements this
/// trait, so the table build driver can consume any of them.
///
/// Errors do not abort iteration through the return type: a source that
/// hits a fault becomes invalid and reports the fault from `status()`.
/// Callers drain first and check `status()` afterwards.
pub trait StorageIterator {
    /// Positions at the first entry. Invalid afterwards if the source is empty.
    fn seek_to_first(&mut self);

    /// Positions at the first entry with key >= target.
    fn seek(&mut self, target: &[u8]);

    /// Returns true if the iterator is positioned at a valid entry.
    fn is_valid(&self) -> bool;

    /// Advances to the next entry. Requires `is_valid()`.
    fn next(&mut self);

    /// Returns the current key. Only valid when is_valid() is true.
    fn key(&self) -> &[u8];

    /// Returns the current value. Only valid when is_valid() is true.
    fn value(&self) -> &[u8];

    /// Ok unless the source has encountered an error.
    fn status(&self) -> Result<()>;
}

/// An iterator over nothing that carries an error.
///
/// Returned where opening the real source failed, so callers see the
/// failure through `status()` like any other iterator fault.
pub struct ErrorIterator {
    status: Error,
}

impl ErrorIterator {
    pub fn new(err: Error) -> Self {
        ErrorIterator { status: err }
    }
}

impl StorageIterator for ErrorIterator {
    fn seek_to_first(&mut self) {}

    fn seek(&mut self, _target: &[u8]) {}

    fn is_valid(&self) -> bool {
        false
    }

    fn next(&mut self) {}

    fn key(&self) -> &[u8] {
        &[]
    }

    fn value(&self) -> &[u8] {
        &[]
    }

    fn status(&self) -> Result<()> {
        Err(self.status.clone())
    }
}
