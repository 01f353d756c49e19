#![allow(dead_code)]

use std::io;
use std::path::Path;
use std::sync::Arc;

use lsm_table::env::{DiskEnv, Env, RandomAccessFile, WritableFile};
use lsm_table::{Error, Result, StorageIterator, VecIterator};

/// Where `FaultyEnv` injects a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// Creating the table file fails.
    Create,
    /// Every append writes half its bytes, then fails.
    Write,
    Sync,
    Close,
    /// Opening the file for reading fails (verification read-back).
    Open,
    /// Every byte written is flipped; all I/O succeeds.
    Garble,
}

/// Disk-backed `Env` that fails at one chosen point.
pub struct FaultyEnv {
    inner: DiskEnv,
    fault: Option<Fault>,
}

impl FaultyEnv {
    pub fn new(fault: Option<Fault>) -> Self {
        FaultyEnv {
            inner: DiskEnv,
            fault,
        }
    }
}

fn injected(what: &str) -> Error {
    Error::Io(io::Error::other(format!("injected {what} failure")))
}

impl Env for FaultyEnv {
    fn new_writable_file(&self, path: &Path) -> Result<Box<dyn WritableFile>> {
        if self.fault == Some(Fault::Create) {
            return Err(injected("create"));
        }
        Ok(Box::new(FaultyFile {
            inner: self.inner.new_writable_file(path)?,
            fault: self.fault,
        }))
    }

    fn new_random_access_file(&self, path: &Path) -> Result<Arc<dyn RandomAccessFile>> {
        if self.fault == Some(Fault::Open) {
            return Err(injected("open"));
        }
        self.inner.new_random_access_file(path)
    }

    fn remove_file(&self, path: &Path) -> Result<()> {
        self.inner.remove_file(path)
    }

    fn create_dir_all(&self, path: &Path) -> Result<()> {
        self.inner.create_dir_all(path)
    }
}

struct FaultyFile {
    inner: Box<dyn WritableFile>,
    fault: Option<Fault>,
}

impl WritableFile for FaultyFile {
    fn append(&mut self, data: &[u8]) -> Result<()> {
        match self.fault {
            Some(Fault::Write) => {
                self.inner.append(&data[..data.len() / 2])?;
                Err(injected("write"))
            }
            Some(Fault::Garble) => {
                let flipped: Vec<u8> = data.iter().map(|b| !b).collect();
                self.inner.append(&flipped)
            }
            _ => self.inner.append(data),
        }
    }

    fn flush(&mut self) -> Result<()> {
        self.inner.flush()
    }

    fn sync(&mut self) -> Result<()> {
        if self.fault == Some(Fault::Sync) {
            // data reaches the page cache before the sync fails
            self.inner.flush()?;
            return Err(injected("sync"));
        }
        self.inner.sync()
    }

    fn close(&mut self) -> Result<()> {
        if self.fault == Some(Fault::Close) {
            self.inner.flush()?;
            return Err(injected("close"));
        }
        self.inner.close()
    }
}

/// Source iterator that yields its entries, then reports an error.
pub struct FailingIterator {
    inner: VecIterator,
    err: Error,
}

impl FailingIterator {
    pub fn new(entries: Vec<(Vec<u8>, Vec<u8>)>, err: Error) -> Self {
        FailingIterator {
            inner: VecIterator::new(entries),
            err,
        }
    }
}

impl StorageIterator for FailingIterator {
    fn seek_to_first(&mut self) {
        self.inner.seek_to_first();
    }

    fn seek(&mut self, target: &[u8]) {
        self.inner.seek(target);
    }

    fn is_valid(&self) -> bool {
        self.inner.is_valid()
    }

    fn next(&mut self) {
        self.inner.next();
    }

    fn key(&self) -> &[u8] {
        self.inner.key()
    }

    fn value(&self) -> &[u8] {
        self.inner.value()
    }

    fn status(&self) -> Result<()> {
        Err(self.err.clone())
    }
}

/// Source iterator that reports an error only once it is exhausted, and
/// counts how many entries were consumed.
pub struct TrailingErrorIterator {
    inner: VecIterator,
    err: Error,
    pub consumed: usize,
}

impl TrailingErrorIterator {
    pub fn new(entries: Vec<(Vec<u8>, Vec<u8>)>, err: Error) -> Self {
        TrailingErrorIterator {
            inner: VecIterator::new(entries),
            err,
            consumed: 0,
        }
    }
}

impl StorageIterator for TrailingErrorIterator {
    fn seek_to_first(&mut self) {
        self.inner.seek_to_first();
    }

    fn seek(&mut self, target: &[u8]) {
        self.inner.seek(target);
    }

    fn is_valid(&self) -> bool {
        self.inner.is_valid()
    }

    fn next(&mut self) {
        self.consumed += 1;
        self.inner.next();
    }

    fn key(&self) -> &[u8] {
        self.inner.key()
    }

    fn value(&self) -> &[u8] {
        self.inner.value()
    }

    fn status(&self) -> Result<()> {
        if self.inner.is_valid() {
            Ok(())
        } else {
            Err(self.err.clone())
        }
    }
}

/// `count` entries with keys `key_00000`, `key_00001`, ...
pub fn sequential_entries(count: usize) -> Vec<(Vec<u8>, Vec<u8>)> {
    (0..count)
        .map(|i| {
            (
                format!("key_{i:05}").into_bytes(),
                format!("value_{i:05}").into_bytes(),
            )
        })
        .collect()
}
