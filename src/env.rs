use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::Result;

/// Sequential, append-only output file.
///
/// Two layers of buffering:
///   flush() → user-space buffer → OS page cache
///   sync()  → OS page cache → physical disk
pub trait WritableFile: Send {
    fn append(&mut self, data: &[u8]) -> Result<()>;
    fn flush(&mut self) -> Result<()>;
    fn sync(&mut self) -> Result<()>;
    fn close(&mut self) -> Result<()>;
}

/// Positional reads from an immutable file.
pub trait RandomAccessFile: Send + Sync {
    /// Read exactly `len` bytes starting at `offset`.
    fn read(&self, offset: u64, len: usize) -> Result<Vec<u8>>;
}

/// The filesystem operations table construction needs.
pub trait Env: Send + Sync {
    /// Create (or truncate) a file for writing.
    fn new_writable_file(&self, path: &Path) -> Result<Box<dyn WritableFile>>;

    fn new_random_access_file(&self, path: &Path) -> Result<Arc<dyn RandomAccessFile>>;

    /// Delete a file. Removing a file that does not exist is not an error.
    fn remove_file(&self, path: &Path) -> Result<()>;

    /// Create `path` and any missing parents. Existing directories are fine.
    fn create_dir_all(&self, path: &Path) -> Result<()>;
}

/// `Env` backed by the local filesystem.
#[derive(Debug, Default, Clone, Copy)]
pub struct DiskEnv;

impl Env for DiskEnv {
    fn new_writable_file(&self, path: &Path) -> Result<Box<dyn WritableFile>> {
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;
        Ok(Box::new(DiskWritableFile {
            path: path.to_path_buf(),
            writer: Some(BufWriter::new(file)),
        }))
    }

    fn new_random_access_file(&self, path: &Path) -> Result<Arc<dyn RandomAccessFile>> {
        let file = File::open(path)?;
        Ok(Arc::new(DiskRandomAccessFile {
            file: Mutex::new(file),
        }))
    }

    fn remove_file(&self, path: &Path) -> Result<()> {
        match fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn create_dir_all(&self, path: &Path) -> Result<()> {
        fs::create_dir_all(path)?;
        Ok(())
    }
}

struct DiskWritableFile {
    path: PathBuf,
    /// None once closed.
    writer: Option<BufWriter<File>>,
}

impl DiskWritableFile {
    fn writer(&mut self) -> Result<&mut BufWriter<File>> {
        match self.writer.as_mut() {
            Some(w) => Ok(w),
            None => Err(io::Error::other(format!(
                "{} already closed",
                self.path.display()
            ))
            .into()),
        }
    }
}

impl WritableFile for DiskWritableFile {
    fn append(&mut self, data: &[u8]) -> Result<()> {
        self.writer()?.write_all(data)?;
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.writer()?.flush()?;
        Ok(())
    }

    fn sync(&mut self) -> Result<()> {
        let writer = self.writer()?;
        writer.flush()?;
        writer.get_ref().sync_all()?;
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        if let Some(mut writer) = self.writer.take() {
            writer.flush()?;
        }
        Ok(())
    }
}

struct DiskRandomAccessFile {
    file: Mutex<File>,
}

impl RandomAccessFile for DiskRandomAccessFile {
    fn read(&self, offset: u64, len: usize) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; len];
        let mut file = self.file.lock();
        file.seek(SeekFrom::Start(offset))?;
        file.read_exact(&mut buf)?;
        Ok(buf)
    }
}
