//! Filesystem abstraction used by the part writer
//!
//! Implementations:
//! - LocalDisk (std::fs rooted at a directory)
//! - test doubles that inject failures

use crate::error::{PartWriterError, Result};
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Directory entry returned by [`Disk::list_dir`]
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct DirEntry {
    pub name: String,
    pub is_dir: bool,
}

/// A file opened for sequential writing.
///
/// `finalize` pushes buffered content to the operating system; `sync` makes it
/// durable. Dropping the handle without `finalize` may lose buffered bytes.
pub trait WriteFile: Write + Send {
    fn finalize(&mut self) -> std::io::Result<()>;
    fn sync(&mut self) -> std::io::Result<()>;
}

/// Storage abstraction for part directories. Paths are relative to the disk root.
pub trait Disk: Send + Sync {
    fn create_dir_all(&self, path: &Path) -> Result<()>;

    /// Open a new file for sequential write, truncating any previous content
    fn write_file(&self, path: &Path) -> Result<Box<dyn WriteFile>>;

    fn read_file(&self, path: &Path) -> Result<Vec<u8>>;

    fn remove_file(&self, path: &Path) -> Result<()>;

    fn list_dir(&self, path: &Path) -> Result<Vec<DirEntry>>;

    /// Make directory entries durable. No-op for backends without directories.
    fn sync_dir(&self, _path: &Path) -> Result<()> {
        Ok(())
    }
}

/// Local filesystem disk rooted at a directory
#[derive(Debug, Clone)]
pub struct LocalDisk {
    root: PathBuf,
}

impl LocalDisk {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        self.root.join(path)
    }
}

impl Disk for LocalDisk {
    fn create_dir_all(&self, path: &Path) -> Result<()> {
        let full = self.resolve(path);
        fs::create_dir_all(&full).map_err(|e| PartWriterError::io(&full, e))
    }

    fn write_file(&self, path: &Path) -> Result<Box<dyn WriteFile>> {
        let full = self.resolve(path);
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&full)
            .map_err(|e| PartWriterError::io(&full, e))?;
        Ok(Box::new(LocalWriteFile {
            inner: BufWriter::new(file),
        }))
    }

    fn read_file(&self, path: &Path) -> Result<Vec<u8>> {
        let full = self.resolve(path);
        fs::read(&full).map_err(|e| PartWriterError::io(&full, e))
    }

    fn remove_file(&self, path: &Path) -> Result<()> {
        let full = self.resolve(path);
        fs::remove_file(&full).map_err(|e| PartWriterError::io(&full, e))
    }

    fn list_dir(&self, path: &Path) -> Result<Vec<DirEntry>> {
        let full = self.resolve(path);
        let mut entries = Vec::new();
        for entry in fs::read_dir(&full).map_err(|e| PartWriterError::io(&full, e))? {
            let entry = entry.map_err(|e| PartWriterError::io(&full, e))?;
            let file_type = entry
                .file_type()
                .map_err(|e| PartWriterError::io(entry.path(), e))?;
            entries.push(DirEntry {
                name: entry.file_name().to_string_lossy().into_owned(),
                is_dir: file_type.is_dir(),
            });
        }
        entries.sort();
        Ok(entries)
    }

    fn sync_dir(&self, path: &Path) -> Result<()> {
        let full = self.resolve(path);
        File::open(&full)
            .and_then(|dir| dir.sync_all())
            .map_err(|e| PartWriterError::io(&full, e))
    }
}

struct LocalWriteFile {
    inner: BufWriter<File>,
}

impl Write for LocalWriteFile {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.inner.write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.inner.flush()
    }
}

impl WriteFile for LocalWriteFile {
    fn finalize(&mut self) -> std::io::Result<()> {
        self.inner.flush()
    }

    fn sync(&mut self) -> std::io::Result<()> {
        self.inner.get_ref().sync_all()
    }
}

/// A file whose content is complete but which is not yet durable.
///
/// Released in two phases: [`PendingFile::seal`] while the part is finalized,
/// then [`PendingFile::finish`] once the caller pays for durability.
pub struct PendingFile {
    path: PathBuf,
    file: Box<dyn WriteFile>,
}

impl PendingFile {
    pub fn new(path: PathBuf, file: Box<dyn WriteFile>) -> Self {
        Self { path, file }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Push buffered content to the OS without syncing
    pub fn seal(&mut self) -> Result<()> {
        self.file
            .finalize()
            .map_err(|e| PartWriterError::io(&self.path, e))
    }

    /// Final flush, plus fsync when requested. Consumes and closes the handle.
    pub fn finish(mut self, sync: bool) -> Result<()> {
        self.seal()?;
        if sync {
            self.file
                .sync()
                .map_err(|e| PartWriterError::io(&self.path, e))?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for PendingFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingFile")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_local_disk_write_list_remove() {
        let temp_dir = TempDir::new().unwrap();
        let disk = LocalDisk::new(temp_dir.path());

        disk.create_dir_all(Path::new("part/nested.proj")).unwrap();
        let mut file = disk.write_file(Path::new("part/count.txt")).unwrap();
        file.write_all(b"42").unwrap();
        let pending = PendingFile::new(PathBuf::from("part/count.txt"), file);
        pending.finish(true).unwrap();

        assert_eq!(disk.read_file(Path::new("part/count.txt")).unwrap(), b"42");

        let entries = disk.list_dir(Path::new("part")).unwrap();
        assert_eq!(
            entries,
            vec![
                DirEntry {
                    name: "count.txt".to_string(),
                    is_dir: false
                },
                DirEntry {
                    name: "nested.proj".to_string(),
                    is_dir: true
                },
            ]
        );

        disk.remove_file(Path::new("part/count.txt")).unwrap();
        assert!(disk.read_file(Path::new("part/count.txt")).is_err());
        disk.sync_dir(Path::new("part")).unwrap();
    }

    #[test]
    fn test_io_errors_carry_path() {
        let temp_dir = TempDir::new().unwrap();
        let disk = LocalDisk::new(temp_dir.path());

        let err = disk.read_file(Path::new("missing/file.bin")).unwrap_err();
        assert!(err.to_string().contains("file.bin"));
    }
}
