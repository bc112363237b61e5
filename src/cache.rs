use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Destination for fetched blobs, keyed by rotation index.
pub trait BlobSink {
    /// Store `data` for `index`, replacing any earlier copy.
    fn store(&mut self, index: usize, data: &[u8]) -> io::Result<()>;

    /// Drop every stored blob at `from` or above.
    fn truncate(&mut self, from: usize) -> io::Result<()>;
}

/// On-disk cache of fetched logs: `<dir>/<name>.txt` for the current log and
/// `<dir>/<name>.txt.<index>` for each rotation.
#[derive(Debug, Clone)]
pub struct DirCache {
    dir: PathBuf,
    name: String,
}

impl DirCache {
    /// Open the cache, creating the directory if needed.
    pub fn open(dir: impl Into<PathBuf>, name: impl Into<String>) -> io::Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            name: name.into(),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path_for(&self, index: usize) -> PathBuf {
        if index == 0 {
            self.dir.join(format!("{}.txt", self.name))
        } else {
            self.dir.join(format!("{}.txt.{index}", self.name))
        }
    }

    /// Read cached blobs back in index order, stopping at the first missing
    /// index or after `max` entries.
    pub fn load(&self, max: usize) -> io::Result<Vec<Vec<u8>>> {
        let mut blobs = Vec::new();
        for index in 0..max {
            match fs::read(self.path_for(index)) {
                Ok(data) => blobs.push(data),
                Err(e) if e.kind() == io::ErrorKind::NotFound => break,
                Err(e) => return Err(e),
            }
        }
        Ok(blobs)
    }
}

impl BlobSink for DirCache {
    fn store(&mut self, index: usize, data: &[u8]) -> io::Result<()> {
        // fs::write truncates, so an older copy never leaks through.
        fs::write(self.path_for(index), data)
    }

    /// Removes `<name>.txt.<from>` upward until an index is already missing.
    /// Anything past that gap is unreachable by [`DirCache::load`].
    fn truncate(&mut self, from: usize) -> io::Result<()> {
        for index in from.. {
            match fs::remove_file(self.path_for(index)) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::NotFound => break,
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }
}
