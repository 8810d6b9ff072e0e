//! Backing files.
//!
//! Every allocation gets its own file in the storage directory. The file is created
//! empty and then extended to the requested size, which leaves a sparse file: its
//! logical length is `size` but no disk blocks are committed until pages are written.
//!
//! ```text
//! <storage dir>/
//! ├── 0000000.tmp   index 0, 4096 bytes logical, 0 bytes on disk
//! ├── 0000001.tmp   index 1, 8192 bytes logical, 0 bytes on disk
//! └── 0000042.tmp   index 42
//! ```
//!
//! Names are derived from the block index alone, so unique indices (see
//! [`crate::index::BlockIndexGenerator`]) mean unique files without any locking here.

use std::{
    fs::{self, DirBuilder, File, OpenOptions},
    io,
    path::{Path, PathBuf},
};

use tracing::debug;

use crate::{
    config::StorageConfig,
    error::{AllocError, Result},
};

#[derive(Debug, Clone)]
pub struct SparseFileFactory {
    dir: PathBuf,
    name_width: usize,
    extension: String,
}

impl SparseFileFactory {
    pub fn new(config: &StorageConfig) -> Self {
        Self {
            dir: config.dir.clone(),
            name_width: config.name_width,
            extension: config.extension.clone(),
        }
    }

    /// Storage directory shared by every backing file of this factory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File name of the block with the given `index`, e.g. `0000042.tmp`.
    pub fn file_name(&self, index: u64) -> String {
        format!("{index:0width$}.{ext}", width = self.name_width, ext = self.extension)
    }

    /// Full path of the block with the given `index`.
    pub fn path(&self, index: u64) -> PathBuf {
        self.dir.join(self.file_name(index))
    }

    /// Makes sure the storage directory exists. Someone else creating it between the
    /// check and our own attempt is fine.
    pub fn ensure_dir(&self) -> Result<()> {
        if self.dir.is_dir() {
            return Ok(());
        }

        let mut builder = DirBuilder::new();
        builder.recursive(true);

        #[cfg(unix)]
        {
            use std::os::unix::fs::DirBuilderExt;
            // Only the owner can look at the contents of allocations.
            builder.mode(0o700);
        }

        match builder.create(&self.dir) {
            Ok(()) => {
                debug!(dir = ?self.dir, "Created storage directory");
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists && self.dir.is_dir() => Ok(()),
            Err(source) => Err(AllocError::CreateDir {
                path: self.dir.clone(),
                source,
            }),
        }
    }

    /// Creates the backing file of block `index` with a logical length of exactly
    /// `size` bytes and returns it opened for reading and writing.
    ///
    /// If the file can't be sized it is dropped (closed) before the error is
    /// returned, so nothing stays open.
    pub fn create(&self, size: usize, index: u64) -> Result<File> {
        self.ensure_dir()?;

        let path = self.path(index);

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .map_err(|source| AllocError::Open {
                path: path.clone(),
                source,
            })?;

        file.set_len(size as u64)
            .map_err(|source| AllocError::Truncate {
                path: path.clone(),
                size,
                source,
            })?;

        debug!(index, size, ?path, "Created backing file");

        Ok(file)
    }

    /// Removes the backing file of block `index` from the storage directory.
    pub fn unlink(&self, index: u64) -> io::Result<()> {
        fs::remove_file(self.path(index))
    }
}
