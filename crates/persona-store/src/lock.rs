use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

use fs2::FileExt;

use crate::error::{StoreError, StoreResult};

/// File name of the lock inside the data directory.
pub const LOCK_FILE_NAME: &str = "LOCK";

/// Exclusive advisory lock on a data directory.
///
/// Held for the lifetime of the owning store. The operating system drops
/// the lock when the file is closed, so a crashed process never leaves the
/// directory locked.
#[derive(Debug)]
pub(crate) struct DirLock {
    _file: File,
    path: PathBuf,
}

impl DirLock {
    pub(crate) fn acquire(dir: &Path) -> StoreResult<Self> {
        fs::create_dir_all(dir)?;
        let path = dir.join(LOCK_FILE_NAME);
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(&path)?;

        if let Err(err) = file.try_lock_exclusive() {
            if err.kind() == fs2::lock_contended_error().kind() {
                return Err(StoreError::Backend(format!(
                    "data directory in use: {}",
                    dir.display()
                )));
            }
            return Err(err.into());
        }
        Ok(Self { _file: file, path })
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }
}
