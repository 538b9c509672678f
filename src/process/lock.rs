//! Store lock: refuses two hosts on one process store.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

const LOCK_FILE_NAME: &str = "process.lock";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreLockMeta {
    pub pid: u32,
    pub started_at_ms: u64,
}

#[derive(Debug, Error)]
pub enum StoreLockError {
    #[error("store is locked by pid {pid} ({path})")]
    Held { pid: u32, path: PathBuf },
    #[error("store is locked ({path}); lock metadata unreadable: {reason}")]
    HeldUnreadable { path: PathBuf, reason: String },
    #[error("store lock I/O on '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Held for the lifetime of the hosting process; the file is removed on drop.
#[derive(Debug)]
pub struct StoreLock {
    path: PathBuf,
    released: bool,
}

impl StoreLock {
    pub fn acquire(store_root: &Path) -> Result<Self, StoreLockError> {
        fs::create_dir_all(store_root).map_err(|source| StoreLockError::Io {
            path: store_root.to_path_buf(),
            source,
        })?;
        let path = store_root.join(LOCK_FILE_NAME);

        let meta = StoreLockMeta {
            pid: std::process::id(),
            started_at_ms: std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .map(|d| d.as_millis() as u64)
                .unwrap_or(0),
        };

        let mut file = match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => file,
            Err(source) if source.kind() == io::ErrorKind::AlreadyExists => {
                return Err(match read_meta(&path) {
                    Ok(meta) => StoreLockError::Held {
                        pid: meta.pid,
                        path,
                    },
                    Err(reason) => StoreLockError::HeldUnreadable { path, reason },
                });
            }
            Err(source) => return Err(StoreLockError::Io { path, source }),
        };

        let bytes = serde_json::to_vec(&meta).unwrap_or_default();
        file.write_all(&bytes)
            .map_err(|source| StoreLockError::Io {
                path: path.clone(),
                source,
            })?;
        Ok(Self {
            path,
            released: false,
        })
    }

    pub fn release(mut self) {
        self.release_inner();
    }

    fn release_inner(&mut self) {
        if !self.released {
            self.released = true;
            let _ = fs::remove_file(&self.path);
        }
    }
}

impl Drop for StoreLock {
    fn drop(&mut self) {
        self.release_inner();
    }
}

fn read_meta(path: &Path) -> Result<StoreLockMeta, String> {
    let bytes = fs::read(path).map_err(|e| e.to_string())?;
    serde_json::from_slice(&bytes).map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn second_acquire_fails_until_released() {
        let temp = TempDir::new().expect("temp dir");
        let lock = StoreLock::acquire(temp.path()).expect("acquire");

        let err = StoreLock::acquire(temp.path()).unwrap_err();
        assert!(matches!(err, StoreLockError::Held { pid, .. } if pid == std::process::id()));

        lock.release();
        let again = StoreLock::acquire(temp.path()).expect("reacquire");
        drop(again);
        assert!(!temp.path().join(LOCK_FILE_NAME).exists());
    }
}
