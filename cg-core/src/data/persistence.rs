//! Durable small-record storage
//!
//! Records are short text values addressed by key. Absence of a record is a
//! normal state, not an error. The file-backed store writes atomically (temp
//! file, fsync, rename) and offers an exclusive advisory lock so that two
//! daemon instances sharing a state directory do not lose updates.

use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::os::unix::fs::{DirBuilderExt, OpenOptionsExt};
use std::os::unix::io::AsRawFd;
use std::path::PathBuf;

use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::constants::limits;
use crate::error::{CoolguardError, Result};

/// Held for the duration of a read-modify-write sequence; released on drop
#[derive(Debug)]
pub struct RecordLock {
    _file: Option<File>,
}

impl RecordLock {
    /// A lock that guards nothing, for stores without cross-process sharing
    pub fn unshared() -> Self {
        Self { _file: None }
    }
}

/// Keyed read/write/delete of small text records
pub trait RecordStore {
    /// Returns `None` if the record does not exist
    fn read(&self, key: &str) -> Result<Option<String>>;

    fn write(&self, key: &str, value: &str) -> Result<()>;

    /// Returns whether a record was removed
    fn remove(&self, key: &str) -> Result<bool>;

    /// Take exclusive access to `key` until the returned guard is dropped
    fn lock(&self, key: &str) -> Result<RecordLock>;
}

impl<S: RecordStore + ?Sized> RecordStore for &S {
    fn read(&self, key: &str) -> Result<Option<String>> {
        (**self).read(key)
    }

    fn write(&self, key: &str, value: &str) -> Result<()> {
        (**self).write(key, value)
    }

    fn remove(&self, key: &str) -> Result<bool> {
        (**self).remove(key)
    }

    fn lock(&self, key: &str) -> Result<RecordLock> {
        (**self).lock(key)
    }
}

/// Keys become file names, so keep them to a single safe path component
fn validate_key(key: &str) -> Result<()> {
    let valid = !key.is_empty()
        && key.len() <= limits::MAX_RECORD_KEY_LEN
        && !key.starts_with('.')
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'));

    if valid {
        Ok(())
    } else {
        Err(CoolguardError::InvalidRecordKey(key.to_string()))
    }
}

/// Records stored as files in one directory
#[derive(Debug, Clone)]
pub struct FileRecordStore {
    dir: PathBuf,
}

impl FileRecordStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Path of the record file for `key`
    pub fn record_path(&self, key: &str) -> Result<PathBuf> {
        validate_key(key)?;
        Ok(self.dir.join(key))
    }

    fn lock_path(&self, key: &str) -> Result<PathBuf> {
        validate_key(key)?;
        Ok(self.dir.join(format!(".{}.lock", key)))
    }

    fn ensure_dir(&self) -> io::Result<()> {
        fs::DirBuilder::new()
            .recursive(true)
            .mode(0o700)
            .create(&self.dir)
    }
}

impl RecordStore for FileRecordStore {
    fn read(&self, key: &str) -> Result<Option<String>> {
        let path = self.record_path(key)?;
        match fs::read_to_string(&path) {
            Ok(contents) => {
                trace!(path = %path.display(), "Read record");
                Ok(Some(contents))
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(CoolguardError::RecordRead { path, source: e }),
        }
    }

    fn write(&self, key: &str, value: &str) -> Result<()> {
        let path = self.record_path(key)?;
        self.ensure_dir()
            .map_err(|e| CoolguardError::RecordWrite { path: path.clone(), source: e })?;

        // Atomic write - write to temp file then rename
        let temp_path = self.dir.join(format!(".{}.tmp", key));

        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(0o600)
            .open(&temp_path)
            .map_err(|e| CoolguardError::RecordWrite { path: temp_path.clone(), source: e })?;

        file.write_all(value.as_bytes())
            .map_err(|e| CoolguardError::RecordWrite { path: temp_path.clone(), source: e })?;

        file.sync_all()
            .map_err(|e| CoolguardError::RecordWrite { path: temp_path.clone(), source: e })?;

        drop(file);

        fs::rename(&temp_path, &path)
            .map_err(|e| CoolguardError::RecordWrite { path: path.clone(), source: e })?;

        debug!(path = %path.display(), "Wrote record");
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<bool> {
        let path = self.record_path(key)?;
        match fs::remove_file(&path) {
            Ok(()) => {
                debug!(path = %path.display(), "Removed record");
                Ok(true)
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(CoolguardError::RecordRemove { path, source: e }),
        }
    }

    fn lock(&self, key: &str) -> Result<RecordLock> {
        let path = self.lock_path(key)?;
        self.ensure_dir()
            .map_err(|e| CoolguardError::RecordLock { path: path.clone(), source: e })?;

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .mode(0o600)
            .open(&path)
            .map_err(|e| CoolguardError::RecordLock { path: path.clone(), source: e })?;

        // SAFETY: flock is called on a file descriptor we own for the lifetime of `file`.
        // The lock is released when the descriptor is closed.
        let rc = unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_EX) };
        if rc != 0 {
            return Err(CoolguardError::RecordLock {
                path,
                source: io::Error::last_os_error(),
            });
        }

        trace!(path = %path.display(), "Acquired record lock");
        Ok(RecordLock { _file: Some(file) })
    }
}

/// Process-local store; nothing survives a restart
#[derive(Debug, Default)]
pub struct MemoryRecordStore {
    records: Mutex<HashMap<String, String>>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.records.lock().contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }
}

impl RecordStore for MemoryRecordStore {
    fn read(&self, key: &str) -> Result<Option<String>> {
        validate_key(key)?;
        Ok(self.records.lock().get(key).cloned())
    }

    fn write(&self, key: &str, value: &str) -> Result<()> {
        validate_key(key)?;
        self.records.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<bool> {
        validate_key(key)?;
        Ok(self.records.lock().remove(key).is_some())
    }

    fn lock(&self, key: &str) -> Result<RecordLock> {
        validate_key(key)?;
        Ok(RecordLock::unshared())
    }
}
