use thiserror::Error;

use crate::inode::Inumber;

/// A locking primitive reported a failure
///
/// With std primitives the only failure mode is poisoning: a thread panicked
/// while holding the lock. The library never aborts on it; the caller decides
/// whether the process should go down.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("lock fault on {lock}: {reason}")]
pub struct LockFault {
    pub lock: String,
    pub reason: String,
}

impl LockFault {
    pub fn poisoned(lock: impl Into<String>) -> Self {
        Self {
            lock: lock.into(),
            reason: "poisoned by a panicking holder".to_string(),
        }
    }
}

/// Filesystem error
#[derive(Error, Debug)]
pub enum FsError {
    #[error("invalid inumber: {0}")]
    InvalidInumber(Inumber),

    #[error("inode {0} is not a directory")]
    NotADirectory(Inumber),

    #[error("inode table is full")]
    TableFull,

    #[error("directory {0} has no free entries")]
    DirectoryFull(Inumber),

    #[error("entry name must be non-empty")]
    EmptyName,

    #[error("entry name too long: {len} bytes (max {max})")]
    NameTooLong { len: usize, max: usize },

    #[error("no entry for inode {child} in directory {parent}")]
    EntryNotFound { parent: Inumber, child: Inumber },

    #[error("path not found: {0}")]
    NotFound(String),

    #[error("path already exists: {0}")]
    AlreadyExists(String),

    #[error("invalid path: {0}")]
    InvalidPath(String),

    #[error("directory not empty: {0}")]
    DirectoryNotEmpty(String),

    #[error(transparent)]
    LockFault(#[from] LockFault),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl FsError {
    /// Whether the error was caused by a bad argument rather than by the
    /// state of the table or a locking fault
    ///
    /// Outcomes split three ways: success, failure and invalid argument. A
    /// full table or directory is a failure, since the same call can succeed
    /// once space is freed.
    pub fn is_invalid_argument(&self) -> bool {
        matches!(
            self,
            FsError::InvalidInumber(_)
                | FsError::NotADirectory(_)
                | FsError::EmptyName
                | FsError::NameTooLong { .. }
                | FsError::InvalidPath(_)
        )
    }

    pub fn is_lock_fault(&self) -> bool {
        matches!(self, FsError::LockFault(_))
    }
}

pub type FsResult<T> = Result<T, FsError>;
