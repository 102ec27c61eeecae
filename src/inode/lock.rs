//! Per-node lock façade
//!
//! Compound operations that must keep a node stable across several table
//! calls lock it here. Blocking modes wait indefinitely; the try modes never
//! block and report [`LockOutcome::WouldBlock`] instead, which lets a caller
//! back off rather than wait on a node someone else holds.
//!
//! Releasing is done by dropping the [`NodeGuard`] (or passing it to
//! [`InodeTable::unlock_node`]); a lock cannot be released without having
//! been acquired.

use std::fmt;
use std::sync::{RwLockReadGuard, RwLockWriteGuard, TryLockError};

use super::table::InodeTable;
use super::types::Inumber;
use crate::error::{FsResult, LockFault};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeLockMode {
    Read,
    Write,
    TryRead,
    TryWrite,
}

enum Held<'a> {
    Read(#[allow(dead_code)] RwLockReadGuard<'a, ()>),
    Write(#[allow(dead_code)] RwLockWriteGuard<'a, ()>),
}

/// A held node lock
#[must_use = "the node lock is released as soon as the guard is dropped"]
pub struct NodeGuard<'a> {
    inumber: Inumber,
    held: Held<'a>,
}

impl NodeGuard<'_> {
    pub fn inumber(&self) -> Inumber {
        self.inumber
    }

    pub fn is_write(&self) -> bool {
        matches!(self.held, Held::Write(_))
    }
}

impl fmt::Debug for NodeGuard<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeGuard")
            .field("inumber", &self.inumber)
            .field("write", &self.is_write())
            .finish()
    }
}

/// Result of a lock attempt on a valid node
#[derive(Debug)]
pub enum LockOutcome<'a> {
    Acquired(NodeGuard<'a>),
    WouldBlock,
}

impl<'a> LockOutcome<'a> {
    pub fn is_acquired(&self) -> bool {
        matches!(self, LockOutcome::Acquired(_))
    }

    pub fn into_guard(self) -> Option<NodeGuard<'a>> {
        match self {
            LockOutcome::Acquired(guard) => Some(guard),
            LockOutcome::WouldBlock => None,
        }
    }
}

fn poisoned(inumber: Inumber) -> LockFault {
    LockFault::poisoned(format!("inode {} lock", inumber))
}

impl InodeTable {
    /// Lock node `inumber` in `mode`
    ///
    /// The inumber is validated (in range and allocated) before the lock is
    /// touched. `Read` and `Write` always come back `Acquired`.
    pub fn lock_node(&self, inumber: Inumber, mode: NodeLockMode) -> FsResult<LockOutcome<'_>> {
        match mode {
            NodeLockMode::Read => self.read_node(inumber).map(LockOutcome::Acquired),
            NodeLockMode::Write => self.write_node(inumber).map(LockOutcome::Acquired),
            NodeLockMode::TryRead => self.try_read_node(inumber),
            NodeLockMode::TryWrite => self.try_write_node(inumber),
        }
    }

    pub fn unlock_node(&self, guard: NodeGuard<'_>) {
        tracing::trace!("Unlocking inode {}", guard.inumber);
        drop(guard);
    }

    /// Shared lock, blocking
    pub fn read_node(&self, inumber: Inumber) -> FsResult<NodeGuard<'_>> {
        self.validate(inumber)?;
        let guard = self
            .slot(inumber)?
            .lock
            .read()
            .map_err(|_| poisoned(inumber))?;
        Ok(NodeGuard {
            inumber,
            held: Held::Read(guard),
        })
    }

    /// Exclusive lock, blocking
    pub fn write_node(&self, inumber: Inumber) -> FsResult<NodeGuard<'_>> {
        self.validate(inumber)?;
        let guard = self
            .slot(inumber)?
            .lock
            .write()
            .map_err(|_| poisoned(inumber))?;
        Ok(NodeGuard {
            inumber,
            held: Held::Write(guard),
        })
    }

    /// Shared lock, non-blocking
    pub fn try_read_node(&self, inumber: Inumber) -> FsResult<LockOutcome<'_>> {
        self.validate(inumber)?;
        match self.slot(inumber)?.lock.try_read() {
            Ok(guard) => Ok(LockOutcome::Acquired(NodeGuard {
                inumber,
                held: Held::Read(guard),
            })),
            Err(TryLockError::WouldBlock) => Ok(LockOutcome::WouldBlock),
            Err(TryLockError::Poisoned(_)) => Err(poisoned(inumber).into()),
        }
    }

    /// Exclusive lock, non-blocking
    pub fn try_write_node(&self, inumber: Inumber) -> FsResult<LockOutcome<'_>> {
        self.validate(inumber)?;
        match self.slot(inumber)?.lock.try_write() {
            Ok(guard) => Ok(LockOutcome::Acquired(NodeGuard {
                inumber,
                held: Held::Write(guard),
            })),
            Err(TryLockError::WouldBlock) => Ok(LockOutcome::WouldBlock),
            Err(TryLockError::Poisoned(_)) => Err(poisoned(inumber).into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TableConfig;
    use crate::error::FsError;
    use crate::inode::NodeKind;

    fn table_with_node() -> (InodeTable, Inumber) {
        let table = InodeTable::new(&TableConfig {
            table_size: 4,
            max_dir_entries: 2,
            max_name_len: 16,
            delay_cycles: 0,
        });
        let inumber = table.allocate(NodeKind::Directory).unwrap();
        (table, inumber)
    }

    #[test]
    fn test_invalid_inumber_is_rejected() {
        let (table, _) = table_with_node();
        assert!(matches!(
            table.lock_node(3, NodeLockMode::Read),
            Err(FsError::InvalidInumber(3))
        ));
        assert!(matches!(
            table.lock_node(9, NodeLockMode::TryWrite),
            Err(FsError::InvalidInumber(9))
        ));
    }

    #[test]
    fn test_write_held_blocks_all_tries() {
        let (table, ino) = table_with_node();
        let guard = table.lock_node(ino, NodeLockMode::Write).unwrap();
        assert!(guard.is_acquired());

        assert!(!table.lock_node(ino, NodeLockMode::TryRead).unwrap().is_acquired());
        assert!(!table.lock_node(ino, NodeLockMode::TryWrite).unwrap().is_acquired());

        table.unlock_node(guard.into_guard().unwrap());
        assert!(table.lock_node(ino, NodeLockMode::TryWrite).unwrap().is_acquired());
    }

    #[test]
    fn test_read_held_admits_readers_only() {
        let (table, ino) = table_with_node();
        let first = table.read_node(ino).unwrap();
        let second = table.try_read_node(ino).unwrap();
        assert!(second.is_acquired());
        assert!(!table.try_write_node(ino).unwrap().is_acquired());

        drop(second);
        assert!(!table.try_write_node(ino).unwrap().is_acquired());

        table.unlock_node(first);
        let writer = table.try_write_node(ino).unwrap().into_guard().unwrap();
        assert!(writer.is_write());
        assert_eq!(writer.inumber(), ino);
    }

    #[test]
    fn test_lock_survives_free_and_reuse() {
        let (table, ino) = table_with_node();
        table.free(ino).unwrap();
        assert!(table.read_node(ino).is_err());

        let again = table.allocate(NodeKind::File).unwrap();
        assert_eq!(again, ino);
        assert!(table.write_node(again).is_ok());
    }
}
