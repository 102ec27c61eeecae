//! Synchronization strategies
//!
//! A [`Synchronizer`] is built once from a [`Strategy`] and shared by every
//! worker. It owns the table-wide lock implied by the strategy plus the
//! compound lock that serializes multi-step removals.
//!
//! | strategy    | table lock                       | node locks | compound lock |
//! |-------------|----------------------------------|------------|---------------|
//! | `nosync`    | none                             | no         | no            |
//! | `mutex`     | one mutex, any mode              | no         | yes           |
//! | `rwlock`    | rwlock in the requested mode     | yes        | yes           |
//!
//! Acquisitions hand back guards; dropping a guard (or passing it to the
//! matching `release_*` call) releases the lock, so a lock is released exactly
//! once on every exit path.

use std::fmt;
use std::str::FromStr;
use std::sync::{Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::error::LockFault;

/// Locking granularity chosen at startup
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Strategy {
    /// No locking at all; throughput baseline only
    #[default]
    None,

    /// A single global mutex around every table access
    Exclusive,

    /// Global rwlock for table-wide changes, one rwlock per node otherwise
    Striped,
}

impl Strategy {
    pub const ALL: [Strategy; 3] = [Strategy::None, Strategy::Exclusive, Strategy::Striped];

    /// Name used on the command line and in config files
    pub fn name(&self) -> &'static str {
        match self {
            Strategy::None => "nosync",
            Strategy::Exclusive => "mutex",
            Strategy::Striped => "rwlock",
        }
    }

    /// Resolve a strategy name, falling back to [`Strategy::None`]
    ///
    /// Unknown names leave the process unsynchronized instead of failing.
    /// Use [`str::parse`] to reject them.
    pub fn from_name(name: &str) -> Self {
        match name.parse() {
            Ok(strategy) => strategy,
            Err(err) => {
                tracing::warn!("{}; running without synchronization", err);
                Strategy::None
            }
        }
    }

    /// Whether compound operations take per-node locks
    pub fn uses_node_locks(&self) -> bool {
        matches!(self, Strategy::Striped)
    }

    /// Whether the compound lock is a real lock
    pub fn uses_compound_lock(&self) -> bool {
        !matches!(self, Strategy::None)
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown synchronization strategy: {0:?}")]
pub struct UnknownStrategy(pub String);

impl FromStr for Strategy {
    type Err = UnknownStrategy;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "nosync" => Ok(Strategy::None),
            "mutex" => Ok(Strategy::Exclusive),
            "rwlock" => Ok(Strategy::Striped),
            other => Err(UnknownStrategy(other.to_string())),
        }
    }
}

/// Requested access mode for the table-wide lock
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockMode {
    Read,
    Write,
}

enum TableLock {
    Unsynchronized,
    Exclusive(Mutex<()>),
    Striped(RwLock<()>),
}

/// Held table-wide lock
#[must_use = "the table lock is released as soon as the guard is dropped"]
pub enum TableGuard<'a> {
    Unlocked,
    Exclusive(MutexGuard<'a, ()>),
    Read(RwLockReadGuard<'a, ()>),
    Write(RwLockWriteGuard<'a, ()>),
}

impl TableGuard<'_> {
    pub fn is_locked(&self) -> bool {
        !matches!(self, TableGuard::Unlocked)
    }
}

impl fmt::Debug for TableGuard<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match self {
            TableGuard::Unlocked => "Unlocked",
            TableGuard::Exclusive(_) => "Exclusive",
            TableGuard::Read(_) => "Read",
            TableGuard::Write(_) => "Write",
        };
        f.debug_tuple("TableGuard").field(&state).finish()
    }
}

/// Held compound lock (empty under `nosync`)
#[must_use = "the compound lock is released as soon as the guard is dropped"]
pub struct CompoundGuard<'a>(Option<MutexGuard<'a, ()>>);

impl CompoundGuard<'_> {
    pub fn is_locked(&self) -> bool {
        self.0.is_some()
    }
}

impl fmt::Debug for CompoundGuard<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("CompoundGuard")
            .field(&self.is_locked())
            .finish()
    }
}

/// Process-wide locking policy handle
///
/// Built once before workers start and shared by reference (or inside an
/// `Arc`); there is no global "current strategy".
pub struct Synchronizer {
    strategy: Strategy,
    table: TableLock,
    compound: Option<Mutex<()>>,
}

impl Synchronizer {
    pub fn new(strategy: Strategy) -> Self {
        let table = match strategy {
            Strategy::None => TableLock::Unsynchronized,
            Strategy::Exclusive => TableLock::Exclusive(Mutex::new(())),
            Strategy::Striped => TableLock::Striped(RwLock::new(())),
        };
        let compound = strategy.uses_compound_lock().then(|| Mutex::new(()));

        tracing::debug!("Synchronizer initialized with strategy {}", strategy);

        Self {
            strategy,
            table,
            compound,
        }
    }

    pub fn strategy(&self) -> Strategy {
        self.strategy
    }

    /// Take the table-wide lock
    ///
    /// `mode` only matters under `rwlock`; `mutex` always locks exclusively.
    pub fn acquire_table(&self, mode: LockMode) -> Result<TableGuard<'_>, LockFault> {
        match &self.table {
            TableLock::Unsynchronized => Ok(TableGuard::Unlocked),
            TableLock::Exclusive(mutex) => mutex
                .lock()
                .map(TableGuard::Exclusive)
                .map_err(|_| LockFault::poisoned("table mutex")),
            TableLock::Striped(rwlock) => match mode {
                LockMode::Read => rwlock
                    .read()
                    .map(TableGuard::Read)
                    .map_err(|_| LockFault::poisoned("table rwlock")),
                LockMode::Write => rwlock
                    .write()
                    .map(TableGuard::Write)
                    .map_err(|_| LockFault::poisoned("table rwlock")),
            },
        }
    }

    pub fn release_table(&self, guard: TableGuard<'_>) {
        drop(guard);
    }

    /// Take the lock serializing remove-and-unlink sequences
    pub fn acquire_compound(&self) -> Result<CompoundGuard<'_>, LockFault> {
        match &self.compound {
            None => Ok(CompoundGuard(None)),
            Some(mutex) => mutex
                .lock()
                .map(|guard| CompoundGuard(Some(guard)))
                .map_err(|_| LockFault::poisoned("compound mutex")),
        }
    }

    pub fn release_compound(&self, guard: CompoundGuard<'_>) {
        drop(guard);
    }

    /// Tear the locks down
    ///
    /// Reports a fault if a holder panicked at any point.
    pub fn finalize(self) -> Result<(), LockFault> {
        let table_poisoned = match &self.table {
            TableLock::Unsynchronized => false,
            TableLock::Exclusive(mutex) => mutex.is_poisoned(),
            TableLock::Striped(rwlock) => rwlock.is_poisoned(),
        };
        if table_poisoned {
            return Err(LockFault::poisoned("table lock"));
        }

        if self.compound.as_ref().is_some_and(Mutex::is_poisoned) {
            return Err(LockFault::poisoned("compound mutex"));
        }

        tracing::debug!("Synchronizer for strategy {} finalized", self.strategy);
        Ok(())
    }
}

impl fmt::Debug for Synchronizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Synchronizer")
            .field("strategy", &self.strategy)
            .finish_non_exhaustive()
    }
}
