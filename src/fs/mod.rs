//! Path-level filesystem operations
//!
//! [`FileSystem`] is the caller the inode table and the synchronizer are
//! built for: every operation here is a compound of several table calls,
//! bracketed by whatever locks the configured strategy asks for.
//!
//! - `mutex`: the single table mutex is held for the whole operation; no
//!   node locks are taken.
//! - `rwlock`: the path is walked from the root with a read lock on every
//!   ancestor and a read or write lock on the target; the table-wide rwlock
//!   is taken in write mode only around `allocate` and `free`, and in read
//!   mode by `print_tree`.
//! - `nosync`: nothing is locked. Each table call stays memory-safe but
//!   compound operations can interleave arbitrarily.
//!
//! Lock order, outermost first: compound lock, table mutex, node locks from
//! root to leaf, table rwlock. Every operation follows it, so none can
//! deadlock against another.

pub mod path;

use std::io::Write;

use tracing::instrument;

use crate::config::FsConfig;
use crate::constants::ROOT_INUMBER;
use crate::error::{FsError, FsResult};
use crate::inode::{InodeTable, Inumber, LockOutcome, NodeContent, NodeGuard, NodeKind, NodeLockMode};
use crate::stats::{Op, OpStats, StatsSnapshot};
use crate::sync::{LockMode, Strategy, Synchronizer, TableGuard};

/// In-memory filesystem shared by all workers
pub struct FileSystem {
    table: InodeTable,
    sync: Synchronizer,
    stats: OpStats,
}

impl FileSystem {
    /// Build the table and the synchronizer, then create the root directory
    pub fn new(config: &FsConfig) -> FsResult<Self> {
        let fs = Self {
            table: InodeTable::new(&config.table),
            sync: Synchronizer::new(config.sync.strategy()),
            stats: OpStats::new(config.sync.enable_stats),
        };

        let root = {
            let _table = fs.sync.acquire_table(LockMode::Write)?;
            fs.table.allocate(NodeKind::Directory)?
        };
        debug_assert_eq!(root, ROOT_INUMBER);

        tracing::info!(
            "Filesystem ready: strategy={}, {} inodes",
            fs.sync.strategy(),
            fs.table.capacity()
        );

        Ok(fs)
    }

    /// Default geometry with the given strategy
    pub fn with_strategy(strategy: Strategy) -> FsResult<Self> {
        Self::new(&FsConfig::with_strategy(strategy))
    }

    pub fn strategy(&self) -> Strategy {
        self.sync.strategy()
    }

    pub fn table(&self) -> &InodeTable {
        &self.table
    }

    pub fn synchronizer(&self) -> &Synchronizer {
        &self.sync
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Create a file or directory at `path`
    ///
    /// The parent must exist and be a directory, and must not already hold
    /// an entry with the same name.
    #[instrument(level = "debug", name = "fs_create", skip(self), fields(strategy = %self.sync.strategy()))]
    pub fn create(&self, path: &str, kind: NodeKind) -> FsResult<Inumber> {
        let result = self.create_locked(path, kind);
        self.stats.record(Op::Create, result.is_ok());
        match &result {
            Ok(inumber) => tracing::debug!("Created {} {} at inode {}", kind, path, inumber),
            Err(err) => tracing::debug!("Could not create {}: {}", path, err),
        }
        result
    }

    fn create_locked(&self, path: &str, kind: NodeKind) -> FsResult<Inumber> {
        let (parent_components, name) = path::split_parent(path)?;
        self.table.validate_name(name)?;

        let _serial = self.serialize()?;
        let mut held = Vec::new();
        let parent = self.walk(path, &parent_components, NodeLockMode::Write, &mut held)?;

        if self.table.kind_of(parent)? != NodeKind::Directory {
            return Err(FsError::NotADirectory(parent));
        }
        if self.table.find_entry(parent, name)?.is_some() {
            return Err(FsError::AlreadyExists(path.to_string()));
        }

        let child = {
            let _table = self.structural()?;
            self.table.allocate(kind)?
        };

        if let Err(err) = self.table.add_entry(parent, child, name) {
            // Give the slot back so a failed link does not leak it
            let _table = self.structural()?;
            self.table.free(child)?;
            return Err(err);
        }

        Ok(child)
    }

    /// Remove the node at `path`
    ///
    /// Directories must be empty. Runs under the compound lock so that two
    /// removals never interleave their unlink and free steps.
    #[instrument(level = "debug", name = "fs_delete", skip(self), fields(strategy = %self.sync.strategy()))]
    pub fn delete(&self, path: &str) -> FsResult<()> {
        let result = self.delete_locked(path);
        self.stats.record(Op::Delete, result.is_ok());
        match &result {
            Ok(()) => tracing::debug!("Deleted {}", path),
            Err(err) => tracing::debug!("Could not delete {}: {}", path, err),
        }
        result
    }

    fn delete_locked(&self, path: &str) -> FsResult<()> {
        let (parent_components, name) = path::split_parent(path)?;

        loop {
            let _compound = self.sync.acquire_compound()?;
            let _serial = self.serialize()?;
            let mut held = Vec::new();
            let parent = self.walk(path, &parent_components, NodeLockMode::Write, &mut held)?;

            let child = match self.table.find_entry(parent, name) {
                Ok(Some(child)) => child,
                Ok(None) | Err(FsError::NotADirectory(_)) => {
                    return Err(FsError::NotFound(path.to_string()))
                }
                Err(err) => return Err(err),
            };

            if self.sync.strategy().uses_node_locks() {
                match self.table.lock_node(child, NodeLockMode::TryWrite)? {
                    LockOutcome::Acquired(guard) => held.push(guard),
                    LockOutcome::WouldBlock => {
                        tracing::trace!("Inode {} busy, retrying delete of {}", child, path);
                        self.stats.record_retry();
                        drop(held);
                        std::thread::yield_now();
                        continue;
                    }
                }
            }

            let attrs = self.table.get_attributes(child, false, true)?;
            if let Some(NodeContent::Directory(entries)) = &attrs.content {
                if !entries.is_empty() {
                    return Err(FsError::DirectoryNotEmpty(path.to_string()));
                }
            }

            self.table.remove_entry(parent, child)?;
            {
                let _table = self.structural()?;
                self.table.free(child)?;
            }

            return Ok(());
        }
    }

    /// Resolve `path` to an inumber
    #[instrument(level = "debug", name = "fs_lookup", skip(self), fields(strategy = %self.sync.strategy()))]
    pub fn lookup(&self, path: &str) -> FsResult<Inumber> {
        let result = self.lookup_locked(path);
        self.stats.record(Op::Lookup, result.is_ok());
        result
    }

    fn lookup_locked(&self, path: &str) -> FsResult<Inumber> {
        let components = path::components(path);
        let _serial = self.serialize()?;
        let mut held = Vec::new();
        self.walk(path, &components, NodeLockMode::Read, &mut held)
    }

    /// Write the whole tree, one path per line, depth-first
    ///
    /// Under `rwlock` this holds the table lock in read mode: allocations and
    /// frees wait, but entry edits on individual directories may still show
    /// up half way through the traversal.
    #[instrument(level = "debug", name = "fs_print_tree", skip(self, out), fields(strategy = %self.sync.strategy()))]
    pub fn print_tree<W: Write>(&self, out: &mut W) -> FsResult<()> {
        let result = self.print_locked(out);
        self.stats.record(Op::Print, result.is_ok());
        result
    }

    fn print_locked<W: Write>(&self, out: &mut W) -> FsResult<()> {
        let _table = self.sync.acquire_table(LockMode::Read)?;
        self.table.print_tree(out, ROOT_INUMBER, "")?;
        out.flush()?;
        Ok(())
    }

    /// Tear down the table and the locks
    pub fn shutdown(self) -> FsResult<()> {
        let snapshot = self.stats.snapshot();
        if self.stats.is_enabled() {
            tracing::info!("Operation counts: {:?}", snapshot);
        }
        self.table.destroy()?;
        self.sync.finalize()?;
        Ok(())
    }

    /// Whole-operation lock: the table mutex under `mutex`, nothing otherwise
    fn serialize(&self) -> FsResult<TableGuard<'_>> {
        match self.sync.strategy() {
            Strategy::Exclusive => Ok(self.sync.acquire_table(LockMode::Write)?),
            Strategy::None | Strategy::Striped => Ok(TableGuard::Unlocked),
        }
    }

    /// Lock around allocate/free: the table rwlock under `rwlock`, nothing
    /// otherwise (`mutex` already holds it through [`Self::serialize`])
    fn structural(&self) -> FsResult<TableGuard<'_>> {
        match self.sync.strategy() {
            Strategy::Striped => Ok(self.sync.acquire_table(LockMode::Write)?),
            Strategy::None | Strategy::Exclusive => Ok(TableGuard::Unlocked),
        }
    }

    /// Follow `components` from the root
    ///
    /// Under `rwlock` every node passed through is read-locked and the final
    /// node is locked in `last`; the guards are pushed onto `held` and stay
    /// there until the caller drops them.
    fn walk<'a>(
        &'a self,
        path: &str,
        components: &[&str],
        last: NodeLockMode,
        held: &mut Vec<NodeGuard<'a>>,
    ) -> FsResult<Inumber> {
        let node_locks = self.sync.strategy().uses_node_locks();
        let mut current = ROOT_INUMBER;

        for depth in 0..=components.len() {
            let is_last = depth == components.len();

            if node_locks {
                let guard = if is_last && last == NodeLockMode::Write {
                    self.table.write_node(current)?
                } else {
                    self.table.read_node(current)?
                };
                held.push(guard);
            }

            if is_last {
                break;
            }

            current = match self.table.find_entry(current, components[depth]) {
                Ok(Some(child)) => child,
                Ok(None) | Err(FsError::NotADirectory(_)) => {
                    return Err(FsError::NotFound(path.to_string()))
                }
                Err(err) => return Err(err),
            };
        }

        Ok(current)
    }
}

impl std::fmt::Debug for FileSystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileSystem")
            .field("strategy", &self.sync.strategy())
            .field("capacity", &self.table.capacity())
            .finish_non_exhaustive()
    }
}
