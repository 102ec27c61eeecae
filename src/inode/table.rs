use std::io::Write;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::instrument;

use super::types::{Attributes, Inumber, NodeContent, NodeKind};
use crate::config::TableConfig;
use crate::constants::{insert_delay, PATH_SEPARATOR};
use crate::error::{FsError, FsResult, LockFault};

/// One table slot
///
/// `state` is `None` while the slot is free. It is only ever locked for the
/// duration of a single table call. `lock` is the node lock handed out by
/// the façade in [`super::lock`]; it lives as long as the table, whether the
/// slot is allocated or not.
pub(super) struct Slot {
    state: RwLock<Option<NodeContent>>,
    pub(super) lock: RwLock<()>,
}

impl Slot {
    fn new() -> Self {
        Self {
            state: RwLock::new(None),
            lock: RwLock::new(()),
        }
    }
}

/// Fixed-capacity inode table
///
/// None of these operations take strategy or node locks. Each call is
/// memory-safe on its own, but a sequence of calls is only atomic when the
/// caller holds the locks its strategy requires.
pub struct InodeTable {
    slots: Box<[Slot]>,
    max_dir_entries: usize,
    max_name_len: usize,
    delay_cycles: u64,
}

impl InodeTable {
    pub fn new(config: &TableConfig) -> Self {
        let slots = (0..config.table_size).map(|_| Slot::new()).collect();

        tracing::debug!(
            "Inode table initialized: {} slots, {} entries per directory",
            config.table_size,
            config.max_dir_entries
        );

        Self {
            slots,
            max_dir_entries: config.max_dir_entries,
            max_name_len: config.max_name_len,
            delay_cycles: config.delay_cycles,
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn max_dir_entries(&self) -> usize {
        self.max_dir_entries
    }

    pub fn max_name_len(&self) -> usize {
        self.max_name_len
    }

    pub(super) fn slot(&self, inumber: Inumber) -> FsResult<&Slot> {
        self.slots
            .get(inumber)
            .ok_or(FsError::InvalidInumber(inumber))
    }

    fn read_state(&self, inumber: Inumber) -> FsResult<RwLockReadGuard<'_, Option<NodeContent>>> {
        self.slot(inumber)?
            .state
            .read()
            .map_err(|_| LockFault::poisoned(format!("inode {} state", inumber)).into())
    }

    fn write_state(
        &self,
        inumber: Inumber,
    ) -> FsResult<RwLockWriteGuard<'_, Option<NodeContent>>> {
        self.slot(inumber)?
            .state
            .write()
            .map_err(|_| LockFault::poisoned(format!("inode {} state", inumber)).into())
    }

    /// Kind of an allocated node
    pub fn kind_of(&self, inumber: Inumber) -> FsResult<NodeKind> {
        self.read_state(inumber)?
            .as_ref()
            .map(NodeContent::kind)
            .ok_or(FsError::InvalidInumber(inumber))
    }

    pub fn is_allocated(&self, inumber: Inumber) -> FsResult<bool> {
        Ok(self.read_state(inumber)?.is_some())
    }

    /// Range and allocation check shared by every operation
    pub(super) fn validate(&self, inumber: Inumber) -> FsResult<()> {
        if self.is_allocated(inumber)? {
            Ok(())
        } else {
            Err(FsError::InvalidInumber(inumber))
        }
    }

    /// Reject names that `add_entry` would refuse
    pub fn validate_name(&self, name: &str) -> FsResult<()> {
        if name.is_empty() {
            return Err(FsError::EmptyName);
        }
        if name.len() > self.max_name_len {
            return Err(FsError::NameTooLong {
                len: name.len(),
                max: self.max_name_len,
            });
        }
        Ok(())
    }

    /// Claim the first free slot for a new node
    ///
    /// The free check and the claim are separate steps. Without the
    /// table-wide write lock two concurrent calls can claim the same slot.
    #[instrument(level = "trace", name = "inode_allocate", skip(self))]
    pub fn allocate(&self, kind: NodeKind) -> FsResult<Inumber> {
        insert_delay(self.delay_cycles);

        for inumber in 0..self.slots.len() {
            if self.read_state(inumber)?.is_none() {
                *self.write_state(inumber)? = Some(NodeContent::new(kind, self.max_dir_entries));
                tracing::trace!("Allocated {} at inode {}", kind, inumber);
                return Ok(inumber);
            }
        }

        tracing::debug!("Inode table full ({} slots)", self.slots.len());
        Err(FsError::TableFull)
    }

    /// Release a node and its entry storage
    ///
    /// Children are not touched; the caller unlinks and frees them first.
    #[instrument(level = "trace", name = "inode_free", skip(self))]
    pub fn free(&self, inumber: Inumber) -> FsResult<()> {
        insert_delay(self.delay_cycles);

        let mut state = self.write_state(inumber)?;
        if state.take().is_none() {
            tracing::debug!("inode_free: inode {} is not allocated", inumber);
            return Err(FsError::InvalidInumber(inumber));
        }

        Ok(())
    }

    /// Copy out the requested attributes of a node
    #[instrument(level = "trace", name = "inode_get", skip(self))]
    pub fn get_attributes(
        &self,
        inumber: Inumber,
        want_kind: bool,
        want_content: bool,
    ) -> FsResult<Attributes> {
        insert_delay(self.delay_cycles);

        let state = self.read_state(inumber)?;
        let content = state.as_ref().ok_or(FsError::InvalidInumber(inumber))?;

        Ok(Attributes {
            kind: want_kind.then(|| content.kind()),
            content: want_content.then(|| content.clone()),
        })
    }

    /// Link `child` into directory `parent` under `name`
    ///
    /// Names are not checked for uniqueness here.
    #[instrument(level = "trace", name = "dir_add_entry", skip(self))]
    pub fn add_entry(&self, parent: Inumber, child: Inumber, name: &str) -> FsResult<()> {
        insert_delay(self.delay_cycles);

        if self.kind_of(parent)? != NodeKind::Directory {
            return Err(FsError::NotADirectory(parent));
        }
        self.validate(child)?;
        self.validate_name(name)?;

        let mut state = self.write_state(parent)?;
        match state.as_mut() {
            Some(NodeContent::Directory(entries)) => {
                if entries.insert(child, name) {
                    Ok(())
                } else {
                    Err(FsError::DirectoryFull(parent))
                }
            }
            Some(NodeContent::File) => Err(FsError::NotADirectory(parent)),
            // Freed between the checks above and taking the state lock
            None => Err(FsError::InvalidInumber(parent)),
        }
    }

    /// Clear the entry for `child` in directory `parent`
    #[instrument(level = "trace", name = "dir_reset_entry", skip(self))]
    pub fn remove_entry(&self, parent: Inumber, child: Inumber) -> FsResult<()> {
        insert_delay(self.delay_cycles);

        if self.kind_of(parent)? != NodeKind::Directory {
            return Err(FsError::NotADirectory(parent));
        }
        self.validate(child)?;

        let mut state = self.write_state(parent)?;
        match state.as_mut() {
            Some(NodeContent::Directory(entries)) => {
                if entries.remove(child) {
                    Ok(())
                } else {
                    Err(FsError::EntryNotFound { parent, child })
                }
            }
            Some(NodeContent::File) => Err(FsError::NotADirectory(parent)),
            None => Err(FsError::InvalidInumber(parent)),
        }
    }

    /// Inumber of the entry called `name` in directory `parent`
    pub fn find_entry(&self, parent: Inumber, name: &str) -> FsResult<Option<Inumber>> {
        let state = self.read_state(parent)?;
        match state.as_ref() {
            Some(NodeContent::Directory(entries)) => Ok(entries.find(name).map(|e| e.inumber)),
            Some(NodeContent::File) => Err(FsError::NotADirectory(parent)),
            None => Err(FsError::InvalidInumber(parent)),
        }
    }

    /// Inumbers of every allocated slot, ascending
    pub fn allocated_inumbers(&self) -> FsResult<Vec<Inumber>> {
        let mut allocated = Vec::new();
        for inumber in 0..self.slots.len() {
            if self.read_state(inumber)?.is_some() {
                allocated.push(inumber);
            }
        }
        Ok(allocated)
    }

    /// Write one line per node of the subtree rooted at `inumber`
    ///
    /// Depth-first in entry-slot order. An empty `label` is not printed, so
    /// printing the root with `""` yields `/a`, `/a/b`, ... Free slots print
    /// nothing. No locks are taken: concurrent edits give a best-effort view.
    #[instrument(level = "trace", name = "inode_print_tree", skip(self, out))]
    pub fn print_tree<W: Write>(&self, out: &mut W, inumber: Inumber, label: &str) -> FsResult<()> {
        self.print_subtree(out, inumber, label, 0)
    }

    fn print_subtree<W: Write>(
        &self,
        out: &mut W,
        inumber: Inumber,
        label: &str,
        depth: usize,
    ) -> FsResult<()> {
        // A directory linked into its own subtree would recurse forever.
        if depth > self.slots.len() {
            tracing::warn!("print_tree: cycle detected at inode {}", inumber);
            return Ok(());
        }

        let children: Vec<(Inumber, String)> = {
            let state = self.read_state(inumber)?;
            match state.as_ref() {
                None => return Ok(()),
                Some(content) => {
                    if !label.is_empty() {
                        writeln!(out, "{}", label)?;
                    }
                    match content {
                        NodeContent::File => return Ok(()),
                        NodeContent::Directory(entries) => entries
                            .iter()
                            .map(|entry| (entry.inumber, entry.name.clone()))
                            .collect(),
                    }
                }
            }
        };

        for (child, name) in children {
            let path = self.child_label(label, &name);
            self.print_subtree(out, child, &path, depth + 1)?;
        }

        Ok(())
    }

    /// Longest printed path, in bytes
    ///
    /// One less than `max_name_len`: the limit counts a terminator slot, as a
    /// fixed path buffer of that size would.
    pub fn max_path_len(&self) -> usize {
        self.max_name_len.saturating_sub(1)
    }

    fn child_label(&self, label: &str, name: &str) -> String {
        let mut path = format!("{}{}{}", label, PATH_SEPARATOR, name);
        let max = self.max_path_len();
        if path.len() > max {
            tracing::warn!(
                "Truncation when building full path: {} bytes exceeds {}",
                path.len(),
                max
            );
            let mut end = max;
            while !path.is_char_boundary(end) {
                end -= 1;
            }
            path.truncate(end);
        }
        path
    }

    /// Tear the table down
    pub fn destroy(self) -> FsResult<()> {
        for (inumber, slot) in self.slots.iter().enumerate() {
            if slot.lock.is_poisoned() {
                return Err(LockFault::poisoned(format!("inode {} lock", inumber)).into());
            }
        }
        tracing::debug!("Inode table destroyed");
        Ok(())
    }
}
