use std::fmt;

/// Index of a slot in the inode table
pub type Inumber = usize;

/// Kind of an allocated node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    File,
    Directory,
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeKind::File => f.write_str("file"),
            NodeKind::Directory => f.write_str("directory"),
        }
    }
}

/// Directory entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub inumber: Inumber,
    pub name: String,
}

/// Fixed-capacity directory entry array
///
/// `None` is the free slot; slots are reused first-fit and are not kept in
/// any order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntries {
    slots: Box<[Option<DirEntry>]>,
}

impl DirEntries {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: vec![None; capacity].into_boxed_slice(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Number of occupied slots
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.iter().all(Option::is_none)
    }

    pub fn is_full(&self) -> bool {
        self.slots.iter().all(Option::is_some)
    }

    /// Occupied entries in slot order
    pub fn iter(&self) -> impl Iterator<Item = &DirEntry> {
        self.slots.iter().flatten()
    }

    pub fn find(&self, name: &str) -> Option<&DirEntry> {
        self.iter().find(|entry| entry.name == name)
    }

    /// Write into the first free slot; `false` if there is none
    pub fn insert(&mut self, inumber: Inumber, name: &str) -> bool {
        match self.slots.iter_mut().find(|slot| slot.is_none()) {
            Some(slot) => {
                *slot = Some(DirEntry {
                    inumber,
                    name: name.to_string(),
                });
                true
            }
            None => false,
        }
    }

    /// Clear the first slot pointing at `inumber`; `false` if none does
    pub fn remove(&mut self, inumber: Inumber) -> bool {
        match self
            .slots
            .iter_mut()
            .find(|slot| matches!(slot, Some(entry) if entry.inumber == inumber))
        {
            Some(slot) => {
                *slot = None;
                true
            }
            None => false,
        }
    }
}

/// Payload of an allocated node
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeContent {
    /// Files carry no data
    File,
    Directory(DirEntries),
}

impl NodeContent {
    pub fn new(kind: NodeKind, max_dir_entries: usize) -> Self {
        match kind {
            NodeKind::File => NodeContent::File,
            NodeKind::Directory => NodeContent::Directory(DirEntries::with_capacity(max_dir_entries)),
        }
    }

    pub fn kind(&self) -> NodeKind {
        match self {
            NodeContent::File => NodeKind::File,
            NodeContent::Directory(_) => NodeKind::Directory,
        }
    }

    pub fn entries(&self) -> Option<&DirEntries> {
        match self {
            NodeContent::File => None,
            NodeContent::Directory(entries) => Some(entries),
        }
    }
}

/// Copied-out node attributes
///
/// Only the fields asked for are filled in.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Attributes {
    pub kind: Option<NodeKind>,
    pub content: Option<NodeContent>,
}
