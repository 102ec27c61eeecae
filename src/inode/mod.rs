// Inode table and per-node lock façade
pub mod lock;
pub mod table;
pub mod types;

pub use lock::{LockOutcome, NodeGuard, NodeLockMode};
pub use table::InodeTable;
pub use types::{Attributes, DirEntries, DirEntry, Inumber, NodeContent, NodeKind};
