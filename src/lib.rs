//! inodefs - An in-memory inode table for benchmarking locking strategies
//!
//! inodefs simulates a small hierarchical filesystem entirely in memory so
//! that the same create/delete/lookup/print workload can be run under
//! different concurrency-control strategies and compared. It features:
//!
//! - **Fixed-capacity inode table**: a fixed array of file and directory
//!   nodes, first-fit allocation, recycled inumbers
//! - **Pluggable synchronization**: no locking, a single global mutex, or a
//!   global rwlock plus one rwlock per node
//! - **Node lock façade**: blocking and non-blocking per-node locks for
//!   multi-step operations
//! - **Lock faults as values**: a poisoned lock is reported as
//!   [`error::LockFault`]; the library never aborts the process
//!
//! # Architecture
//!
//! - **Synchronization** ([`sync`]): the [`sync::Synchronizer`] handle built
//!   from a [`sync::Strategy`]
//! - **Inode table** ([`inode`]): node storage, directory entries, tree
//!   printing and the per-node lock façade
//! - **Filesystem** ([`fs`]): path-level compound operations that combine
//!   the two under the selected strategy
//! - **Configuration** ([`config`]), **logging** ([`logging`]) and
//!   **statistics** ([`stats`])
//!
//! # Example
//!
//! ```rust
//! use inodefs::fs::FileSystem;
//! use inodefs::inode::NodeKind;
//! use inodefs::sync::Strategy;
//!
//! # fn main() -> Result<(), inodefs::error::FsError> {
//! let fs = FileSystem::with_strategy(Strategy::Striped)?;
//! fs.create("/docs", NodeKind::Directory)?;
//! fs.create("/docs/readme", NodeKind::File)?;
//!
//! let mut out = Vec::new();
//! fs.print_tree(&mut out)?;
//! assert_eq!(String::from_utf8_lossy(&out), "/docs\n/docs/readme\n");
//!
//! fs.delete("/docs/readme")?;
//! fs.shutdown()?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod constants;
pub mod error;
pub mod fs;
pub mod inode;
pub mod logging;
pub mod stats;
pub mod sync;

pub use error::{FsError, FsResult, LockFault};
pub use fs::FileSystem;
