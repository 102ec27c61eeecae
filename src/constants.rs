//! Global constants for inodefs
//!
//! Defaults for the table geometry and the synthetic delay. Every value here
//! can be overridden through [`crate::config::TableConfig`].

/// Number of slots in the inode table
pub const TABLE_SIZE: usize = 50;

/// Number of entry slots owned by each directory
pub const MAX_DIR_ENTRIES: usize = 20;

/// Maximum length in bytes of an entry name or a printed path
pub const MAX_NAME_LEN: usize = 100;

/// Busy-loop cycles injected at the start of each table operation
///
/// Widens the race window so that differences between locking strategies
/// show up in benchmarks. Zero turns the delay off.
pub const DELAY_CYCLES: u64 = 5000;

/// Inumber of the root directory
pub const ROOT_INUMBER: usize = 0;

/// Path separator used by the filesystem layer and the tree printer
pub const PATH_SEPARATOR: char = '/';

/// Spin for `cycles` iterations without sleeping
///
/// A real sleep would hand the CPU to the scheduler and make timings depend on
/// it; a spin keeps the cost roughly constant across strategies.
#[inline]
pub fn insert_delay(cycles: u64) {
    for i in 0..cycles {
        std::hint::black_box(i);
    }
}
