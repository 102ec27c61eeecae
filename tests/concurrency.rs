//! Concurrency tests for the inode table and the filesystem layer
//!
//! These exercise the guarantees each locking strategy is supposed to give:
//! - `rwlock`: concurrent allocations never hand out the same slot
//! - `mutex`: a concurrent run is equivalent to replaying its lock order
//! - compound create/delete under both strategies leave a consistent tree

use std::collections::BTreeSet;
use std::sync::{Barrier, Mutex};
use std::thread;

use inodefs::config::{FsConfig, TableConfig};
use inodefs::inode::{InodeTable, Inumber, NodeKind};
use inodefs::sync::{LockMode, Strategy, Synchronizer};
use inodefs::{FileSystem, FsError};

fn table_config(table_size: usize, delay_cycles: u64) -> TableConfig {
    TableConfig {
        table_size,
        max_dir_entries: 32,
        max_name_len: 64,
        delay_cycles,
    }
}

fn fs_with(strategy: Strategy, table_size: usize) -> FileSystem {
    let mut config = FsConfig::with_strategy(strategy);
    config.table = table_config(table_size, 200);
    config.sync.enable_stats = true;
    FileSystem::new(&config).unwrap()
}

fn tree_lines(fs: &FileSystem) -> BTreeSet<String> {
    let mut out = Vec::new();
    fs.print_tree(&mut out).unwrap();
    String::from_utf8(out)
        .unwrap()
        .lines()
        .map(str::to_string)
        .collect()
}

// ============================================================================
// Table-level tests
// ============================================================================

#[test]
fn test_striped_concurrent_allocations_are_distinct() {
    let table = InodeTable::new(&table_config(16, 1000));
    let sync = Synchronizer::new(Strategy::Striped);
    let barrier = Barrier::new(2);

    let (a, b) = thread::scope(|scope| {
        let alloc = || {
            barrier.wait();
            let guard = sync.acquire_table(LockMode::Write).unwrap();
            let inumber = table.allocate(NodeKind::File).unwrap();
            sync.release_table(guard);
            inumber
        };
        let first = scope.spawn(alloc);
        let second = scope.spawn(alloc);
        (first.join().unwrap(), second.join().unwrap())
    });

    assert_ne!(a, b);
    let allocated = table.allocated_inumbers().unwrap();
    assert_eq!(allocated.len(), 2);
    assert!(allocated.contains(&a) && allocated.contains(&b));
}

#[test]
fn test_striped_many_allocations_fill_table_exactly() {
    const THREADS: usize = 8;
    const PER_THREAD: usize = 8;

    let table = InodeTable::new(&table_config(THREADS * PER_THREAD, 100));
    let sync = Synchronizer::new(Strategy::Striped);

    let all: Vec<Inumber> = thread::scope(|scope| {
        let handles: Vec<_> = (0..THREADS)
            .map(|_| {
                scope.spawn(|| {
                    (0..PER_THREAD)
                        .map(|_| {
                            let _guard = sync.acquire_table(LockMode::Write).unwrap();
                            table.allocate(NodeKind::File).unwrap()
                        })
                        .collect::<Vec<_>>()
                })
            })
            .collect();
        handles
            .into_iter()
            .flat_map(|handle| handle.join().unwrap())
            .collect()
    });

    let unique: BTreeSet<_> = all.iter().copied().collect();
    assert_eq!(unique.len(), THREADS * PER_THREAD);

    let guard = sync.acquire_table(LockMode::Write).unwrap();
    assert!(matches!(table.allocate(NodeKind::File), Err(FsError::TableFull)));
    drop(guard);
}

#[derive(Debug, Clone, Copy)]
enum Event {
    Alloc(Inumber),
    Free(Inumber),
}

#[test]
fn test_exclusive_matches_serial_replay() {
    const THREADS: usize = 4;
    const ITERATIONS: usize = 24;

    let table = InodeTable::new(&table_config(64, 50));
    let sync = Synchronizer::new(Strategy::Exclusive);
    let log = Mutex::new(Vec::new());

    thread::scope(|scope| {
        for _ in 0..THREADS {
            scope.spawn(|| {
                let mut owned = Vec::new();
                for i in 0..ITERATIONS {
                    let _guard = sync.acquire_table(LockMode::Write).unwrap();
                    // Events are logged while the mutex is held, so the log
                    // order is the order in which the table saw them.
                    if i % 3 == 2 {
                        let victim = owned.remove(0);
                        table.free(victim).unwrap();
                        log.lock().unwrap().push(Event::Free(victim));
                    } else {
                        let inumber = table.allocate(NodeKind::File).unwrap();
                        owned.push(inumber);
                        log.lock().unwrap().push(Event::Alloc(inumber));
                    }
                }
            });
        }
    });

    let replay = InodeTable::new(&table_config(64, 0));
    for event in log.into_inner().unwrap() {
        match event {
            Event::Alloc(expected) => {
                assert_eq!(replay.allocate(NodeKind::File).unwrap(), expected)
            }
            Event::Free(inumber) => replay.free(inumber).unwrap(),
        }
    }

    assert_eq!(
        table.allocated_inumbers().unwrap(),
        replay.allocated_inumbers().unwrap()
    );
    assert_eq!(
        table.allocated_inumbers().unwrap().len(),
        THREADS * (ITERATIONS - 2 * (ITERATIONS / 3))
    );
}

// ============================================================================
// Filesystem-level tests
// ============================================================================

#[test]
fn test_concurrent_create_delete_keeps_tree_consistent() {
    const THREADS: usize = 4;
    const FILES: usize = 6;

    for strategy in [Strategy::Exclusive, Strategy::Striped] {
        let fs = fs_with(strategy, 64);

        thread::scope(|scope| {
            for t in 0..THREADS {
                let fs = &fs;
                scope.spawn(move || {
                    let dir = format!("/t{}", t);
                    fs.create(&dir, NodeKind::Directory).unwrap();
                    for f in 0..FILES {
                        fs.create(&format!("{}/f{}", dir, f), NodeKind::File).unwrap();
                    }
                    // Drop the odd-numbered files again
                    for f in (1..FILES).step_by(2) {
                        fs.delete(&format!("{}/f{}", dir, f)).unwrap();
                    }
                    fs.lookup(&format!("{}/f0", dir)).unwrap();
                });
            }
        });

        let mut expected = BTreeSet::new();
        for t in 0..THREADS {
            expected.insert(format!("/t{}", t));
            for f in (0..FILES).step_by(2) {
                expected.insert(format!("/t{}/f{}", t, f));
            }
        }

        assert_eq!(tree_lines(&fs), expected, "strategy {}", strategy);
        assert_eq!(
            fs.table().allocated_inumbers().unwrap().len(),
            expected.len() + 1,
            "strategy {}",
            strategy
        );
    }
}

#[test]
fn test_racing_creates_of_same_name() {
    for strategy in [Strategy::Exclusive, Strategy::Striped] {
        let fs = fs_with(strategy, 32);
        let barrier = Barrier::new(4);

        let results: Vec<_> = thread::scope(|scope| {
            let handles: Vec<_> = (0..4)
                .map(|_| {
                    scope.spawn(|| {
                        barrier.wait();
                        fs.create("/shared", NodeKind::File)
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        let created = results.iter().filter(|r| r.is_ok()).count();
        let existing = results
            .iter()
            .filter(|r| matches!(r, Err(FsError::AlreadyExists(_))))
            .count();
        assert_eq!(created, 1, "strategy {}", strategy);
        assert_eq!(existing, 3, "strategy {}", strategy);
        assert_eq!(fs.table().allocated_inumbers().unwrap().len(), 2);
    }
}

#[test]
fn test_racing_deletes_of_same_name() {
    for strategy in [Strategy::Exclusive, Strategy::Striped] {
        let fs = fs_with(strategy, 32);
        fs.create("/victim", NodeKind::File).unwrap();
        let barrier = Barrier::new(4);

        let deleted = thread::scope(|scope| {
            let handles: Vec<_> = (0..4)
                .map(|_| {
                    scope.spawn(|| {
                        barrier.wait();
                        fs.delete("/victim")
                    })
                })
                .collect();
            handles
                .into_iter()
                .map(|h| h.join().unwrap())
                .filter(Result::is_ok)
                .count()
        });

        assert_eq!(deleted, 1, "strategy {}", strategy);
        assert_eq!(fs.table().allocated_inumbers().unwrap(), vec![0]);
    }
}

#[test]
fn test_striped_readers_and_writers_make_progress() {
    let fs = fs_with(Strategy::Striped, 64);
    fs.create("/data", NodeKind::Directory).unwrap();

    thread::scope(|scope| {
        scope.spawn(|| {
            for i in 0..20 {
                let path = format!("/data/n{}", i);
                fs.create(&path, NodeKind::File).unwrap();
                fs.delete(&path).unwrap();
            }
        });
        for _ in 0..3 {
            scope.spawn(|| {
                for _ in 0..20 {
                    fs.lookup("/data").unwrap();
                    let mut out = Vec::new();
                    fs.print_tree(&mut out).unwrap();
                }
            });
        }
    });

    let stats = fs.stats();
    assert_eq!(stats.create.ok, 21);
    assert_eq!(stats.delete.ok, 20);
    assert_eq!(stats.lookup.ok, 60);
    assert_eq!(tree_lines(&fs), BTreeSet::from(["/data".to_string()]));
}
