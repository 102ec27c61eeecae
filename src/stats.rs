//! Per-operation counters
//!
//! Counting is gated by a flag so that benchmarks that do not need the
//! numbers skip the atomic traffic.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// Filesystem-level operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Create,
    Delete,
    Lookup,
    Print,
}

#[derive(Debug, Default)]
struct Counter {
    ok: AtomicU64,
    failed: AtomicU64,
}

impl Counter {
    fn record(&self, ok: bool) {
        let target = if ok { &self.ok } else { &self.failed };
        target.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> OpCount {
        OpCount {
            ok: self.ok.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }
}

/// Counters for one operation kind
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OpCount {
    pub ok: u64,
    pub failed: u64,
}

impl OpCount {
    pub fn total(&self) -> u64 {
        self.ok + self.failed
    }
}

/// Point-in-time copy of [`OpStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub create: OpCount,
    pub delete: OpCount,
    pub lookup: OpCount,
    pub print: OpCount,
    /// Times a removal backed off because the target node was busy
    pub lock_retries: u64,
}

impl StatsSnapshot {
    pub fn total_ops(&self) -> u64 {
        self.create.total() + self.delete.total() + self.lookup.total() + self.print.total()
    }
}

#[derive(Debug, Default)]
pub struct OpStats {
    enabled: AtomicBool,
    create: Counter,
    delete: Counter,
    lookup: Counter,
    print: Counter,
    lock_retries: AtomicU64,
}

impl OpStats {
    pub fn new(enabled: bool) -> Self {
        let stats = Self::default();
        stats.set_enabled(enabled);
        stats
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::SeqCst);
    }

    #[inline]
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    pub fn record(&self, op: Op, ok: bool) {
        if !self.is_enabled() {
            return;
        }
        let counter = match op {
            Op::Create => &self.create,
            Op::Delete => &self.delete,
            Op::Lookup => &self.lookup,
            Op::Print => &self.print,
        };
        counter.record(ok);
    }

    pub fn record_retry(&self) {
        if self.is_enabled() {
            self.lock_retries.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            create: self.create.snapshot(),
            delete: self.delete.snapshot(),
            lookup: self.lookup.snapshot(),
            print: self.print.snapshot(),
            lock_retries: self.lock_retries.load(Ordering::Relaxed),
        }
    }
}
