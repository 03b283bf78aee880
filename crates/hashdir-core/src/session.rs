use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanStatus {
    Running,
    Completed,
    Cancelled,
    Failed,
}

impl ScanStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScanStatus::Running => "running",
            ScanStatus::Completed => "completed",
            ScanStatus::Cancelled => "cancelled",
            ScanStatus::Failed => "failed",
        }
    }
}

/// Live counters for one scan. Workers and the reconciler update these
/// concurrently.
#[derive(Debug, Default)]
pub struct ScanCounters {
    inserted: AtomicU64,
    updated: AtomicU64,
    reused: AtomicU64,
    ignored: AtomicU64,
    skipped: AtomicU64,
    errored: AtomicU64,
    hashed: AtomicU64,
    hashed_bytes: AtomicU64,
}

impl ScanCounters {
    pub fn inc_inserted(&self) {
        self.inserted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_updated(&self) {
        self.updated.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_reused(&self) {
        self.reused.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_ignored(&self) {
        self.ignored.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_skipped(&self) {
        self.skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_errored(&self) {
        self.errored.fetch_add(1, Ordering::Relaxed);
    }

    /// Counts one call into the hasher, successful or not.
    pub fn inc_hashed(&self) {
        self.hashed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_hashed_bytes(&self, bytes: u64) {
        self.hashed_bytes.fetch_add(bytes, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> ScanCounts {
        ScanCounts {
            inserted: self.inserted.load(Ordering::Relaxed),
            updated: self.updated.load(Ordering::Relaxed),
            reused: self.reused.load(Ordering::Relaxed),
            ignored: self.ignored.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            errored: self.errored.load(Ordering::Relaxed),
            hashed: self.hashed.load(Ordering::Relaxed),
            hashed_bytes: self.hashed_bytes.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ScanCounts {
    pub inserted: u64,
    pub updated: u64,
    pub reused: u64,
    pub ignored: u64,
    pub skipped: u64,
    pub errored: u64,
    pub hashed: u64,
    pub hashed_bytes: u64,
}

impl ScanCounts {
    /// Files whose record was written or confirmed by this scan.
    pub fn processed(&self) -> u64 {
        self.inserted + self.updated + self.reused
    }

    /// Every file result the reconciler has seen.
    pub fn seen(&self) -> u64 {
        self.processed() + self.skipped + self.errored
    }
}

/// State owned by a single scan. Each scan gets its own instance.
#[derive(Debug)]
pub struct ScanSession {
    pub id: i64,
    pub root: PathBuf,
    pub counters: ScanCounters,
    started: Instant,
}

impl ScanSession {
    pub fn new(id: i64, root: &Path) -> Self {
        Self {
            id,
            root: root.to_path_buf(),
            counters: ScanCounters::default(),
            started: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    pub fn summarize(&self, status: ScanStatus) -> ScanSummary {
        ScanSummary {
            scan_id: self.id,
            root: self.root.clone(),
            status,
            duration: self.elapsed(),
            counts: self.counters.snapshot(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ScanSummary {
    pub scan_id: i64,
    pub root: PathBuf,
    pub status: ScanStatus,
    pub duration: Duration,
    pub counts: ScanCounts,
}
