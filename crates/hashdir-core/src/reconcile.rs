use crate::error::Error;
use crate::progress::ProgressReporter;
use crate::scanner::FileOutcome;
use crate::session::ScanSession;
use crate::storage::{Database, FileRecord, Fingerprint};
use rayon::prelude::*;
use serde::Serialize;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;
use tracing::{debug, info, trace, warn};

/// What to do with a path, given its stored fingerprint and what is on disk now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Insert,
    Update,
    Reuse,
}

/// Size and mtime are the change signal. A rewrite that preserves both is not
/// detected.
pub fn classify(prior: Option<&Fingerprint>, size_bytes: u64, modified_at: i64) -> Decision {
    match prior {
        None => Decision::Insert,
        Some(fp) if fp.size_bytes as u64 == size_bytes && fp.modified_at == modified_at => {
            Decision::Reuse
        }
        Some(_) => Decision::Update,
    }
}

/// Single writer that folds dispatcher outcomes into the store.
///
/// Writes are buffered and committed once `batch_size` are pending; each batch
/// is one transaction, so an interrupted scan leaves whole records only.
pub struct Reconciler<'a> {
    db: &'a Database,
    session: &'a ScanSession,
    batch_size: usize,
    pending_records: Vec<FileRecord>,
    pending_touches: Vec<String>,
}

impl<'a> Reconciler<'a> {
    pub fn new(db: &'a Database, session: &'a ScanSession, batch_size: usize) -> Self {
        let batch_size = batch_size.max(1);
        Self {
            db,
            session,
            batch_size,
            pending_records: Vec::with_capacity(batch_size),
            pending_touches: Vec::with_capacity(batch_size),
        }
    }

    pub fn apply(&mut self, outcome: FileOutcome) -> Result<(), Error> {
        let counters = &self.session.counters;
        match outcome {
            FileOutcome::Hashed { record, decision } => {
                match decision {
                    Decision::Insert => counters.inc_inserted(),
                    Decision::Update | Decision::Reuse => counters.inc_updated(),
                }
                trace!("{:?} {}", decision, record.path);
                self.pending_records.push(record);
            }
            FileOutcome::Unchanged { path } => {
                counters.inc_reused();
                self.pending_touches.push(path);
            }
            FileOutcome::Skipped { path, reason } => {
                counters.inc_skipped();
                debug!("Skipped {}: {}", path, reason);
            }
            FileOutcome::Failed { path, error } => {
                counters.inc_errored();
                warn!("Error hashing {}: {}", path, error);
            }
        }

        if self.pending_records.len() + self.pending_touches.len() >= self.batch_size {
            self.flush()?;
        }
        Ok(())
    }

    pub fn flush(&mut self) -> Result<usize, Error> {
        if self.pending_records.is_empty() && self.pending_touches.is_empty() {
            return Ok(0);
        }
        let written =
            self.db
                .write_batch(&self.pending_records, &self.pending_touches, self.session.id)?;
        self.pending_records.clear();
        self.pending_touches.clear();
        Ok(written)
    }

    /// Commits whatever is still buffered.
    pub fn finish(mut self) -> Result<usize, Error> {
        self.flush()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PruneSummary {
    pub checked: usize,
    pub removed: usize,
    /// Paths whose existence could not be determined; their records are kept.
    pub unverified: usize,
}

/// Removes every record whose path no longer exists on disk.
///
/// Existence is checked at prune time for every stored path, independent of
/// `last_seen_scan_id`.
pub fn prune(db: &Database, reporter: &dyn ProgressReporter) -> Result<PruneSummary, Error> {
    let start = Instant::now();
    let paths = db.list_paths()?;
    let total = paths.len();
    info!("Checking {} records against the filesystem...", total);
    reporter.on_prune_start(total);

    let checked = AtomicUsize::new(0);
    let unverified = AtomicUsize::new(0);

    let stale: Vec<String> = paths
        .into_par_iter()
        .filter(|path| {
            let exists = match Path::new(path).try_exists() {
                Ok(exists) => exists,
                Err(e) => {
                    warn!("Cannot verify {}: {}", path, e);
                    unverified.fetch_add(1, Ordering::Relaxed);
                    true
                }
            };
            let done = checked.fetch_add(1, Ordering::Relaxed) + 1;
            reporter.on_prune_progress(done, total);
            !exists
        })
        .collect();

    for path in &stale {
        debug!("Removing stale record: {}", path);
    }
    let removed = db.delete_batch(&stale)?;

    let duration = start.elapsed().as_secs_f64();
    info!("Removed {} stale records in {:.2}s", removed, duration);
    reporter.on_prune_complete(removed, duration);

    Ok(PruneSummary {
        checked: total,
        removed,
        unverified: unverified.into_inner(),
    })
}
