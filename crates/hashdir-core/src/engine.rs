use crate::analysis::report::{self, Report, ReportOptions};
use crate::config::AppConfig;
use crate::error::Error;
use crate::ignore::{GlobIgnore, IgnorePredicate};
use crate::platform;
use crate::progress::ProgressReporter;
use crate::reconcile::{self, PruneSummary, Reconciler};
use crate::scanner::{Dispatcher, Traverser};
use crate::session::{ScanSession, ScanStatus, ScanSummary};
use crate::storage::{Database, FileRecord, ScanSessionRecord};
use std::fs;
use std::path::{Path, PathBuf, MAIN_SEPARATOR};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info};

/// Scans refresh each progress callback at most this often (in outcomes).
const PROGRESS_INTERVAL: u64 = 64;

pub struct ScanEngine {
    config: AppConfig,
    db_path: String,
    cancel: Arc<AtomicBool>,
}

impl ScanEngine {
    pub fn new(config: AppConfig) -> Self {
        let db_path = config.db_path.clone();
        Self {
            config,
            db_path,
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn with_db_path(mut self, path: &str) -> Self {
        self.db_path = path.to_string();
        self
    }

    pub fn db_path(&self) -> &str {
        &self.db_path
    }

    /// Setting this flag stops a running scan at the next file boundary.
    pub fn cancel_token(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    pub fn open_store(&self) -> Result<Database, Error> {
        Database::open(&self.db_path).map_err(|source| Error::StoreUnavailable {
            path: self.db_path.clone(),
            source,
        })
    }

    /// Scan `root` with the configured ignore rules plus the root's
    /// `.hashdirignore`.
    pub fn scan(
        &self,
        root: impl AsRef<Path>,
        reporter: &dyn ProgressReporter,
    ) -> Result<ScanSummary, Error> {
        let root = resolve_root(root.as_ref())?;
        let ignore = GlobIgnore::for_root(&root, &self.config)?;
        self.scan_resolved(&root, &ignore, reporter)
    }

    /// Scan `root` with a caller-supplied ignore predicate.
    pub fn scan_with(
        &self,
        root: impl AsRef<Path>,
        ignore: &dyn IgnorePredicate,
        reporter: &dyn ProgressReporter,
    ) -> Result<ScanSummary, Error> {
        let root = resolve_root(root.as_ref())?;
        self.scan_resolved(&root, ignore, reporter)
    }

    fn scan_resolved(
        &self,
        root: &Path,
        ignore: &dyn IgnorePredicate,
        reporter: &dyn ProgressReporter,
    ) -> Result<ScanSummary, Error> {
        let root_key =
            platform::path_key(root).ok_or_else(|| Error::RootNotFound(root.to_path_buf()))?;
        let db = self.open_store()?;

        let scan_id = db.create_scan_session(&root_key)?;
        let session = ScanSession::new(scan_id, root);
        info!("Scan {} of {} started", scan_id, root.display());
        reporter.on_scan_start(&root_key);

        let snapshot = db.snapshot_index(&root_prefix(&root_key))?;
        let dispatcher = Dispatcher::new(self.config.worker_count(), &session, self.cancel_token())?;
        debug!(
            "Dispatching to {} workers, {} known records under root",
            dispatcher.workers(),
            snapshot.len()
        );

        let mut reconciler = Reconciler::new(&db, &session, self.config.batch_size());
        let run = dispatcher.run(Traverser::new(root, ignore), snapshot, |outcome| {
            let path = outcome.path().to_string();
            reconciler.apply(outcome)?;
            let counts = session.counters.snapshot();
            if counts.seen() % PROGRESS_INTERVAL == 0 {
                reporter.on_scan_progress(&counts, &path);
            }
            Ok(())
        });
        let flushed = reconciler.finish();

        let status = match (&run, &flushed) {
            (Ok(()), Ok(_)) if self.cancel.load(Ordering::Relaxed) => ScanStatus::Cancelled,
            (Ok(()), Ok(_)) => ScanStatus::Completed,
            _ => ScanStatus::Failed,
        };
        let summary = session.summarize(status);
        let finalized = db.complete_scan_session(scan_id, status, &summary.counts);
        if let Err(e) = &finalized {
            error!("Failed to record the end of scan {}: {}", scan_id, e);
        }
        settle(run, flushed, finalized)?;
        if status == ScanStatus::Cancelled {
            info!("Scan {} cancelled", scan_id);
            return Err(Error::Cancelled);
        }

        let counts = &summary.counts;
        info!(
            "Scan {} complete in {:.2}s: {} processed ({} new, {} updated, {} unchanged), {} skipped, {} errored, {} ignored",
            scan_id,
            summary.duration.as_secs_f64(),
            counts.processed(),
            counts.inserted,
            counts.updated,
            counts.reused,
            counts.skipped,
            counts.errored,
            counts.ignored,
        );
        reporter.on_scan_complete(&summary);
        Ok(summary)
    }

    /// Delete every record whose path is gone from disk.
    pub fn prune(&self, reporter: &dyn ProgressReporter) -> Result<PruneSummary, Error> {
        let db = self.open_store()?;
        reconcile::prune(&db, reporter)
    }

    pub fn report(&self, options: &ReportOptions) -> Result<Report, Error> {
        let db = self.open_store()?;
        report::build_report(&db, options)
    }

    /// Every stored record with the given content hash.
    pub fn lookup(&self, content_hash: &str) -> Result<Vec<FileRecord>, Error> {
        let db = self.open_store()?;
        Ok(db.list_by_hash(&content_hash.to_lowercase())?)
    }

    pub fn sessions(&self, limit: usize) -> Result<Vec<ScanSessionRecord>, Error> {
        let db = self.open_store()?;
        Ok(db.list_sessions(limit as i64)?)
    }
}

/// First failure in pipeline order: dispatch, then the final flush, then the
/// session bookkeeping.
fn settle(
    run: Result<(), Error>,
    flushed: Result<usize, Error>,
    finalized: rusqlite::Result<()>,
) -> Result<(), Error> {
    run?;
    flushed?;
    finalized?;
    Ok(())
}

/// Absolute, symlink-free form of `root`; it must be an existing directory.
/// A root whose path is not valid UTF-8 is rejected by the scan as not found.
fn resolve_root(root: &Path) -> Result<PathBuf, Error> {
    match fs::canonicalize(root) {
        Ok(canonical) if canonical.is_dir() => Ok(canonical),
        _ => Err(Error::RootNotFound(root.to_path_buf())),
    }
}

/// `/a/b` → `/a/b/`, so a snapshot of `/a/b` excludes `/a/bc`.
fn root_prefix(root_key: &str) -> String {
    if root_key.ends_with(MAIN_SEPARATOR) {
        root_key.to_string()
    } else {
        format!("{}{}", root_key, MAIN_SEPARATOR)
    }
}
