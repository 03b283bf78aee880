use super::walk::{FileDescriptor, Traverser, WalkEvent, NON_UTF8_REASON};
use crate::error::{Error, FileError};
use crate::hasher;
use crate::platform;
use crate::reconcile::{self, Decision};
use crate::session::ScanSession;
use crate::storage::{FileRecord, SnapshotIndex};
use crossbeam_channel::{self as channel, Sender};
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use std::fs;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use tracing::{debug, trace};

/// Work items buffered per worker between the traversal and the pool.
const QUEUE_DEPTH_PER_WORKER: usize = 2;

/// The result for one file. Every file the traverser yields produces exactly
/// one outcome.
#[derive(Debug, Clone)]
pub enum FileOutcome {
    Hashed { record: FileRecord, decision: Decision },
    /// Size and mtime match the stored record; not hashed.
    Unchanged { path: String },
    Skipped { path: String, reason: String },
    Failed { path: String, error: FileError },
}

impl FileOutcome {
    pub fn path(&self) -> &str {
        match self {
            FileOutcome::Hashed { record, .. } => &record.path,
            FileOutcome::Unchanged { path }
            | FileOutcome::Skipped { path, .. }
            | FileOutcome::Failed { path, .. } => path,
        }
    }
}

struct WorkItem {
    descriptor: FileDescriptor,
    key: String,
    decision: Decision,
}

/// Fans traversal output out to a fixed-size hashing pool and funnels the
/// results back to one consumer.
///
/// The traversal runs on its own thread and applies the unchanged-file check
/// before anything is queued, so reused files never reach the pool. The queue
/// to the pool is bounded, which caps the number of open file handles.
pub struct Dispatcher<'s> {
    pool: ThreadPool,
    queue_depth: usize,
    session: &'s ScanSession,
    cancel: Arc<AtomicBool>,
}

impl<'s> Dispatcher<'s> {
    pub fn new(
        workers: usize,
        session: &'s ScanSession,
        cancel: Arc<AtomicBool>,
    ) -> Result<Self, Error> {
        let workers = workers.max(1);
        let pool = ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("hashdir-hash-{}", i))
            .build()?;
        Ok(Self {
            pool,
            queue_depth: workers * QUEUE_DEPTH_PER_WORKER,
            session,
            cancel,
        })
    }

    pub fn workers(&self) -> usize {
        self.pool.current_num_threads()
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::Relaxed)
    }

    /// Drives the whole pipeline, calling `sink` on the current thread for
    /// every outcome. An error from `sink` stops traversal and hashing and is
    /// returned once the worker threads have wound down.
    pub fn run<F>(
        &self,
        traverser: Traverser<'_>,
        snapshot: SnapshotIndex,
        mut sink: F,
    ) -> Result<(), Error>
    where
        F: FnMut(FileOutcome) -> Result<(), Error>,
    {
        let (work_tx, work_rx) = channel::bounded::<WorkItem>(self.queue_depth);
        let (result_tx, result_rx) = channel::unbounded::<FileOutcome>();

        thread::scope(|scope| {
            let gate_results = result_tx.clone();
            scope.spawn(move || self.gate(traverser, snapshot, work_tx, gate_results));

            scope.spawn(move || {
                self.pool.install(|| {
                    work_rx
                        .into_iter()
                        .par_bridge()
                        .for_each_with(result_tx, |results, item| {
                            if self.is_cancelled() {
                                return;
                            }
                            let outcome = hash_one(item, self.session);
                            let _ = results.send(outcome);
                        });
                });
            });

            for outcome in result_rx.iter() {
                if self.is_cancelled() {
                    debug!("Dispatch stopped by cancellation");
                    break;
                }
                if let Err(e) = sink(outcome) {
                    self.cancel.store(true, Ordering::Relaxed);
                    return Err(e);
                }
            }
            Ok(())
        })
    }

    /// Traversal stage: counts ignored entries, reports walk errors, answers
    /// unchanged files directly and queues the rest for hashing.
    fn gate(
        &self,
        traverser: Traverser<'_>,
        snapshot: SnapshotIndex,
        work: Sender<WorkItem>,
        results: Sender<FileOutcome>,
    ) {
        for event in traverser {
            if self.is_cancelled() {
                debug!("Traversal stopped by cancellation");
                break;
            }

            let sent = match event {
                WalkEvent::File(descriptor) => {
                    let Some(key) = platform::path_key(&descriptor.path) else {
                        let skipped = FileOutcome::Skipped {
                            path: platform::display_path(&descriptor.path),
                            reason: NON_UTF8_REASON.to_string(),
                        };
                        if results.send(skipped).is_err() {
                            break;
                        }
                        continue;
                    };
                    let decision = reconcile::classify(
                        snapshot.get(&key),
                        descriptor.size,
                        descriptor.modified_at,
                    );
                    if decision == Decision::Reuse {
                        trace!("Unchanged {}", key);
                        results.send(FileOutcome::Unchanged { path: key }).is_ok()
                    } else {
                        work.send(WorkItem {
                            descriptor,
                            key,
                            decision,
                        })
                        .is_ok()
                    }
                }
                WalkEvent::Ignored { .. } => {
                    self.session.counters.inc_ignored();
                    true
                }
                WalkEvent::Skipped { path, reason } => results
                    .send(FileOutcome::Skipped {
                        path: platform::display_path(&path),
                        reason,
                    })
                    .is_ok(),
            };

            if !sent {
                break;
            }
        }
    }
}

/// Worker stage for one file: re-stat, hash, re-stat.
fn hash_one(item: WorkItem, session: &ScanSession) -> FileOutcome {
    let WorkItem {
        descriptor,
        key,
        decision,
    } = item;

    let before = match fs::symlink_metadata(&descriptor.path) {
        Ok(metadata) => metadata,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return FileOutcome::Skipped {
                path: key,
                reason: "vanished before hashing".to_string(),
            };
        }
        Err(e) => {
            return FileOutcome::Failed {
                path: key,
                error: FileError::from_io(&e),
            };
        }
    };
    if !before.file_type().is_file() {
        return FileOutcome::Skipped {
            path: key,
            reason: "no longer a regular file".to_string(),
        };
    }

    session.counters.inc_hashed();
    let digest = match hasher::hash_file(&descriptor.path) {
        Ok(digest) => digest,
        Err(error) => return FileOutcome::Failed { path: key, error },
    };
    session.counters.add_hashed_bytes(digest.byte_count);

    let modified_at = platform::modified_nanos(&before);
    match fs::symlink_metadata(&descriptor.path) {
        Ok(after)
            if after.len() == digest.byte_count
                && platform::modified_nanos(&after) == modified_at => {}
        Ok(_) => {
            return FileOutcome::Failed {
                path: key,
                error: FileError::TransientRead("file changed while being read".to_string()),
            };
        }
        Err(_) => {
            return FileOutcome::Failed {
                path: key,
                error: FileError::TransientRead("file vanished while being read".to_string()),
            };
        }
    }

    trace!("Hashed {} ({} bytes)", key, digest.byte_count);
    FileOutcome::Hashed {
        record: FileRecord {
            path: key,
            size_bytes: digest.byte_count as i64,
            content_hash: Some(digest.hash),
            created_at: platform::created_nanos(&before),
            modified_at,
            last_seen_scan_id: session.id,
        },
        decision,
    }
}
