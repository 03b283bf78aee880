use ahash::AHashMap;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// One stored file, keyed by its absolute path.
///
/// Timestamps are nanoseconds since the Unix epoch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileRecord {
    pub path: String,
    pub size_bytes: i64,
    pub content_hash: Option<String>,
    pub created_at: i64,
    pub modified_at: i64,
    pub last_seen_scan_id: i64,
}

impl FileRecord {
    pub fn modified_datetime(&self) -> Option<DateTime<Utc>> {
        nanos_to_datetime(self.modified_at)
    }

    pub fn created_datetime(&self) -> Option<DateTime<Utc>> {
        nanos_to_datetime(self.created_at)
    }
}

fn nanos_to_datetime(nanos: i64) -> Option<DateTime<Utc>> {
    const NANOS_PER_SEC: i64 = 1_000_000_000;
    DateTime::from_timestamp(
        nanos.div_euclid(NANOS_PER_SEC),
        nanos.rem_euclid(NANOS_PER_SEC) as u32,
    )
}

/// The stored values the unchanged-file check compares against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fingerprint {
    pub size_bytes: i64,
    pub modified_at: i64,
}

/// Path → fingerprint for every record under a scan root, loaded once per scan.
pub type SnapshotIndex = AHashMap<String, Fingerprint>;

/// A persisted scan session row.
#[derive(Debug, Clone, Serialize)]
pub struct ScanSessionRecord {
    pub id: i64,
    pub root_path: String,
    pub started_at: String,
    pub completed_at: Option<String>,
    pub status: String,
    pub files_inserted: i64,
    pub files_updated: i64,
    pub files_reused: i64,
    pub files_ignored: i64,
    pub files_skipped: i64,
    pub files_errored: i64,
    pub files_hashed: i64,
}
