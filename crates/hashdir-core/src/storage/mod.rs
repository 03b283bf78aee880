pub mod models;
pub mod queries;
pub mod sqlite;

pub use models::{FileRecord, Fingerprint, ScanSessionRecord, SnapshotIndex};
pub use sqlite::Database;
