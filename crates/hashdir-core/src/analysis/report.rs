use super::duplicates::{self, DuplicateGroup};
use crate::config::AppConfig;
use crate::error::Error;
use crate::storage::{Database, FileRecord};
use serde::Serialize;
use tracing::debug;

#[derive(Debug, Clone, Copy)]
pub struct ReportOptions {
    /// Number of largest files to list.
    pub top_k: usize,
    /// Maximum duplicate groups to list; `None` lists all of them.
    pub max_groups: Option<usize>,
}

impl Default for ReportOptions {
    fn default() -> Self {
        Self {
            top_k: crate::config::DEFAULT_TOP_K,
            max_groups: None,
        }
    }
}

impl From<&AppConfig> for ReportOptions {
    fn from(config: &AppConfig) -> Self {
        Self {
            top_k: config.top_k,
            max_groups: None,
        }
    }
}

/// Summary of everything in the store.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Report {
    pub total_files: u64,
    pub total_bytes: u64,
    pub duplicate_group_count: u64,
    /// Across all duplicate groups, not only the listed ones.
    pub total_wasted_bytes: u64,
    pub largest_files: Vec<FileRecord>,
    pub duplicate_groups: Vec<DuplicateGroup>,
}

impl Report {
    pub fn is_empty(&self) -> bool {
        self.total_files == 0
    }
}

/// Read-only aggregation over the store. An empty store yields an empty report.
pub fn build_report(db: &Database, options: &ReportOptions) -> Result<Report, Error> {
    let (total_files, total_bytes) = db.totals()?;
    let (group_count, wasted) = db.duplicate_totals()?;
    let largest_files = db.largest_files(options.top_k as i64)?;
    let duplicate_groups = duplicates::find_duplicate_groups(db, options.max_groups)?;

    debug!(
        "Report: {} files, {} bytes, {} duplicate groups, {} bytes wasted",
        total_files, total_bytes, group_count, wasted
    );

    Ok(Report {
        total_files: total_files.max(0) as u64,
        total_bytes: total_bytes.max(0) as u64,
        duplicate_group_count: group_count.max(0) as u64,
        total_wasted_bytes: wasted.max(0) as u64,
        largest_files,
        duplicate_groups,
    })
}
