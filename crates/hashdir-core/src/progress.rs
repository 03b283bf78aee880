use crate::session::{ScanCounts, ScanSummary};

/// Trait for reporting scan and prune progress.
///
/// The CLI implements this with indicatif. All methods have default no-op
/// implementations.
pub trait ProgressReporter: Send + Sync {
    fn on_scan_start(&self, _root: &str) {}
    fn on_scan_progress(&self, _counts: &ScanCounts, _current_path: &str) {}
    fn on_scan_complete(&self, _summary: &ScanSummary) {}
    fn on_prune_start(&self, _total_records: usize) {}
    fn on_prune_progress(&self, _checked: usize, _total_records: usize) {}
    fn on_prune_complete(&self, _removed: usize, _duration_secs: f64) {}
}

/// No-op progress reporter for silent operation.
pub struct SilentReporter;

impl ProgressReporter for SilentReporter {}
