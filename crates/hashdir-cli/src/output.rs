use colored::*;
use hashdir_core::storage::{FileRecord, ScanSessionRecord};
use hashdir_core::{PruneSummary, Report, ScanSummary};
use humansize::{format_size, DECIMAL};

pub fn print_scan_summary(summary: &ScanSummary) {
    let counts = &summary.counts;
    println!(
        "Scan {} of {}",
        summary.scan_id.to_string().bold(),
        summary.root.display()
    );
    println!(
        "  processed: {} ({} new, {} updated, {} unchanged)",
        counts.processed().to_string().green(),
        counts.inserted,
        counts.updated,
        counts.reused,
    );
    println!(
        "  hashed:    {} files, {}",
        counts.hashed,
        format_size(counts.hashed_bytes, DECIMAL)
    );
    println!("  skipped:   {}", counts.skipped.to_string().yellow());
    println!("  errored:   {}", counts.errored.to_string().red());
    println!("  ignored:   {}", counts.ignored);
    println!("  duration:  {:.2}s", summary.duration.as_secs_f64());
}

pub fn print_prune_summary(summary: &PruneSummary) {
    println!(
        "Checked {} records, removed {} stale records",
        summary.checked,
        summary.removed.to_string().red()
    );
    if summary.unverified > 0 {
        println!(
            "  {} records kept because their path could not be checked",
            summary.unverified.to_string().yellow()
        );
    }
}

pub fn print_report(report: &Report) {
    if report.is_empty() {
        println!("The index is empty. Run `hashdir scan <DIR>` first.");
        return;
    }

    println!("{}", "Summary".bold().underline());
    println!("  files:  {}", report.total_files);
    println!("  size:   {}", format_size(report.total_bytes, DECIMAL));
    println!(
        "  wasted: {} in {} duplicate groups",
        format_size(report.total_wasted_bytes, DECIMAL).red(),
        report.duplicate_group_count
    );

    println!();
    println!("{}", "Largest files".bold().underline());
    for record in &report.largest_files {
        println!(
            "  {:>10}  {}",
            format_size(record.size_bytes.max(0) as u64, DECIMAL),
            record.path
        );
    }

    if report.duplicate_groups.is_empty() {
        return;
    }
    println!();
    println!("{}", "Duplicate groups".bold().underline());
    for group in &report.duplicate_groups {
        println!(
            "  {} x{} {} wasted ({} each)",
            group.content_hash.cyan(),
            group.count(),
            format_size(group.wasted_bytes.max(0) as u64, DECIMAL).red(),
            format_size(group.size_bytes.max(0) as u64, DECIMAL),
        );
        for path in &group.paths {
            println!("      {}", path);
        }
    }
}

pub fn print_records(records: &[FileRecord]) {
    let timestamp = |dt: Option<chrono::DateTime<chrono::Utc>>| {
        dt.map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| "-".to_string())
    };
    for record in records {
        println!(
            "{:>10}  created {}  modified {}  {}",
            format_size(record.size_bytes.max(0) as u64, DECIMAL),
            timestamp(record.created_datetime()),
            timestamp(record.modified_datetime()),
            record.path
        );
    }
}

pub fn print_sessions(sessions: &[ScanSessionRecord]) {
    for session in sessions {
        let status = match session.status.as_str() {
            "completed" => session.status.green(),
            "running" => session.status.cyan(),
            _ => session.status.red(),
        };
        println!(
            "#{:<5} {:<10} {}  {}",
            session.id,
            status,
            session.started_at,
            session.root_path
        );
        println!(
            "       {} new, {} updated, {} unchanged, {} skipped, {} errored, {} hashed",
            session.files_inserted,
            session.files_updated,
            session.files_reused,
            session.files_skipped,
            session.files_errored,
            session.files_hashed,
        );
    }
}
