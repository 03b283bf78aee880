use std::fs::Metadata;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

/// Store key for a path; `None` when the path is not valid UTF-8.
pub fn path_key(path: &Path) -> Option<String> {
    path.to_str().map(str::to_string)
}

/// Lossy form of a path, for logs and skip reasons only.
pub fn display_path(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

pub fn modified_nanos(metadata: &Metadata) -> i64 {
    metadata.modified().map(system_time_nanos).unwrap_or(0)
}

/// Birth time where the platform records one, otherwise the inode change time.
pub fn created_nanos(metadata: &Metadata) -> i64 {
    match metadata.created() {
        Ok(created) => system_time_nanos(created),
        Err(_) => change_time_nanos(metadata),
    }
}

#[cfg(unix)]
fn change_time_nanos(metadata: &Metadata) -> i64 {
    use std::os::unix::fs::MetadataExt;
    metadata
        .ctime()
        .saturating_mul(1_000_000_000)
        .saturating_add(metadata.ctime_nsec())
}

#[cfg(not(unix))]
fn change_time_nanos(metadata: &Metadata) -> i64 {
    modified_nanos(metadata)
}

/// Signed nanoseconds relative to the Unix epoch.
pub fn system_time_nanos(time: SystemTime) -> i64 {
    match time.duration_since(UNIX_EPOCH) {
        Ok(after) => i64::try_from(after.as_nanos()).unwrap_or(i64::MAX),
        Err(before) => i64::try_from(before.duration().as_nanos())
            .map(|n| -n)
            .unwrap_or(i64::MIN),
    }
}
