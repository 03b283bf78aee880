use crate::error::Error;
use crate::storage::Database;
use serde::Serialize;

/// Two or more stored files with identical content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DuplicateGroup {
    pub content_hash: String,
    pub size_bytes: i64,
    pub paths: Vec<String>,
    pub wasted_bytes: i64,
}

impl DuplicateGroup {
    pub fn count(&self) -> usize {
        self.paths.len()
    }
}

/// Space reclaimable by keeping a single copy.
pub fn wasted_bytes(size_bytes: i64, file_count: i64) -> i64 {
    size_bytes * (file_count - 1).max(0)
}

/// Duplicate groups ordered by wasted space, largest first.
///
/// Grouping happens in SQL over the hash index; members are then fetched per
/// group. `limit` of `None` returns every group.
pub fn find_duplicate_groups(
    db: &Database,
    limit: Option<usize>,
) -> Result<Vec<DuplicateGroup>, Error> {
    let limit = limit.map(|l| l as i64).unwrap_or(-1);
    let mut groups = Vec::new();

    for (content_hash, size_bytes, _) in db.duplicate_hashes(limit)? {
        let paths: Vec<String> = db
            .list_by_hash(&content_hash)?
            .into_iter()
            .map(|record| record.path)
            .collect();

        let count = paths.len() as i64;
        if count < 2 {
            continue;
        }

        groups.push(DuplicateGroup {
            wasted_bytes: wasted_bytes(size_bytes, count),
            content_hash,
            size_bytes,
            paths,
        });
    }

    Ok(groups)
}
