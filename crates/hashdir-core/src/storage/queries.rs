use super::models::*;
use super::sqlite::Database;
use crate::session::{ScanCounts, ScanStatus};
use rusqlite::{params, Result, Row};
use tracing::debug;

const RECORD_COLUMNS: &str =
    "path, size_bytes, content_hash, created_at, modified_at, last_seen_scan_id";

const UPSERT_RECORD: &str = "INSERT INTO file_record \
     (path, size_bytes, content_hash, created_at, modified_at, last_seen_scan_id) \
     VALUES (?1, ?2, ?3, ?4, ?5, ?6) \
     ON CONFLICT(path) DO UPDATE SET \
         size_bytes = excluded.size_bytes, \
         content_hash = excluded.content_hash, \
         created_at = excluded.created_at, \
         modified_at = excluded.modified_at, \
         last_seen_scan_id = excluded.last_seen_scan_id";

const TOUCH_RECORD: &str = "UPDATE file_record SET last_seen_scan_id = ?1 WHERE path = ?2";

fn record_from_row(row: &Row<'_>) -> Result<FileRecord> {
    Ok(FileRecord {
        path: row.get(0)?,
        size_bytes: row.get(1)?,
        content_hash: row.get(2)?,
        created_at: row.get(3)?,
        modified_at: row.get(4)?,
        last_seen_scan_id: row.get(5)?,
    })
}

impl Database {
    // ── Scan Session ─────────────────────────────────────────────

    pub fn create_scan_session(&self, root_path: &str) -> Result<i64> {
        let now = chrono::Utc::now().to_rfc3339();
        self.connection().execute(
            "INSERT INTO scan_session (root_path, started_at, status) VALUES (?1, ?2, ?3)",
            params![root_path, now, ScanStatus::Running.as_str()],
        )?;
        Ok(self.connection().last_insert_rowid())
    }

    pub fn complete_scan_session(
        &self,
        session_id: i64,
        status: ScanStatus,
        counts: &ScanCounts,
    ) -> Result<()> {
        let now = chrono::Utc::now().to_rfc3339();
        self.connection().execute(
            "UPDATE scan_session SET completed_at = ?1, status = ?2, \
             files_inserted = ?3, files_updated = ?4, files_reused = ?5, \
             files_ignored = ?6, files_skipped = ?7, files_errored = ?8, files_hashed = ?9 \
             WHERE id = ?10",
            params![
                now,
                status.as_str(),
                counts.inserted as i64,
                counts.updated as i64,
                counts.reused as i64,
                counts.ignored as i64,
                counts.skipped as i64,
                counts.errored as i64,
                counts.hashed as i64,
                session_id
            ],
        )?;
        Ok(())
    }

    pub fn get_scan_session(&self, session_id: i64) -> Result<Option<ScanSessionRecord>> {
        let mut stmt = self.connection().prepare(
            "SELECT id, root_path, started_at, completed_at, status, files_inserted, \
                    files_updated, files_reused, files_ignored, files_skipped, \
                    files_errored, files_hashed \
             FROM scan_session WHERE id = ?1",
        )?;
        let mut rows = stmt.query_map(params![session_id], session_from_row)?;
        rows.next().transpose()
    }

    /// Most recent sessions first.
    pub fn list_sessions(&self, limit: i64) -> Result<Vec<ScanSessionRecord>> {
        let mut stmt = self.connection().prepare(
            "SELECT id, root_path, started_at, completed_at, status, files_inserted, \
                    files_updated, files_reused, files_ignored, files_skipped, \
                    files_errored, files_hashed \
             FROM scan_session ORDER BY id DESC LIMIT ?1",
        )?;
        let sessions = stmt
            .query_map(params![limit], session_from_row)?
            .collect::<Result<Vec<_>>>()?;
        Ok(sessions)
    }

    // ── File Records ─────────────────────────────────────────────

    pub fn put(&self, record: &FileRecord) -> Result<()> {
        self.connection().execute(
            UPSERT_RECORD,
            params![
                record.path,
                record.size_bytes,
                record.content_hash,
                record.created_at,
                record.modified_at,
                record.last_seen_scan_id
            ],
        )?;
        Ok(())
    }

    pub fn get(&self, path: &str) -> Result<Option<FileRecord>> {
        match self.connection().query_row(
            &format!("SELECT {RECORD_COLUMNS} FROM file_record WHERE path = ?1"),
            params![path],
            record_from_row,
        ) {
            Ok(record) => Ok(Some(record)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Returns whether a record was removed.
    pub fn delete(&self, path: &str) -> Result<bool> {
        let removed = self
            .connection()
            .execute("DELETE FROM file_record WHERE path = ?1", params![path])?;
        Ok(removed > 0)
    }

    pub fn list_all(&self) -> Result<Vec<FileRecord>> {
        let mut stmt = self.connection().prepare(&format!(
            "SELECT {RECORD_COLUMNS} FROM file_record ORDER BY path"
        ))?;
        let records = stmt
            .query_map([], record_from_row)?
            .collect::<Result<Vec<_>>>()?;
        Ok(records)
    }

    pub fn list_paths(&self) -> Result<Vec<String>> {
        let mut stmt = self
            .connection()
            .prepare("SELECT path FROM file_record ORDER BY path")?;
        let paths = stmt
            .query_map([], |row| row.get(0))?
            .collect::<Result<Vec<_>>>()?;
        Ok(paths)
    }

    pub fn list_by_hash(&self, content_hash: &str) -> Result<Vec<FileRecord>> {
        let mut stmt = self.connection().prepare_cached(&format!(
            "SELECT {RECORD_COLUMNS} FROM file_record WHERE content_hash = ?1 ORDER BY path"
        ))?;
        let records = stmt
            .query_map(params![content_hash], record_from_row)?
            .collect::<Result<Vec<_>>>()?;
        Ok(records)
    }

    pub fn record_count(&self) -> Result<i64> {
        self.connection()
            .query_row("SELECT COUNT(*) FROM file_record", [], |row| row.get(0))
    }

    /// Fingerprints of every record whose path starts with `prefix`.
    pub fn snapshot_index(&self, prefix: &str) -> Result<SnapshotIndex> {
        let mut stmt = self.connection().prepare(
            "SELECT path, size_bytes, modified_at FROM file_record \
             WHERE substr(path, 1, length(?1)) = ?1",
        )?;
        let mut index = SnapshotIndex::new();
        let rows = stmt.query_map(params![prefix], |row| {
            Ok((
                row.get::<_, String>(0)?,
                Fingerprint {
                    size_bytes: row.get(1)?,
                    modified_at: row.get(2)?,
                },
            ))
        })?;
        for row in rows {
            let (path, fingerprint) = row?;
            index.insert(path, fingerprint);
        }
        debug!("Loaded snapshot of {} records under {}", index.len(), prefix);
        Ok(index)
    }

    /// Upserts `records` and stamps `touched` paths with `scan_id` in one
    /// transaction. Returns the number of rows written.
    pub fn write_batch(
        &self,
        records: &[FileRecord],
        touched: &[String],
        scan_id: i64,
    ) -> Result<usize> {
        let tx = self.connection().unchecked_transaction()?;
        let mut count = 0;
        {
            let mut upsert = tx.prepare_cached(UPSERT_RECORD)?;
            for record in records {
                count += upsert.execute(params![
                    record.path,
                    record.size_bytes,
                    record.content_hash,
                    record.created_at,
                    record.modified_at,
                    record.last_seen_scan_id
                ])?;
            }

            let mut touch = tx.prepare_cached(TOUCH_RECORD)?;
            for path in touched {
                count += touch.execute(params![scan_id, path])?;
            }
        }
        tx.commit()?;
        debug!(
            "Wrote batch: {} upserts, {} touches",
            records.len(),
            touched.len()
        );
        Ok(count)
    }

    pub fn delete_batch(&self, paths: &[String]) -> Result<usize> {
        let tx = self.connection().unchecked_transaction()?;
        let mut count = 0;
        {
            let mut stmt = tx.prepare_cached("DELETE FROM file_record WHERE path = ?1")?;
            for path in paths {
                count += stmt.execute(params![path])?;
            }
        }
        tx.commit()?;
        debug!("Deleted {} records", count);
        Ok(count)
    }

    // ── Aggregates ───────────────────────────────────────────────

    /// (record count, total bytes).
    pub fn totals(&self) -> Result<(i64, i64)> {
        self.connection().query_row(
            "SELECT COUNT(*), COALESCE(SUM(size_bytes), 0) FROM file_record",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
    }

    pub fn largest_files(&self, limit: i64) -> Result<Vec<FileRecord>> {
        let mut stmt = self.connection().prepare(&format!(
            "SELECT {RECORD_COLUMNS} FROM file_record \
             ORDER BY size_bytes DESC, path ASC LIMIT ?1"
        ))?;
        let records = stmt
            .query_map(params![limit], record_from_row)?
            .collect::<Result<Vec<_>>>()?;
        Ok(records)
    }

    /// (content_hash, size_bytes, file_count) for every hash shared by two or
    /// more records, most wasted space first. A negative limit means no limit.
    pub fn duplicate_hashes(&self, limit: i64) -> Result<Vec<(String, i64, i64)>> {
        let mut stmt = self.connection().prepare(
            "SELECT content_hash, MAX(size_bytes) AS size, COUNT(*) AS file_count \
             FROM file_record \
             WHERE content_hash IS NOT NULL \
             GROUP BY content_hash \
             HAVING COUNT(*) > 1 \
             ORDER BY MAX(size_bytes) * (COUNT(*) - 1) DESC, content_hash ASC \
             LIMIT ?1",
        )?;
        let groups = stmt
            .query_map(params![limit], |row| {
                Ok((row.get(0)?, row.get(1)?, row.get(2)?))
            })?
            .collect::<Result<Vec<_>>>()?;
        Ok(groups)
    }

    /// (group count, wasted bytes) over every duplicate hash.
    pub fn duplicate_totals(&self) -> Result<(i64, i64)> {
        self.connection().query_row(
            "SELECT COUNT(*), COALESCE(SUM(size * (file_count - 1)), 0) FROM ( \
                 SELECT MAX(size_bytes) AS size, COUNT(*) AS file_count \
                 FROM file_record \
                 WHERE content_hash IS NOT NULL \
                 GROUP BY content_hash \
                 HAVING COUNT(*) > 1 \
             )",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
    }
}

fn session_from_row(row: &Row<'_>) -> Result<ScanSessionRecord> {
    Ok(ScanSessionRecord {
        id: row.get(0)?,
        root_path: row.get(1)?,
        started_at: row.get(2)?,
        completed_at: row.get(3)?,
        status: row.get(4)?,
        files_inserted: row.get(5)?,
        files_updated: row.get(6)?,
        files_reused: row.get(7)?,
        files_ignored: row.get(8)?,
        files_skipped: row.get(9)?,
        files_errored: row.get(10)?,
        files_hashed: row.get(11)?,
    })
}
