use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tempfile::{tempdir, TempDir};

use hashdir_core::hasher::{hash_bytes, EMPTY_HASH};
use hashdir_core::storage::Database;
use hashdir_core::{AppConfig, Error, ScanEngine, ScanStatus, SilentReporter};

struct Fixture {
    _scan_dir: TempDir,
    _db_dir: TempDir,
    root: PathBuf,
    db_path: String,
}

impl Fixture {
    fn new() -> Self {
        let scan_dir = tempdir().unwrap();
        let root = scan_dir.path().join("scan_root");
        fs::create_dir_all(&root).unwrap();
        let root = fs::canonicalize(&root).unwrap();

        let db_dir = tempdir().unwrap();
        let db_path = db_dir
            .path()
            .join("hashdir_test.db")
            .to_string_lossy()
            .into_owned();

        Self {
            _scan_dir: scan_dir,
            _db_dir: db_dir,
            root,
            db_path,
        }
    }

    fn engine(&self) -> ScanEngine {
        self.engine_with_workers(None)
    }

    fn engine_with_workers(&self, workers: Option<usize>) -> ScanEngine {
        let config = AppConfig {
            workers,
            ..AppConfig::default()
        };
        ScanEngine::new(config).with_db_path(&self.db_path)
    }

    fn db(&self) -> Database {
        Database::open(&self.db_path).unwrap()
    }

    fn write(&self, relative: &str, content: impl AsRef<[u8]>) -> PathBuf {
        let path = self.root.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, content).unwrap();
        path
    }

    fn key(&self, relative: &str) -> String {
        self.root.join(relative).to_string_lossy().into_owned()
    }

    fn stored_paths(&self) -> BTreeSet<String> {
        self.db().list_paths().unwrap().into_iter().collect()
    }
}

fn files_on_disk(dir: &Path) -> BTreeSet<String> {
    let mut found = BTreeSet::new();
    if let Ok(entries) = fs::read_dir(dir) {
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                found.extend(files_on_disk(&path));
            } else if path.is_file() {
                found.insert(path.to_string_lossy().into_owned());
            }
        }
    }
    found
}

fn set_mtime(path: &Path, mtime: SystemTime) {
    fs::File::options()
        .write(true)
        .open(path)
        .unwrap()
        .set_modified(mtime)
        .unwrap();
}

/// Layout:
///   folder_a/unique_a.txt   ("unique content a")
///   folder_a/shared.txt     ("shared content xyz")
///   folder_b/unique_b.txt   ("unique content b")
///   folder_b/shared.txt     ("shared content xyz")
///   folder_c/large_1.bin    (200KB of 0xAA)
///   folder_c/large_2.bin    (200KB of 0xAA)
fn create_test_tree(fx: &Fixture) {
    fx.write("folder_a/unique_a.txt", "unique content a");
    fx.write("folder_b/unique_b.txt", "unique content b");
    fx.write("folder_a/shared.txt", "shared content xyz");
    fx.write("folder_b/shared.txt", "shared content xyz");
    let large = vec![0xAAu8; 200 * 1024];
    fx.write("folder_c/large_1.bin", &large);
    fx.write("folder_c/large_2.bin", &large);
}

#[test]
fn test_full_scan_records_every_file() {
    let fx = Fixture::new();
    create_test_tree(&fx);

    let summary = fx.engine().scan(&fx.root, &SilentReporter).unwrap();
    assert_eq!(summary.status, ScanStatus::Completed);
    assert_eq!(summary.counts.inserted, 6);
    assert_eq!(summary.counts.processed(), 6);
    assert_eq!(summary.counts.hashed, 6);
    assert_eq!(summary.counts.skipped, 0);
    assert_eq!(summary.counts.errored, 0);

    assert_eq!(fx.stored_paths(), files_on_disk(&fx.root));

    let db = fx.db();
    let shared = db.get(&fx.key("folder_a/shared.txt")).unwrap().unwrap();
    assert_eq!(shared.size_bytes, 18);
    assert_eq!(
        shared.content_hash.as_deref(),
        Some(hash_bytes(b"shared content xyz").as_str())
    );
    assert_eq!(shared.last_seen_scan_id, summary.scan_id);
    assert!(shared.modified_at > 0);

    let session = db.get_scan_session(summary.scan_id).unwrap().unwrap();
    assert_eq!(session.status, "completed");
    assert_eq!(session.files_inserted, 6);
}

#[test]
fn test_relative_and_absolute_roots_share_records() {
    let fx = Fixture::new();
    fx.write("sub/file.txt", "content");

    let engine = fx.engine();
    engine.scan(&fx.root, &SilentReporter).unwrap();
    let dotted = fx.root.join("sub").join("..");
    let second = engine.scan(&dotted, &SilentReporter).unwrap();

    assert_eq!(second.counts.reused, 1);
    assert_eq!(second.counts.inserted, 0);
    assert_eq!(fx.stored_paths().len(), 1);
}

#[test]
fn test_rescan_unchanged_tree_hashes_nothing() {
    let fx = Fixture::new();
    create_test_tree(&fx);
    let engine = fx.engine();

    let first = engine.scan(&fx.root, &SilentReporter).unwrap();
    let before = fx.db().list_all().unwrap();

    let second = engine.scan(&fx.root, &SilentReporter).unwrap();
    assert!(second.scan_id > first.scan_id);
    assert_eq!(second.counts.hashed, 0);
    assert_eq!(second.counts.reused, 6);
    assert_eq!(second.counts.inserted + second.counts.updated, 0);

    let after = fx.db().list_all().unwrap();
    assert_eq!(after.len(), before.len());
    for (old, new) in before.iter().zip(after.iter()) {
        assert_eq!(new.last_seen_scan_id, second.scan_id);
        assert_eq!(old.content_hash, new.content_hash);
        assert_eq!(old.modified_at, new.modified_at);
    }
}

#[test]
fn test_worker_count_does_not_affect_results() {
    let n = 40;
    for workers in [1, 7, n] {
        let fx = Fixture::new();
        for i in 0..n {
            fx.write(&format!("dir_{}/file_{}.dat", i % 5, i), format!("payload number {}", i));
        }

        let summary = fx
            .engine_with_workers(Some(workers))
            .scan(&fx.root, &SilentReporter)
            .unwrap();
        assert_eq!(summary.counts.inserted, n as u64, "workers = {}", workers);

        let records = fx.db().list_all().unwrap();
        assert_eq!(records.len(), n);
        for i in 0..n {
            let record = fx
                .db()
                .get(&fx.key(&format!("dir_{}/file_{}.dat", i % 5, i)))
                .unwrap()
                .unwrap();
            assert_eq!(
                record.content_hash.unwrap(),
                hash_bytes(format!("payload number {}", i).as_bytes())
            );
        }
    }
}

#[test]
fn test_changed_content_with_new_mtime_is_rehashed() {
    let fx = Fixture::new();
    let path = fx.write("doc.txt", "version one");
    fx.write("other.txt", "untouched");
    let engine = fx.engine();
    engine.scan(&fx.root, &SilentReporter).unwrap();
    let old = fx.db().get(&fx.key("doc.txt")).unwrap().unwrap();

    // Same size, different bytes, later mtime
    fs::write(&path, "version two").unwrap();
    set_mtime(
        &path,
        SystemTime::UNIX_EPOCH + Duration::from_nanos((old.modified_at + 1_000_000_000) as u64),
    );

    let second = engine.scan(&fx.root, &SilentReporter).unwrap();
    assert_eq!(second.counts.updated, 1);
    assert_eq!(second.counts.reused, 1);
    assert_eq!(second.counts.hashed, 1);

    let new = fx.db().get(&fx.key("doc.txt")).unwrap().unwrap();
    assert_eq!(new.content_hash.unwrap(), hash_bytes(b"version two"));
    assert_ne!(new.modified_at, old.modified_at);
    assert_eq!(new.last_seen_scan_id, second.scan_id);
}

#[test]
fn test_changed_size_is_rehashed_even_with_same_mtime() {
    let fx = Fixture::new();
    let path = fx.write("grow.txt", "short");
    let engine = fx.engine();
    engine.scan(&fx.root, &SilentReporter).unwrap();
    let old = fx.db().get(&fx.key("grow.txt")).unwrap().unwrap();

    fs::write(&path, "a good deal longer").unwrap();
    set_mtime(
        &path,
        SystemTime::UNIX_EPOCH + Duration::from_nanos(old.modified_at as u64),
    );

    let second = engine.scan(&fx.root, &SilentReporter).unwrap();
    assert_eq!(second.counts.updated, 1);
    let new = fx.db().get(&fx.key("grow.txt")).unwrap().unwrap();
    assert_eq!(new.size_bytes, 18);
    assert_eq!(new.content_hash.unwrap(), hash_bytes(b"a good deal longer"));
}

#[test]
fn test_deleted_file_survives_scan_until_prune() {
    let fx = Fixture::new();
    create_test_tree(&fx);
    let engine = fx.engine();
    engine.scan(&fx.root, &SilentReporter).unwrap();

    let doomed = fx.root.join("folder_b/unique_b.txt");
    let doomed_key = fx.key("folder_b/unique_b.txt");
    let stale_hash = fx.db().get(&doomed_key).unwrap().unwrap().content_hash;
    fs::remove_file(&doomed).unwrap();

    let second = engine.scan(&fx.root, &SilentReporter).unwrap();
    let kept = fx.db().get(&doomed_key).unwrap().unwrap();
    assert_eq!(kept.content_hash, stale_hash);
    assert!(kept.last_seen_scan_id < second.scan_id);

    let pruned = engine.prune(&SilentReporter).unwrap();
    assert_eq!(pruned.removed, 1);
    assert_eq!(pruned.checked, 6);
    assert!(fx.db().get(&doomed_key).unwrap().is_none());
    assert_eq!(fx.stored_paths(), files_on_disk(&fx.root));
}

#[test]
fn test_prune_removes_whole_vanished_tree() {
    let fx = Fixture::new();
    create_test_tree(&fx);
    let engine = fx.engine();
    engine.scan(&fx.root, &SilentReporter).unwrap();

    fs::remove_dir_all(fx.root.join("folder_c")).unwrap();
    fx.write("folder_a/new.txt", "not scanned yet");

    let pruned = engine.prune(&SilentReporter).unwrap();
    assert_eq!(pruned.removed, 2);

    let mut expected = files_on_disk(&fx.root);
    expected.remove(&fx.key("folder_a/new.txt"));
    assert_eq!(fx.stored_paths(), expected);

    // Nothing left to prune
    assert_eq!(engine.prune(&SilentReporter).unwrap().removed, 0);
}

#[test]
fn test_ignored_directory_contributes_nothing() {
    let fx = Fixture::new();
    create_test_tree(&fx);
    fx.write("folder_c/nested/deeper.txt", "deep");

    let ignore = |path: &Path, is_dir: bool| is_dir && path.ends_with("folder_c");
    let summary = fx
        .engine()
        .scan_with(&fx.root, &ignore, &SilentReporter)
        .unwrap();

    assert_eq!(summary.counts.inserted, 4);
    assert_eq!(summary.counts.ignored, 1);
    let folder_c = fx.key("folder_c");
    assert!(fx.stored_paths().iter().all(|p| !p.starts_with(&folder_c)));
}

#[test]
fn test_default_ignore_rules_and_override_file() {
    let fx = Fixture::new();
    fx.write("keep.txt", "keep");
    fx.write("node_modules/pkg/index.js", "ignored dir");
    fx.write("build.o", "ignored extension");
    fx.write("disk.iso", "ignored by override");
    fx.write(".hashdirignore", "*.iso\n");

    let summary = fx.engine().scan(&fx.root, &SilentReporter).unwrap();

    let stored = fx.stored_paths();
    assert!(stored.contains(&fx.key("keep.txt")));
    assert!(stored.contains(&fx.key(".hashdirignore")));
    assert!(!stored.contains(&fx.key("node_modules/pkg/index.js")));
    assert!(!stored.contains(&fx.key("build.o")));
    assert!(!stored.contains(&fx.key("disk.iso")));
    assert_eq!(summary.counts.ignored, 3);
}

#[test]
fn test_empty_file_gets_fixed_digest() {
    let fx = Fixture::new();
    fx.write("empty_one", "");
    fx.write("nested/empty_two", "");

    fx.engine().scan(&fx.root, &SilentReporter).unwrap();
    for key in [fx.key("empty_one"), fx.key("nested/empty_two")] {
        let record = fx.db().get(&key).unwrap().unwrap();
        assert_eq!(record.size_bytes, 0);
        assert_eq!(record.content_hash.as_deref(), Some(EMPTY_HASH));
    }
}

#[test]
fn test_missing_root_is_fatal() {
    let fx = Fixture::new();
    let result = fx
        .engine()
        .scan(fx.root.join("does_not_exist"), &SilentReporter);
    assert!(matches!(result, Err(Error::RootNotFound(_))));
}

#[test]
fn test_unopenable_store_is_fatal() {
    let fx = Fixture::new();
    fx.write("a.txt", "a");
    let missing_dir = fx.root.join("no_such_dir").join("index.db");

    let engine = ScanEngine::new(AppConfig::default())
        .with_db_path(missing_dir.to_str().unwrap());
    let result = engine.scan(&fx.root, &SilentReporter);
    assert!(matches!(result, Err(Error::StoreUnavailable { .. })));
}

#[test]
fn test_cancelled_scan_leaves_store_consistent() {
    let fx = Fixture::new();
    create_test_tree(&fx);
    let engine = fx.engine();

    engine
        .cancel_token()
        .store(true, std::sync::atomic::Ordering::Relaxed);
    let result = engine.scan(&fx.root, &SilentReporter);
    assert!(matches!(result, Err(Error::Cancelled)));

    let db = fx.db();
    let sessions = db.list_sessions(1).unwrap();
    assert_eq!(sessions[0].status, "cancelled");
    // Whatever was written is whole
    for record in db.list_all().unwrap() {
        assert!(record.content_hash.is_some());
    }

    // A fresh engine picks up where the cancelled scan stopped
    let summary = fx.engine().scan(&fx.root, &SilentReporter).unwrap();
    assert_eq!(summary.counts.processed(), 6);
    assert_eq!(fx.stored_paths(), files_on_disk(&fx.root));
}

#[cfg(unix)]
#[test]
fn test_unreadable_file_is_counted_and_prior_record_kept() {
    use std::os::unix::fs::PermissionsExt;

    let fx = Fixture::new();
    let secret = fx.write("secret.txt", "classified");
    fx.write("public.txt", "open");
    let engine = fx.engine();
    engine.scan(&fx.root, &SilentReporter).unwrap();
    let prior = fx.db().get(&fx.key("secret.txt")).unwrap().unwrap();

    fs::write(&secret, "declassified!").unwrap();
    fs::set_permissions(&secret, fs::Permissions::from_mode(0o000)).unwrap();
    // Permission bits do not apply to root
    if fs::File::open(&secret).is_ok() {
        return;
    }

    let summary = engine.scan(&fx.root, &SilentReporter).unwrap();
    fs::set_permissions(&secret, fs::Permissions::from_mode(0o644)).unwrap();

    assert_eq!(summary.status, ScanStatus::Completed);
    assert_eq!(summary.counts.errored, 1);
    assert_eq!(summary.counts.reused, 1);
    assert_eq!(fx.db().get(&fx.key("secret.txt")).unwrap().unwrap(), prior);
}

// Linux filesystems accept arbitrary bytes in names
#[cfg(target_os = "linux")]
#[test]
fn test_non_utf8_names_are_skipped_and_never_pruned() {
    use std::ffi::OsStr;
    use std::os::unix::ffi::OsStrExt;

    let fx = Fixture::new();
    fx.write("good.txt", "fine");
    fs::write(fx.root.join(OsStr::from_bytes(b"bad\xff.txt")), "aaa").unwrap();
    fs::write(fx.root.join(OsStr::from_bytes(b"bad\xfe.txt")), "bbbb").unwrap();
    let odd_dir = fx.root.join(OsStr::from_bytes(b"odd\xfd"));
    fs::create_dir(&odd_dir).unwrap();
    fs::write(odd_dir.join("inside.txt"), "inside").unwrap();

    let engine = fx.engine();
    let summary = engine.scan(&fx.root, &SilentReporter).unwrap();
    assert_eq!(summary.counts.inserted, 1);
    assert_eq!(summary.counts.hashed, 1);
    assert_eq!(summary.counts.skipped, 3);

    let expected: BTreeSet<String> = [fx.key("good.txt")].into_iter().collect();
    assert_eq!(fx.stored_paths(), expected);

    let pruned = engine.prune(&SilentReporter).unwrap();
    assert_eq!(pruned.removed, 0);
    assert_eq!(fx.stored_paths(), expected);

    // Nothing collapsed into a shared key on the second pass either
    let second = engine.scan(&fx.root, &SilentReporter).unwrap();
    assert_eq!(second.counts.reused, 1);
    assert_eq!(second.counts.skipped, 3);
    assert_eq!(fx.db().record_count().unwrap(), 1);
}

#[test]
fn test_sessions_history() {
    let fx = Fixture::new();
    fx.write("a.txt", "a");
    let engine = fx.engine();
    let first = engine.scan(&fx.root, &SilentReporter).unwrap();
    let second = engine.scan(&fx.root, &SilentReporter).unwrap();

    let sessions = engine.sessions(10).unwrap();
    assert_eq!(sessions.len(), 2);
    assert_eq!(sessions[0].id, second.scan_id);
    assert_eq!(sessions[1].id, first.scan_id);
    assert_eq!(sessions[0].files_reused, 1);
    assert_eq!(sessions[1].files_inserted, 1);
}
