use crate::ignore::IgnorePredicate;
use crate::platform;
use std::fs::Metadata;
use std::path::{Path, PathBuf};
use tracing::{trace, warn};
use walkdir::WalkDir;

/// Reason attached to entries whose path cannot be stored as a key.
pub const NON_UTF8_REASON: &str = "path is not valid UTF-8";

/// A regular file found by the traverser, with the metadata seen at that time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileDescriptor {
    pub path: PathBuf,
    pub size: u64,
    pub modified_at: i64,
    pub created_at: i64,
}

impl FileDescriptor {
    pub fn from_metadata(path: PathBuf, metadata: &Metadata) -> Self {
        Self {
            path,
            size: metadata.len(),
            modified_at: platform::modified_nanos(metadata),
            created_at: platform::created_nanos(metadata),
        }
    }
}

#[derive(Debug, Clone)]
pub enum WalkEvent {
    File(FileDescriptor),
    /// Excluded by the ignore predicate. Ignored directories are not entered.
    Ignored { path: PathBuf, is_directory: bool },
    /// Could not be read, e.g. permission denied on a directory, or has a
    /// non-UTF-8 path. A skipped directory is not entered.
    Skipped { path: PathBuf, reason: String },
}

/// Lazy depth-first walk of a directory tree.
///
/// Symlinks are never followed or emitted, and only regular files are yielded
/// as `WalkEvent::File`. Errors on one entry are reported and the walk moves on
/// to its siblings.
pub struct Traverser<'a> {
    root: PathBuf,
    inner: walkdir::IntoIter,
    ignore: &'a dyn IgnorePredicate,
}

impl<'a> Traverser<'a> {
    pub fn new(root: &Path, ignore: &'a dyn IgnorePredicate) -> Self {
        let inner = WalkDir::new(root)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter();
        Self {
            root: root.to_path_buf(),
            inner,
            ignore,
        }
    }
}

impl Iterator for Traverser<'_> {
    type Item = WalkEvent;

    fn next(&mut self) -> Option<WalkEvent> {
        loop {
            let entry = match self.inner.next()? {
                Ok(entry) => entry,
                Err(err) => {
                    let path = err
                        .path()
                        .map(Path::to_path_buf)
                        .unwrap_or_else(|| self.root.clone());
                    warn!("Skipping {}: {}", path.display(), err);
                    return Some(WalkEvent::Skipped {
                        path,
                        reason: err.to_string(),
                    });
                }
            };

            if entry.depth() == 0 {
                continue;
            }

            let file_type = entry.file_type();
            let is_directory = file_type.is_dir();

            if self.ignore.should_skip(entry.path(), is_directory) {
                if is_directory {
                    self.inner.skip_current_dir();
                }
                trace!("Ignoring {}", entry.path().display());
                return Some(WalkEvent::Ignored {
                    path: entry.into_path(),
                    is_directory,
                });
            }

            if (is_directory || file_type.is_file()) && entry.path().to_str().is_none() {
                if is_directory {
                    self.inner.skip_current_dir();
                }
                warn!("Skipping {}: {}", entry.path().display(), NON_UTF8_REASON);
                return Some(WalkEvent::Skipped {
                    path: entry.into_path(),
                    reason: NON_UTF8_REASON.to_string(),
                });
            }

            if !file_type.is_file() {
                continue;
            }

            return Some(match entry.metadata() {
                Ok(metadata) => {
                    WalkEvent::File(FileDescriptor::from_metadata(entry.into_path(), &metadata))
                }
                Err(err) => {
                    warn!("Skipping {}: {}", entry.path().display(), err);
                    WalkEvent::Skipped {
                        path: entry.into_path(),
                        reason: err.to_string(),
                    }
                }
            });
        }
    }
}
