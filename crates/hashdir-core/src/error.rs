use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that abort a whole operation.
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Store unavailable at '{path}': {source}")]
    StoreUnavailable {
        path: String,
        #[source]
        source: rusqlite::Error,
    },

    #[error("Scan root '{}' does not exist or is not a directory", .0.display())]
    RootNotFound(PathBuf),

    #[error("Worker pool error: {0}")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),

    #[error("Scan cancelled")]
    Cancelled,
}

/// Per-file failures. These never propagate past the file they belong to.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FileError {
    #[error("access denied: {0}")]
    Access(String),

    #[error("transient read error: {0}")]
    TransientRead(String),

    #[error("not a regular file")]
    NotRegularFile,
}

impl FileError {
    pub fn from_io(err: &io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::PermissionDenied => FileError::Access(err.to_string()),
            _ => FileError::TransientRead(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_permission_denied_maps_to_access() {
        let err = io::Error::new(io::ErrorKind::PermissionDenied, "nope");
        assert!(matches!(FileError::from_io(&err), FileError::Access(_)));
    }

    #[test]
    fn test_other_io_errors_are_transient() {
        let err = io::Error::new(io::ErrorKind::NotFound, "gone");
        assert!(matches!(FileError::from_io(&err), FileError::TransientRead(_)));
        let err = io::Error::new(io::ErrorKind::UnexpectedEof, "short read");
        assert!(matches!(FileError::from_io(&err), FileError::TransientRead(_)));
    }
}
