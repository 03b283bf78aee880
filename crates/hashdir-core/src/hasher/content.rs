use crate::error::FileError;
use blake3::Hasher;
use std::fs::{File, OpenOptions};
use std::io::{self, Read};
use std::path::Path;

/// Bytes read per call; peak memory per hash is one buffer of this size.
pub const CHUNK_SIZE: usize = 64 * 1024;

/// BLAKE3 digest of zero bytes.
pub const EMPTY_HASH: &str = "af1349b9f5f9a1a6a0404dea36dcc9499bcb25c9adc112b7cc9a93cae41f3262";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentDigest {
    /// 64 lowercase hex characters.
    pub hash: String,
    pub byte_count: u64,
}

/// Streams a file through BLAKE3 in `CHUNK_SIZE` reads.
///
/// Fails if the path is not a regular file once opened, if it cannot be read,
/// or if reading fails part way through.
pub fn hash_file(path: &Path) -> Result<ContentDigest, FileError> {
    let file = open_for_hashing(path).map_err(|e| FileError::from_io(&e))?;
    let metadata = file.metadata().map_err(|e| FileError::from_io(&e))?;
    if !metadata.is_file() {
        return Err(FileError::NotRegularFile);
    }
    hash_reader(file).map_err(|e| FileError::from_io(&e))
}

/// Opening a FIFO or device without `O_NONBLOCK` can wait forever; the flag
/// has no effect on reads from regular files.
#[cfg(unix)]
fn open_for_hashing(path: &Path) -> io::Result<File> {
    use std::os::unix::fs::OpenOptionsExt;

    OpenOptions::new()
        .read(true)
        .custom_flags(libc::O_NONBLOCK)
        .open(path)
}

#[cfg(not(unix))]
fn open_for_hashing(path: &Path) -> io::Result<File> {
    File::open(path)
}

pub fn hash_reader<R: Read>(mut reader: R) -> io::Result<ContentDigest> {
    let mut hasher = Hasher::new();
    let mut buffer = vec![0u8; CHUNK_SIZE];
    let mut byte_count = 0u64;

    loop {
        let bytes_read = match reader.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        hasher.update(&buffer[..bytes_read]);
        byte_count += bytes_read as u64;
    }

    Ok(ContentDigest {
        hash: hasher.finalize().to_hex().to_string(),
        byte_count,
    })
}

pub fn hash_bytes(data: &[u8]) -> String {
    blake3::hash(data).to_hex().to_string()
}
