pub mod content;

pub use content::{hash_bytes, hash_file, hash_reader, ContentDigest, CHUNK_SIZE, EMPTY_HASH};
