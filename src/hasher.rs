//! Content digests for change detection.
//!
//! A document's digest is the lowercase hex SHA-256 of its raw bytes,
//! exactly as stored on disk. Nothing is normalized before hashing, so the
//! digest persisted in an enriched record can be compared byte-for-byte
//! against a fresh digest of the source file.

use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

use sha2::{Digest, Sha256};

use crate::error::{Error, Result};

/// Read size used when streaming a source into the hasher.
pub const CHUNK_SIZE: usize = 4096;

/// Hash everything a reader yields, `CHUNK_SIZE` bytes at a time.
pub fn hash_reader<R: Read>(mut reader: R) -> io::Result<String> {
    let mut hasher = Sha256::new();
    let mut buf = [0u8; CHUNK_SIZE];
    loop {
        let n = match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        hasher.update(&buf[..n]);
    }
    Ok(format!("{:x}", hasher.finalize()))
}

/// Hash an in-memory byte slice.
pub fn hash_bytes(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

/// Hash a file without buffering it whole.
pub fn hash_file(path: &Path) -> Result<String> {
    let file = File::open(path).map_err(|source| Error::HashIo {
        path: path.to_path_buf(),
        source,
    })?;
    hash_reader(file).map_err(|source| Error::HashIo {
        path: path.to_path_buf(),
        source,
    })
}
