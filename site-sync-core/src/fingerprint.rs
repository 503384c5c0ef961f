//! Streaming content fingerprints.
//!
//! A fingerprint is the base64-encoded MD5 digest of a file's bytes, which is
//! also the wire format of the `Content-MD5` header.

use std::path::Path;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use md5::{Digest, Md5};
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::error::SyncError;

/// Read buffer used for files.
pub const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

/// Base64 MD5 of some content.
pub type Fingerprint = String;

/// Fingerprint an in-memory buffer.
pub fn fingerprint_bytes(data: &[u8]) -> Fingerprint {
    STANDARD.encode(Md5::digest(data))
}

/// Fingerprint everything `reader` yields, reading at most `chunk_size`
/// bytes at a time.
pub async fn fingerprint_reader<R>(mut reader: R, chunk_size: usize) -> std::io::Result<Fingerprint>
where
    R: AsyncRead + Unpin,
{
    let mut hasher = Md5::new();
    let mut buffer = vec![0u8; chunk_size.max(1)];

    loop {
        let read = reader.read(&mut buffer).await?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }

    Ok(STANDARD.encode(hasher.finalize()))
}

/// Fingerprint a file on disk without loading it into memory.
pub async fn fingerprint_file(path: &Path) -> Result<Fingerprint, SyncError> {
    let file = tokio::fs::File::open(path)
        .await
        .map_err(|e| SyncError::filesystem(path, e))?;
    let fingerprint = fingerprint_reader(file, DEFAULT_CHUNK_SIZE)
        .await
        .map_err(|e| SyncError::filesystem(path, e))?;
    tracing::trace!(path = %path.display(), %fingerprint, "Fingerprinted file");
    Ok(fingerprint)
}
