//! Binary framing for snapshots.
//!
//! The body is serialized with:
//! - JSON for data (compatible with existing serde attributes)
//! - Length-prefixed format for framing
//! - CRC32 checksum for corruption detection
//! - Magic and version bytes for identification

use std::io::{Cursor, Read};

use crc32fast::Hasher;

use super::Snapshot;
use crate::error::PersistenceError;

/// Current frame version.
const FRAME_VERSION: u8 = 1;

/// Magic bytes identifying a snapshot frame.
pub const MAGIC: [u8; 4] = *b"DSNC";

/// Sanity bound on the body size (100 MB).
const MAX_BODY_SIZE: usize = 100 * 1024 * 1024;

fn corrupt(reason: impl Into<String>) -> PersistenceError {
    PersistenceError::Corrupt { reason: reason.into() }
}

/// Serializes a snapshot into a checksummed frame.
///
/// Format:
/// ```text
/// [magic: 4 bytes][version: 1 byte][length: 4 bytes LE][data: N bytes JSON][crc32: 4 bytes LE]
/// ```
///
/// # Errors
/// Returns `PersistenceError::Serialization` if the body cannot be encoded
/// or is too large to frame.
pub fn encode_snapshot(snapshot: &Snapshot) -> Result<Vec<u8>, PersistenceError> {
    let data = serde_json::to_vec(snapshot).map_err(|e| PersistenceError::Serialization {
        message: e.to_string(),
    })?;
    if data.len() > MAX_BODY_SIZE {
        return Err(PersistenceError::Serialization {
            message: format!("snapshot body of {} bytes exceeds maximum {MAX_BODY_SIZE}", data.len()),
        });
    }
    let len = u32::try_from(data.len()).map_err(|_| PersistenceError::Serialization {
        message: "snapshot body does not fit a u32 length".to_string(),
    })?;

    let mut hasher = Hasher::new();
    hasher.update(&data);
    let crc = hasher.finalize();

    let mut out = Vec::with_capacity(MAGIC.len() + 1 + 4 + data.len() + 4);
    out.extend_from_slice(&MAGIC);
    out.push(FRAME_VERSION);
    out.extend_from_slice(&len.to_le_bytes());
    out.extend_from_slice(&data);
    out.extend_from_slice(&crc.to_le_bytes());

    Ok(out)
}

/// Parses and verifies a frame.
///
/// # Errors
/// Returns `PersistenceError::Corrupt` on a bad magic, unsupported version,
/// truncation, trailing bytes, checksum mismatch or undecodable body.
pub fn decode_snapshot(bytes: &[u8]) -> Result<Snapshot, PersistenceError> {
    let mut reader = Cursor::new(bytes);
    let mut read = |buf: &mut [u8], what: &str| {
        reader
            .read_exact(buf)
            .map_err(|_| corrupt(format!("truncated frame while reading {what}")))
    };

    let mut magic = [0u8; 4];
    read(&mut magic, "magic")?;
    if magic != MAGIC {
        return Err(corrupt(format!("invalid magic bytes: expected {MAGIC:?}, got {magic:?}")));
    }

    let mut version = [0u8; 1];
    read(&mut version, "version")?;
    if version[0] != FRAME_VERSION {
        return Err(corrupt(format!(
            "unsupported frame version: {} (expected {FRAME_VERSION})",
            version[0]
        )));
    }

    let mut len_bytes = [0u8; 4];
    read(&mut len_bytes, "length")?;
    let len = u32::from_le_bytes(len_bytes) as usize;
    if len > MAX_BODY_SIZE {
        return Err(corrupt(format!("body size {len} exceeds maximum {MAX_BODY_SIZE}")));
    }

    let mut data = vec![0u8; len];
    read(&mut data, "body")?;

    let mut crc_bytes = [0u8; 4];
    read(&mut crc_bytes, "checksum")?;
    let stored_crc = u32::from_le_bytes(crc_bytes);

    let mut hasher = Hasher::new();
    hasher.update(&data);
    let computed_crc = hasher.finalize();
    if stored_crc != computed_crc {
        return Err(corrupt(format!(
            "CRC mismatch: stored={stored_crc:08x}, computed={computed_crc:08x}"
        )));
    }

    let header_len = MAGIC.len() + 1 + 4;
    if bytes.len() != header_len + len + 4 {
        return Err(corrupt(format!(
            "{} trailing bytes after frame",
            bytes.len() - (header_len + len + 4)
        )));
    }

    serde_json::from_slice(&data).map_err(|e| corrupt(format!("deserialization failed: {e}")))
}
