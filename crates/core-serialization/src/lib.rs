//! Serialization helpers for the persisted vector index.
//!
//! Two encodings are supported and auto-detected on decode:
//!
//! * **Binary**: `b"LSIX"` magic, `u16` LE format version, SHA-256 digest of
//!   the payload (32 bytes), then the bincode payload. Lossless for `f32`.
//! * **JSON**: `{"version", "dimension", "entries": [{"log", "embedding"}]}`.
//!   A bare array of `{"log", "embedding"}` objects (the layout written by
//!   earlier tooling) is accepted on read as well.

pub use core_types::config::IndexFormat;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

pub const MAGIC: &[u8; 4] = b"LSIX";
pub const FORMAT_VERSION: u16 = 1;

const DIGEST_LEN: usize = 32;
const HEADER_LEN: usize = MAGIC.len() + 2 + DIGEST_LEN;

/// Wire representation of one indexed log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexEntryWire {
    pub log: String,
    pub embedding: Vec<f32>,
}

/// Whole-index payload as written to durable storage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexFile {
    pub version: u16,
    pub dimension: u32,
    pub entries: Vec<IndexEntryWire>,
}

impl IndexFile {
    pub fn new(dimension: u32, entries: Vec<IndexEntryWire>) -> Self {
        Self {
            version: FORMAT_VERSION,
            dimension,
            entries,
        }
    }
}

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("index data is truncated ({0} bytes)")]
    Truncated(usize),
    #[error("unsupported index format version {0}")]
    UnsupportedVersion(u16),
    #[error("index payload digest mismatch")]
    DigestMismatch,
    #[error("unrecognized index encoding")]
    UnknownFormat,
    #[error("bincode payload error: {0}")]
    Bincode(#[from] bincode::Error),
    #[error("json payload error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Encode an index file using the requested format.
pub fn encode(file: &IndexFile, format: IndexFormat) -> Result<Vec<u8>, CodecError> {
    match format {
        IndexFormat::Binary => {
            let payload = bincode::serialize(file)?;
            let digest = Sha256::digest(&payload);
            let mut out = Vec::with_capacity(HEADER_LEN + payload.len());
            out.extend_from_slice(MAGIC);
            out.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
            out.extend_from_slice(digest.as_slice());
            out.extend_from_slice(&payload);
            Ok(out)
        }
        IndexFormat::Json => Ok(serde_json::to_vec_pretty(file)?),
    }
}

/// Decode bytes written by [`encode`] (or the legacy JSON array layout).
pub fn decode(bytes: &[u8]) -> Result<IndexFile, CodecError> {
    if bytes.starts_with(MAGIC) {
        return decode_binary(bytes);
    }

    match bytes.iter().find(|b| !b.is_ascii_whitespace()) {
        Some(b'{') => {
            let file: IndexFile = serde_json::from_slice(bytes)?;
            if file.version > FORMAT_VERSION {
                return Err(CodecError::UnsupportedVersion(file.version));
            }
            Ok(file)
        }
        Some(b'[') => {
            let entries: Vec<IndexEntryWire> = serde_json::from_slice(bytes)?;
            let dimension = entries.first().map_or(0, |e| e.embedding.len());
            let dimension = u32::try_from(dimension).map_err(|_| CodecError::UnknownFormat)?;
            Ok(IndexFile::new(dimension, entries))
        }
        _ if bytes.len() < MAGIC.len() && MAGIC.starts_with(bytes) => {
            Err(CodecError::Truncated(bytes.len()))
        }
        _ => Err(CodecError::UnknownFormat),
    }
}

fn decode_binary(bytes: &[u8]) -> Result<IndexFile, CodecError> {
    if bytes.len() < HEADER_LEN {
        return Err(CodecError::Truncated(bytes.len()));
    }
    let version = u16::from_le_bytes([bytes[4], bytes[5]]);
    if version != FORMAT_VERSION {
        return Err(CodecError::UnsupportedVersion(version));
    }

    let (digest, payload) = bytes[6..].split_at(DIGEST_LEN);
    if Sha256::digest(payload).as_slice() != digest {
        return Err(CodecError::DigestMismatch);
    }

    Ok(bincode::deserialize(payload)?)
}
