//! Merkle Integrity content encoding (`mi-sha256-03`).
//!
//! The payload is cut into fixed-size records. Proofs are chained from the
//! last record backwards so that a streaming reader holding the top-level
//! digest can verify every record as soon as it arrives.

use base64::engine::{general_purpose::STANDARD as BASE64, Engine};
use sha2::{Digest, Sha256};

use crate::error::{Error, Result};

/// Content-coding name advertised in `content-encoding`.
pub const CONTENT_ENCODING: &str = "mi-sha256-03";

/// Record size used for every exchange served by this deployment.
pub const DEFAULT_RECORD_SIZE: usize = 4096;

/// One record of an encoded payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    /// Proof covering this record and everything after it.
    pub proof: [u8; 32],
    /// Number of payload bytes in this record.
    pub len: usize,
}

/// Result of running a payload through the MI encoder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedPayload {
    /// Record size the payload was cut with.
    pub record_size: usize,
    /// Records in payload order.
    pub records: Vec<Record>,
    /// Digest of the whole payload, which is the proof of the first record.
    pub digest: [u8; 32],
    /// The wire body: record size prefix, records interleaved with proofs.
    pub body: Vec<u8>,
}

impl EncodedPayload {
    /// Value of the `digest` response header, e.g. `mi-sha256-03=base64...`.
    pub fn digest_header(&self) -> String {
        format!("{CONTENT_ENCODING}={}", BASE64.encode(self.digest))
    }
}

/// Encodes `payload` with records of at most `record_size` bytes.
///
/// # Arguments
///
/// * `payload` - The response body to encode.
/// * `record_size` - Maximum record length in bytes. Must be non-zero.
///
/// # Returns
///
/// The encoded payload. An empty payload yields a single empty record.
pub fn encode(payload: &[u8], record_size: usize) -> Result<EncodedPayload> {
    if record_size == 0 {
        return Err(Error::encoding("record size must be positive"));
    }

    let chunks: Vec<&[u8]> = if payload.is_empty() {
        vec![payload]
    } else {
        payload.chunks(record_size).collect()
    };

    let mut proofs = vec![[0u8; 32]; chunks.len()];
    let last = chunks.len() - 1;
    proofs[last] = record_proof(chunks[last], None);
    for i in (0..last).rev() {
        proofs[i] = record_proof(chunks[i], Some(&proofs[i + 1]));
    }

    let mut body = Vec::with_capacity(8 + payload.len() + 32 * last);
    body.extend_from_slice(&(record_size as u64).to_be_bytes());
    for (i, chunk) in chunks.iter().enumerate() {
        body.extend_from_slice(chunk);
        if i < last {
            body.extend_from_slice(&proofs[i + 1]);
        }
    }

    let records = chunks
        .iter()
        .zip(proofs.iter())
        .map(|(chunk, proof)| Record {
            proof: *proof,
            len: chunk.len(),
        })
        .collect();

    log::trace!(
        "MI encoded {} bytes into {} records of up to {record_size} bytes",
        payload.len(),
        chunks.len()
    );

    Ok(EncodedPayload {
        record_size,
        records,
        digest: proofs[0],
        body,
    })
}

fn record_proof(record: &[u8], next: Option<&[u8; 32]>) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(record);
    match next {
        Some(next) => {
            hasher.update(next);
            hasher.update([1u8]);
        }
        None => hasher.update([0u8]),
    }
    hasher.finalize().into()
}
