//! Record checksums for the audit trail
//!
//! Records are hashed over a fixed big-endian layout rather than their bincode
//! encoding so the checksum does not depend on serializer versions.

use crate::types::TransactionRecord;
use sha2::{Digest, Sha256};

/// Compute SHA-256 over the canonical content of a record (checksum excluded)
pub fn record_checksum(record: &TransactionRecord) -> [u8; 32] {
    let mut hasher = Sha256::new();

    hasher.update(record.id.value().to_be_bytes());
    hasher.update(record.from_account_id.value().to_be_bytes());
    hasher.update(record.to_account_id.value().to_be_bytes());
    hasher.update(record.amount.serialize());
    hasher.update(record.created_at.timestamp_micros().to_be_bytes());

    match &record.idempotency_key {
        Some(key) => {
            hasher.update([1u8]);
            hasher.update((key.len() as u64).to_be_bytes());
            hasher.update(key.as_bytes());
        }
        None => hasher.update([0u8]),
    }

    hasher.finalize().into()
}
