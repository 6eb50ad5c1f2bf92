use tracklog_core::{LocalId, SyncRecord};

use crate::StorageError;

pub fn encode_record<R: SyncRecord>(record: &R) -> Result<Vec<u8>, StorageError> {
    serde_json::to_vec(record).map_err(|source| StorageError::Encode {
        kind: R::KIND,
        local_id: record.local_id(),
        source,
    })
}

pub fn decode_record<R: SyncRecord>(local_id: LocalId, bytes: &[u8]) -> Result<R, StorageError> {
    serde_json::from_slice(bytes).map_err(|source| StorageError::Decode {
        kind: R::KIND,
        local_id,
        source,
    })
}
