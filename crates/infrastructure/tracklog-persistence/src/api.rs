use tracklog_core::{LocalId, SyncRecord};

use crate::StorageError;

pub const TRACKLOG_REDB_FILENAME: &str = "tracklog.redb";
pub const CURRENT_SCHEMA: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DbState {
    Missing,
    Valid,
    Busy,
    Corrupt,
    NewerSchema { found: u32, supported: u32 },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortOrder {
    /// Ascending local id; temporary records come first.
    #[default]
    LocalId,
    /// Ascending span start; records without a span sort last.
    Start,
}

/// On-device cache of synced records.
///
/// Reads and writes go to an in-memory working set; `save` makes pending
/// changes durable. Only one writer exists at a time, enforced by `&mut self`.
pub trait LocalStore: Send + Sync + 'static {
    fn query<R: SyncRecord>(
        &self,
        filter: &dyn Fn(&R) -> bool,
        sort: SortOrder,
    ) -> Result<Vec<R>, StorageError>;

    fn get<R: SyncRecord>(&self, local_id: LocalId) -> Result<Option<R>, StorageError>;

    /// Upsert keyed by the record's local id.
    fn insert<R: SyncRecord>(&mut self, record: &R) -> Result<(), StorageError>;

    /// Returns whether a record was removed.
    fn delete<R: SyncRecord>(&mut self, local_id: LocalId) -> Result<bool, StorageError>;

    /// Next temporary id for `R`. Ids count down per kind and are never
    /// handed out twice, even after the record holding one is deleted.
    fn allocate_temporary_id<R: SyncRecord>(&mut self) -> Result<LocalId, StorageError>;

    fn save(&mut self) -> Result<(), StorageError>;

    fn has_unsaved_changes(&self) -> bool;

    fn all<R: SyncRecord>(&self) -> Result<Vec<R>, StorageError> {
        self.query(&|_: &R| true, SortOrder::LocalId)
    }

    fn ids<R: SyncRecord>(&self) -> Result<Vec<LocalId>, StorageError> {
        Ok(self.all::<R>()?.iter().map(|r| r.local_id()).collect())
    }
}
