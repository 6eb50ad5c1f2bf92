use std::collections::BTreeMap;

use tracklog_core::{is_temporary, EntityKind, LocalId, SyncRecord, SyncStatus};
use tracklog_persistence::{LocalStore, StorageError};

#[derive(Debug, thiserror::Error)]
pub enum EditError {
    #[error("{kind} {id} not found")]
    NotFound { kind: EntityKind, id: LocalId },
    #[error("{kind} {id} is pending deletion")]
    PendingDeletion { kind: EntityKind, id: LocalId },
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// User-side mutations of cached records. Changes are not saved here; the
/// caller saves, or the next sync cycle does.
pub struct LocalEdits<'a, S> {
    store: &'a mut S,
}

impl<'a, S: LocalStore> LocalEdits<'a, S> {
    pub fn new(store: &'a mut S) -> Self {
        Self { store }
    }

    /// Inserts a new record under a fresh temporary id and returns that id.
    pub fn create<R: SyncRecord>(&mut self, mut record: R) -> Result<LocalId, EditError> {
        let id = self.store.allocate_temporary_id::<R>()?;
        record.set_local_id(id);
        record.set_status(SyncStatus::Local);
        self.store.insert(&record)?;
        Ok(id)
    }

    pub fn edit<R, F>(&mut self, id: LocalId, f: F) -> Result<R, EditError>
    where
        R: SyncRecord,
        F: FnOnce(&mut R),
    {
        let mut record = self
            .store
            .get::<R>(id)?
            .ok_or(EditError::NotFound { kind: R::KIND, id })?;
        let next = record
            .status()
            .after_local_edit()
            .ok_or(EditError::PendingDeletion { kind: R::KIND, id })?;
        f(&mut record);
        record.set_local_id(id);
        record.set_status(next);
        self.store.insert(&record)?;
        Ok(record)
    }

    /// Never-pushed records disappear at once; the rest wait for the next push.
    pub fn delete<R: SyncRecord>(&mut self, id: LocalId) -> Result<(), EditError> {
        let mut record = self
            .store
            .get::<R>(id)?
            .ok_or(EditError::NotFound { kind: R::KIND, id })?;
        if is_temporary(id) {
            self.store.delete::<R>(id)?;
            return Ok(());
        }
        if record.status() != SyncStatus::ToDelete {
            record.set_status(SyncStatus::ToDelete);
            self.store.insert(&record)?;
        }
        Ok(())
    }

    pub fn pending_counts<R: SyncRecord>(&self) -> Result<BTreeMap<SyncStatus, usize>, EditError> {
        Ok(status_counts::<R, S>(&*self.store)?)
    }
}

/// Number of `R` records per status.
pub fn status_counts<R: SyncRecord, S: LocalStore>(
    store: &S,
) -> Result<BTreeMap<SyncStatus, usize>, StorageError> {
    let mut counts = BTreeMap::new();
    for record in store.all::<R>()? {
        *counts.entry(record.status()).or_insert(0) += 1;
    }
    Ok(counts)
}
