use std::collections::{BTreeMap, BTreeSet};

use tracklog_core::{is_temporary, next_temporary_id, EntityKind, LocalId, SyncRecord};

use crate::codec::{decode_record, encode_record};
use crate::{LocalStore, SortOrder, StorageError};

/// Encoded rows per entity kind plus the ids touched since the last save.
#[derive(Debug, Default, Clone)]
pub(crate) struct Tables {
    rows: BTreeMap<EntityKind, BTreeMap<LocalId, Vec<u8>>>,
    dirty: BTreeMap<EntityKind, BTreeSet<LocalId>>,
    /// Lowest temporary id ever handed out per kind.
    temp_floors: BTreeMap<EntityKind, LocalId>,
    floors_dirty: bool,
}

impl Tables {
    pub(crate) fn load_row(&mut self, kind: EntityKind, id: LocalId, bytes: Vec<u8>) {
        self.rows.entry(kind).or_default().insert(id, bytes);
    }

    pub(crate) fn row(&self, kind: EntityKind, id: LocalId) -> Option<&[u8]> {
        self.rows
            .get(&kind)
            .and_then(|t| t.get(&id))
            .map(Vec::as_slice)
    }

    pub(crate) fn dirty(&self) -> &BTreeMap<EntityKind, BTreeSet<LocalId>> {
        &self.dirty
    }

    pub(crate) fn clear_dirty(&mut self) {
        self.dirty.clear();
        self.floors_dirty = false;
    }

    pub(crate) fn is_dirty(&self) -> bool {
        self.floors_dirty || self.dirty.values().any(|ids| !ids.is_empty())
    }

    pub(crate) fn load_temp_floor(&mut self, kind: EntityKind, floor: LocalId) {
        self.temp_floors.insert(kind, floor);
    }

    pub(crate) fn temp_floors(&self) -> &BTreeMap<EntityKind, LocalId> {
        &self.temp_floors
    }

    /// Ids only count down, so a deleted or re-keyed record never hands its
    /// temporary id to a newer one.
    pub(crate) fn allocate_temporary_id(&mut self, kind: EntityKind) -> LocalId {
        let lowest_row = self
            .rows
            .get(&kind)
            .and_then(|t| t.keys().next().copied());
        let floor = self.temp_floors.get(&kind).copied();
        let id = next_temporary_id(lowest_row.into_iter().chain(floor));
        self.temp_floors.insert(kind, id);
        self.floors_dirty = true;
        id
    }

    pub(crate) fn query<R: SyncRecord>(
        &self,
        filter: &dyn Fn(&R) -> bool,
        sort: SortOrder,
    ) -> Result<Vec<R>, StorageError> {
        let mut out = Vec::new();
        if let Some(rows) = self.rows.get(&R::KIND) {
            for (id, bytes) in rows {
                let record: R = decode_record(*id, bytes)?;
                if filter(&record) {
                    out.push(record);
                }
            }
        }
        if sort == SortOrder::Start {
            out.sort_by_key(|r| {
                let start = r.span().map(|s| s.start);
                (start.is_none(), start)
            });
        }
        Ok(out)
    }

    pub(crate) fn get<R: SyncRecord>(&self, id: LocalId) -> Result<Option<R>, StorageError> {
        self.row(R::KIND, id)
            .map(|bytes| decode_record::<R>(id, bytes))
            .transpose()
    }

    pub(crate) fn insert<R: SyncRecord>(&mut self, record: &R) -> Result<(), StorageError> {
        let id = record.local_id();
        let bytes = encode_record(record)?;
        self.rows.entry(R::KIND).or_default().insert(id, bytes);
        self.dirty.entry(R::KIND).or_default().insert(id);
        let below_floor = self.temp_floors.get(&R::KIND).map_or(true, |floor| id < *floor);
        if is_temporary(id) && below_floor {
            self.temp_floors.insert(R::KIND, id);
            self.floors_dirty = true;
        }
        Ok(())
    }

    pub(crate) fn delete<R: SyncRecord>(&mut self, id: LocalId) -> bool {
        let removed = self
            .rows
            .get_mut(&R::KIND)
            .is_some_and(|t| t.remove(&id).is_some());
        if removed {
            self.dirty.entry(R::KIND).or_default().insert(id);
        }
        removed
    }
}

/// Volatile store used by tests and dry runs. `save` only clears the dirty set.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    tables: Tables,
    saves: usize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `save` calls that had pending changes.
    pub fn save_count(&self) -> usize {
        self.saves
    }
}

impl LocalStore for MemoryStore {
    fn query<R: SyncRecord>(
        &self,
        filter: &dyn Fn(&R) -> bool,
        sort: SortOrder,
    ) -> Result<Vec<R>, StorageError> {
        self.tables.query(filter, sort)
    }

    fn get<R: SyncRecord>(&self, local_id: LocalId) -> Result<Option<R>, StorageError> {
        self.tables.get(local_id)
    }

    fn insert<R: SyncRecord>(&mut self, record: &R) -> Result<(), StorageError> {
        self.tables.insert(record)
    }

    fn delete<R: SyncRecord>(&mut self, local_id: LocalId) -> Result<bool, StorageError> {
        Ok(self.tables.delete::<R>(local_id))
    }

    fn allocate_temporary_id<R: SyncRecord>(&mut self) -> Result<LocalId, StorageError> {
        Ok(self.tables.allocate_temporary_id(R::KIND))
    }

    fn save(&mut self) -> Result<(), StorageError> {
        if self.tables.is_dirty() {
            self.saves += 1;
            self.tables.clear_dirty();
        }
        Ok(())
    }

    fn has_unsaved_changes(&self) -> bool {
        self.tables.is_dirty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use tracklog_core::entities::{Activity, Person};
    use tracklog_core::{RecordMeta, SyncStatus};

    fn activity(id: LocalId, hour: Option<u32>) -> Activity {
        let start = hour.map(|h| Utc.with_ymd_and_hms(2024, 3, 10, h, 0, 0).unwrap());
        let mut a = Activity::draft(format!("a{id}"), start);
        a.meta = RecordMeta::local(id);
        a
    }

    #[test]
    fn kinds_do_not_share_rows() {
        let mut store = MemoryStore::new();
        store.insert(&activity(1, Some(8))).unwrap();
        let mut person = Person::draft("Ada");
        person.meta = RecordMeta::synced(1);
        store.insert(&person).unwrap();

        assert_eq!(store.all::<Activity>().unwrap().len(), 1);
        assert_eq!(store.get::<Person>(1).unwrap().unwrap().name, "Ada");
        assert!(store.delete::<Person>(1).unwrap());
        assert!(store.get::<Activity>(1).unwrap().is_some());
    }

    #[test]
    fn start_order_puts_undated_last() {
        let mut store = MemoryStore::new();
        store.insert(&activity(1, None)).unwrap();
        store.insert(&activity(2, Some(14))).unwrap();
        store.insert(&activity(3, Some(9))).unwrap();

        let ids: Vec<_> = store
            .query::<Activity>(&|_| true, SortOrder::Start)
            .unwrap()
            .iter()
            .map(|a| a.local_id())
            .collect();
        assert_eq!(ids, vec![3, 2, 1]);
    }

    #[test]
    fn save_tracks_pending_changes() {
        let mut store = MemoryStore::new();
        assert!(!store.has_unsaved_changes());
        store.insert(&activity(-1, Some(8))).unwrap();
        assert!(store.has_unsaved_changes());
        store.save().unwrap();
        store.save().unwrap();
        assert_eq!(store.save_count(), 1);

        assert!(!store.delete::<Activity>(99).unwrap());
        assert!(!store.has_unsaved_changes());

        let synced = store
            .query::<Activity>(&|a| a.status() == SyncStatus::Synced, SortOrder::LocalId)
            .unwrap();
        assert!(synced.is_empty());
    }

    #[test]
    fn unreadable_row_names_the_record() {
        let mut store = MemoryStore::new();
        store.tables.load_row(EntityKind::Person, 8, b"{not json".to_vec());

        let err = store.get::<Person>(8).unwrap_err();
        assert!(matches!(
            err,
            StorageError::Decode {
                kind: EntityKind::Person,
                local_id: 8,
                ..
            }
        ));
        assert!(store.all::<Person>().is_err());
    }

    #[test]
    fn temporary_ids_are_never_reused() {
        let mut store = MemoryStore::new();
        let first = store.allocate_temporary_id::<Activity>().unwrap();
        store.insert(&activity(first, Some(8))).unwrap();
        assert!(store.delete::<Activity>(first).unwrap());

        let second = store.allocate_temporary_id::<Activity>().unwrap();
        assert_eq!((first, second), (-1, -2));
        assert_eq!(store.allocate_temporary_id::<Person>().unwrap(), -1);

        store.save().unwrap();
        assert!(!store.has_unsaved_changes());
        store.allocate_temporary_id::<Activity>().unwrap();
        assert!(store.has_unsaved_changes());
    }
}
