use camino::{Utf8Path, Utf8PathBuf};
use chrono::Utc;
use redb::{Database, ReadableTable, TableDefinition};
use tracklog_core::{EntityKind, LocalId, SyncRecord};

use crate::api::{DbState, CURRENT_SCHEMA, TRACKLOG_REDB_FILENAME};
use crate::maintenance::quarantine_corrupt_file;
use crate::memory::Tables;
use crate::{LocalStore, SortOrder, StorageError};

const META: TableDefinition<&str, &str> = TableDefinition::new("meta");

const META_FORMAT_KEY: &str = "format";
const META_FORMAT_VALUE: &str = "tracklog-redb";
const META_SCHEMA_VERSION: &str = "schema_version";
const META_CREATED_AT: &str = "created_at";
const META_LAST_SAVE_AT: &str = "last_save_at";

fn temp_floor_key(kind: EntityKind) -> String {
    format!("temp_floor.{kind}")
}

fn records_table(kind: EntityKind) -> TableDefinition<'static, i64, &'static [u8]> {
    TableDefinition::new(kind.as_str())
}

/// Local store backed by a single `tracklog.redb` file under the data directory.
///
/// The whole cache is loaded on open; `save` writes the rows touched since the
/// previous save in one write transaction.
pub struct RedbLocalStore {
    path: Utf8PathBuf,
    db: Database,
    tables: Tables,
}

impl std::fmt::Debug for RedbLocalStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedbLocalStore")
            .field("path", &self.path)
            .field("dirty", &self.tables.is_dirty())
            .finish()
    }
}

impl RedbLocalStore {
    pub fn path_for_root(root: &Utf8Path) -> Utf8PathBuf {
        root.join(TRACKLOG_REDB_FILENAME)
    }

    /// Open failures that mean the file is not a readable database, as opposed
    /// to permission or locking problems.
    fn is_corrupt_open_error(err: &redb::DatabaseError) -> bool {
        let redb::DatabaseError::Storage(storage) = err else {
            return false;
        };
        match storage {
            redb::StorageError::Corrupted(_) => true,
            redb::StorageError::Io(io) => {
                use std::io::ErrorKind::{InvalidData, UnexpectedEof};
                matches!(io.kind(), InvalidData | UnexpectedEof)
            }
            _ => false,
        }
    }

    /// Opens the cache under `root`, creating it when missing. A corrupt file is
    /// quarantined and reported as `Corrupt`; the next open starts fresh.
    pub fn open(root: &Utf8Path) -> Result<Self, StorageError> {
        let path = Self::path_for_root(root);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let db = if path.exists() {
            match Database::open(path.as_std_path()) {
                Ok(db) => db,
                Err(e) if Self::is_corrupt_open_error(&e) => {
                    let _ = quarantine_corrupt_file(&path);
                    return Err(StorageError::Corrupt);
                }
                Err(e) => return Err(e.into()),
            }
        } else {
            Database::create(path.as_std_path())?
        };

        if let Err(e) = Self::ensure_schema(&db) {
            drop(db);
            if matches!(e, StorageError::Corrupt) {
                let _ = quarantine_corrupt_file(&path);
            }
            return Err(e);
        }

        let tables = Self::load(&db)?;
        tracing::debug!(%path, "local cache opened");
        Ok(Self { path, db, tables })
    }

    /// Inspects the database file without keeping it open.
    pub fn validate(root: &Utf8Path) -> Result<DbState, StorageError> {
        let path = Self::path_for_root(root);
        if !path.exists() {
            return Ok(DbState::Missing);
        }

        match Database::open(path.as_std_path()) {
            Ok(db) => match Self::ensure_schema(&db) {
                Ok(()) => Ok(DbState::Valid),
                Err(StorageError::NewerSchema { found, supported }) => {
                    Ok(DbState::NewerSchema { found, supported })
                }
                Err(StorageError::Busy) => Ok(DbState::Busy),
                Err(StorageError::Corrupt) => {
                    drop(db);
                    let _ = quarantine_corrupt_file(&path);
                    Ok(DbState::Corrupt)
                }
                Err(e) => Err(e),
            },
            Err(redb::DatabaseError::DatabaseAlreadyOpen) => Ok(DbState::Busy),
            Err(e) if Self::is_corrupt_open_error(&e) => {
                let _ = quarantine_corrupt_file(&path);
                Ok(DbState::Corrupt)
            }
            Err(e) => Err(e.into()),
        }
    }

    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    fn ensure_schema(db: &Database) -> Result<(), StorageError> {
        let write_tx = db.begin_write()?;
        {
            let mut meta = write_tx.open_table(META)?;
            Self::stamp_format(&mut meta)?;
        }
        Self::create_record_tables(&write_tx)?;
        write_tx.commit()?;

        let read_tx = db.begin_read()?;
        let meta = read_tx.open_table(META)?;
        let found = meta
            .get(META_SCHEMA_VERSION)?
            .and_then(|g| g.value().parse::<u32>().ok());
        match found {
            Some(version) if version == CURRENT_SCHEMA => Ok(()),
            Some(version) if version > CURRENT_SCHEMA => Err(StorageError::NewerSchema {
                found: version,
                supported: CURRENT_SCHEMA,
            }),
            _ => Err(StorageError::Corrupt),
        }
    }

    /// Writes the format marker into a fresh file; refuses files written by
    /// something else.
    fn stamp_format(
        meta: &mut redb::Table<'_, &'static str, &'static str>,
    ) -> Result<(), StorageError> {
        let format = meta.get(META_FORMAT_KEY)?.map(|g| g.value().to_string());
        match format.as_deref() {
            Some(META_FORMAT_VALUE) => Ok(()),
            Some(_) => Err(StorageError::Corrupt),
            None => {
                let created_at = Utc::now().to_rfc3339();
                meta.insert(META_FORMAT_KEY, META_FORMAT_VALUE)?;
                meta.insert(META_SCHEMA_VERSION, CURRENT_SCHEMA.to_string().as_str())?;
                meta.insert(META_CREATED_AT, created_at.as_str())?;
                Ok(())
            }
        }
    }

    fn create_record_tables(write_tx: &redb::WriteTransaction) -> Result<(), StorageError> {
        for kind in EntityKind::ALL {
            write_tx.open_table(records_table(kind))?;
        }
        Ok(())
    }

    fn load(db: &Database) -> Result<Tables, StorageError> {
        let mut tables = Tables::default();
        let read_tx = db.begin_read()?;
        for kind in EntityKind::ALL {
            let table = read_tx.open_table(records_table(kind))?;
            for row in table.iter()? {
                let (k, v) = row?;
                tables.load_row(kind, k.value(), v.value().to_vec());
            }
        }
        let meta = read_tx.open_table(META)?;
        for kind in EntityKind::ALL {
            let floor = meta
                .get(temp_floor_key(kind).as_str())?
                .and_then(|g| g.value().parse::<LocalId>().ok());
            if let Some(floor) = floor {
                tables.load_temp_floor(kind, floor);
            }
        }
        Ok(tables)
    }
}

impl LocalStore for RedbLocalStore {
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
        if !self.tables.is_dirty() {
            return Ok(());
        }
        let mut written = 0usize;
        let write_tx = self.db.begin_write()?;
        {
            for (kind, ids) in self.tables.dirty() {
                let mut table = write_tx.open_table(records_table(*kind))?;
                for id in ids {
                    match self.tables.row(*kind, *id) {
                        Some(bytes) => {
                            table.insert(*id, bytes)?;
                        }
                        None => {
                            let _ = table.remove(*id)?;
                        }
                    }
                    written += 1;
                }
            }
            let ts = Utc::now().to_rfc3339();
            let mut meta = write_tx.open_table(META)?;
            for (kind, floor) in self.tables.temp_floors() {
                meta.insert(temp_floor_key(*kind).as_str(), floor.to_string().as_str())?;
            }
            meta.insert(META_LAST_SAVE_AT, ts.as_str())?;
        }
        write_tx.commit()?;
        self.tables.clear_dirty();
        tracing::debug!(rows = written, path = %self.path, "local cache saved");
        Ok(())
    }

    fn has_unsaved_changes(&self) -> bool {
        self.tables.is_dirty()
    }
}
