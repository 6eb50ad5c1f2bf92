use camino::Utf8PathBuf;
use tracklog_core::entities::Person;
use tracklog_core::RecordMeta;
use tracklog_persistence::{DbState, LocalStore, RedbLocalStore, StorageErrorKind};

#[test]
fn corrupt_redb_is_quarantined_and_reopen_starts_fresh() {
    let dir = tempfile::tempdir().unwrap();
    let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();
    let db_path = root.join("tracklog.redb");

    std::fs::write(&db_path, b"definitely-not-a-redb-database").unwrap();
    assert_eq!(RedbLocalStore::validate(&root).unwrap(), DbState::Corrupt);

    assert!(!db_path.exists());
    let quarantines: Vec<_> = std::fs::read_dir(&root)
        .unwrap()
        .filter_map(|e| e.ok())
        .filter_map(|e| e.file_name().into_string().ok())
        .filter(|n| n.starts_with("tracklog.redb.corrupt."))
        .collect();
    assert_eq!(quarantines.len(), 1, "expected exactly one quarantine");

    let mut store = RedbLocalStore::open(&root).unwrap();
    assert!(store.all::<Person>().unwrap().is_empty());
    let mut person = Person::draft("Ada");
    person.meta = RecordMeta::synced(3);
    store.insert(&person).unwrap();
    store.save().unwrap();
    assert!(db_path.exists());
}

#[test]
fn open_reports_corrupt_file() {
    let dir = tempfile::tempdir().unwrap();
    let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();
    std::fs::write(root.join("tracklog.redb"), b"garbage").unwrap();

    let err = RedbLocalStore::open(&root).unwrap_err();
    assert_eq!(err.kind(), StorageErrorKind::Corrupt);
    assert!(!root.join("tracklog.redb").exists());
}
