use camino::Utf8PathBuf;
use chrono::{TimeZone, Utc};
use tracklog_core::entities::{Activity, Trip};
use tracklog_core::{RecordMeta, SyncRecord, SyncStatus};
use tracklog_persistence::{LocalStore, RedbLocalStore, SortOrder};

fn root() -> (tempfile::TempDir, Utf8PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();
    (dir, root)
}

#[test]
fn saved_rows_survive_reopen_and_unsaved_rows_do_not() {
    let (_dir, root) = root();
    let started = Utc.with_ymd_and_hms(2024, 3, 10, 8, 0, 0).unwrap();

    {
        let mut store = RedbLocalStore::open(&root).unwrap();
        let mut activity = Activity::draft("Ride", Some(started));
        activity.meta = RecordMeta::local(-1);
        store.insert(&activity).unwrap();

        let mut trip = Trip::draft(-1, Some(started));
        trip.meta = RecordMeta::local(-1);
        store.insert(&trip).unwrap();
        store.save().unwrap();
        assert!(!store.has_unsaved_changes());

        let mut other = Activity::draft("Never saved", Some(started));
        other.meta = RecordMeta::local(-2);
        store.insert(&other).unwrap();
        assert!(store.has_unsaved_changes());
    }

    let store = RedbLocalStore::open(&root).unwrap();
    let activities = store.all::<Activity>().unwrap();
    assert_eq!(activities.len(), 1);
    assert_eq!(activities[0].title, "Ride");
    assert_eq!(activities[0].status(), SyncStatus::Local);

    let trip = store.get::<Trip>(-1).unwrap().unwrap();
    assert_eq!(trip.instance(), Some(-1));
}

#[test]
fn deletes_and_rekeys_are_persisted() {
    let (_dir, root) = root();
    let started = Utc.with_ymd_and_hms(2024, 3, 10, 8, 0, 0).unwrap();

    {
        let mut store = RedbLocalStore::open(&root).unwrap();
        let mut activity = Activity::draft("Ride", Some(started));
        activity.meta = RecordMeta::local(-4);
        store.insert(&activity).unwrap();
        store.save().unwrap();

        assert!(store.delete::<Activity>(-4).unwrap());
        activity.meta = RecordMeta::synced(40);
        store.insert(&activity).unwrap();
        store.save().unwrap();
    }

    let store = RedbLocalStore::open(&root).unwrap();
    let ids: Vec<_> = store
        .query::<Activity>(&|_| true, SortOrder::LocalId)
        .unwrap()
        .iter()
        .map(|a| a.local_id())
        .collect();
    assert_eq!(ids, vec![40]);
}

#[test]
fn temporary_ids_keep_counting_down_after_reopen() {
    let (_dir, root) = root();

    {
        let mut store = RedbLocalStore::open(&root).unwrap();
        let id = store.allocate_temporary_id::<Activity>().unwrap();
        let mut activity = Activity::draft("Pushed", None);
        activity.meta = RecordMeta::local(id);
        store.insert(&activity).unwrap();

        // Re-keyed by a push: no temporary row is left behind.
        assert!(store.delete::<Activity>(id).unwrap());
        activity.meta = RecordMeta::synced(55);
        store.insert(&activity).unwrap();
        store.save().unwrap();
    }

    let mut store = RedbLocalStore::open(&root).unwrap();
    assert_eq!(store.allocate_temporary_id::<Activity>().unwrap(), -2);
    assert_eq!(store.allocate_temporary_id::<Trip>().unwrap(), -1);
}
