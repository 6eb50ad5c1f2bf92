use std::sync::Arc;
use std::time::Duration;

use camino::Utf8Path;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use tokio_util::sync::CancellationToken;
use tracklog_app_core::SyncOrchestrator;
use tracklog_core::entities::{rel, Activity, Interaction, Person, Trip};
use tracklog_core::{EntityKind, LocalId, RecordMeta, SyncRecord, SyncStatus, Window};
use tracklog_persistence::{LocalStore, MemoryStore, RedbLocalStore};
use tracklog_pipeline::{
    InMemoryCollection, RemoteCollection, RemoteError, SyncError, SyncOptions,
    SyncScope, Syncer,
};

// ============================================================================
// Helpers
// ============================================================================

fn at(hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 10, hour, 0, 0).unwrap()
}

fn march_10() -> SyncScope {
    SyncScope::window(Window::days(NaiveDate::from_ymd_opt(2024, 3, 10).unwrap(), 1).unwrap())
}

struct Remotes {
    activities: Arc<InMemoryCollection<Activity>>,
    trips: Arc<InMemoryCollection<Trip>>,
}

impl Remotes {
    fn new() -> Self {
        Self {
            activities: Arc::new(InMemoryCollection::new().with_next_id(55)),
            trips: Arc::new(InMemoryCollection::new()),
        }
    }
}

/// Activity -3 with a trip under it, both never pushed.
fn seed_parent_and_child<S: LocalStore>(store: &mut S) {
    let mut activity = Activity::draft("Site visit", Some(at(8)));
    activity.meta = RecordMeta::local(-3);
    store.insert(&activity).unwrap();

    let mut trip = Trip::draft(-3, Some(at(9)));
    trip.meta = RecordMeta::local(-1);
    trip.origin = Some("Depot".into());
    store.insert(&trip).unwrap();
}

fn trip_ids<S: LocalStore>(store: &S) -> Vec<LocalId> {
    store.ids::<Trip>().unwrap()
}

// ============================================================================
// Cycle ordering
// ============================================================================

#[tokio::test]
async fn test_child_is_pushed_with_parent_permanent_id() {
    let remotes = Remotes::new();
    let mut orchestrator = SyncOrchestrator::new(MemoryStore::new(), SyncOptions::default());
    orchestrator
        .register(Syncer::<Activity, _>::windowed(remotes.activities.clone()))
        .register(Syncer::<Trip, _>::windowed(remotes.trips.clone()));
    seed_parent_and_child(orchestrator.store_mut());

    let report = orchestrator.sync(&march_10()).await.unwrap();

    let activity_push = report.push_for(EntityKind::Activity).unwrap();
    assert_eq!(activity_push.remap.get(-3), Some(55));
    assert_eq!(report.push_for(EntityKind::Trip).unwrap().created, 1);
    assert_eq!(report.remapped, 1);

    let store = orchestrator.store();
    let activity: Activity = store.get(55).unwrap().unwrap();
    assert_eq!(activity.status(), SyncStatus::Synced);
    assert!(store.get::<Activity>(-3).unwrap().is_none());

    let trip_id = trip_ids(store)[0];
    assert!(trip_id > 0);
    let trip: Trip = store.get(trip_id).unwrap().unwrap();
    assert_eq!(trip.instance(), Some(55));
    assert_eq!(trip.status(), SyncStatus::Synced);
    assert_eq!(remotes.trips.row(trip_id).unwrap()["instance_id"], 55);

    // The pull phase linked the trip to its activity.
    assert_eq!(
        trip.relations.resolved(rel::INSTANCE).map(|t| t.label.as_str()),
        Some("Site visit")
    );
    assert!(!store.has_unsaved_changes());
}

#[tokio::test]
async fn test_child_registered_first_catches_up_next_cycle() {
    let remotes = Remotes::new();
    let mut orchestrator = SyncOrchestrator::new(MemoryStore::new(), SyncOptions::default());
    orchestrator
        .register(Syncer::<Trip, _>::windowed(remotes.trips.clone()))
        .register(Syncer::<Activity, _>::windowed(remotes.activities.clone()));
    seed_parent_and_child(orchestrator.store_mut());

    let first = orchestrator.sync(&march_10()).await.unwrap();
    assert_eq!(first.push_for(EntityKind::Trip).unwrap().skipped, 1);
    assert_eq!(first.remapped, 1);
    let waiting: Trip = orchestrator.store().get(-1).unwrap().unwrap();
    assert_eq!(waiting.instance(), Some(55));
    assert_eq!(waiting.status(), SyncStatus::Local);

    let second = orchestrator.sync(&march_10()).await.unwrap();
    assert_eq!(second.push_for(EntityKind::Trip).unwrap().created, 1);
    assert!(trip_ids(orchestrator.store()).iter().all(|id| *id > 0));
}

#[tokio::test]
async fn test_idle_cycle_changes_nothing() {
    let remotes = Remotes::new();
    let mut orchestrator = SyncOrchestrator::new(MemoryStore::new(), SyncOptions::default());
    orchestrator
        .register(Syncer::<Activity, _>::windowed(remotes.activities.clone()))
        .register(Syncer::<Trip, _>::windowed(remotes.trips.clone()));
    seed_parent_and_child(orchestrator.store_mut());
    orchestrator.sync(&march_10()).await.unwrap();
    let before = orchestrator.store().all::<Trip>().unwrap();

    let report = orchestrator.sync(&march_10()).await.unwrap();
    assert!(report.pushes.iter().all(|p| p.is_noop()));
    assert_eq!(report.remapped, 0);
    assert_eq!(orchestrator.store().all::<Trip>().unwrap(), before);
}

#[tokio::test]
async fn test_windowed_kinds_need_a_window() {
    let remotes = Remotes::new();
    let mut orchestrator = SyncOrchestrator::new(MemoryStore::new(), SyncOptions::default());
    orchestrator.register(Syncer::<Activity, _>::windowed(remotes.activities.clone()));

    let err = orchestrator.sync(&SyncScope::default()).await.unwrap_err();
    assert!(matches!(
        err,
        SyncError::MissingWindow {
            kind: EntityKind::Activity
        }
    ));
}

#[tokio::test]
async fn test_edits_go_through_the_orchestrator_store() {
    let people = Arc::new(InMemoryCollection::<Person>::new());
    let mut orchestrator = SyncOrchestrator::new(MemoryStore::new(), SyncOptions::default());
    orchestrator.register(Syncer::<Person, _>::catalogue(people.clone()));

    let id = orchestrator.edits().create(Person::draft("Ada")).unwrap();
    assert!(id < 0);
    let report = orchestrator.sync(&SyncScope::default()).await.unwrap();

    assert_eq!(report.push_for(EntityKind::Person).unwrap().created, 1);
    assert_eq!(report.pull_for(EntityKind::Person).unwrap().updated, 1);
    assert_eq!(people.ids(), vec![1]);
}

// ============================================================================
// Cancellation
// ============================================================================

#[tokio::test]
async fn test_cancelled_before_start_touches_nothing() {
    let remotes = Remotes::new();
    let mut orchestrator = SyncOrchestrator::new(MemoryStore::new(), SyncOptions::default());
    orchestrator.register(Syncer::<Activity, _>::windowed(remotes.activities.clone()));
    seed_parent_and_child(orchestrator.store_mut());

    let token = CancellationToken::new();
    token.cancel();
    let err = orchestrator
        .sync_with_cancel(&march_10(), &token)
        .await
        .unwrap_err();

    assert!(matches!(err, SyncError::Cancelled));
    assert!(remotes.activities.calls().is_empty());
    let activity: Activity = orchestrator.store().get(-3).unwrap().unwrap();
    assert_eq!(activity.status(), SyncStatus::Local);
}

/// Accepts every request and never answers.
struct Stalled;

#[async_trait::async_trait]
impl<R: SyncRecord> RemoteCollection<R> for Stalled {
    fn name(&self) -> &str {
        "stalled"
    }

    async fn fetch(&self, _include_archived: bool) -> Result<Vec<R::Dto>, RemoteError> {
        std::future::pending().await
    }

    async fn fetch_for_window(&self, _window: &Window) -> Result<Vec<R::Dto>, RemoteError> {
        std::future::pending().await
    }

    async fn create(&self, _payload: &R::Payload) -> Result<R::Dto, RemoteError> {
        std::future::pending().await
    }

    async fn update(&self, _id: LocalId, _payload: &R::Payload) -> Result<R::Dto, RemoteError> {
        std::future::pending().await
    }

    async fn delete(&self, _id: LocalId) -> Result<bool, RemoteError> {
        std::future::pending().await
    }
}

fn cancel_after(delay: Duration) -> CancellationToken {
    let token = CancellationToken::new();
    let trigger = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        trigger.cancel();
    });
    token
}

#[tokio::test]
async fn test_cancel_mid_push_leaves_records_syncing() {
    let mut orchestrator = SyncOrchestrator::new(MemoryStore::new(), SyncOptions::default());
    orchestrator.register(Syncer::<Person, _>::catalogue(Stalled));
    let id = orchestrator.edits().create(Person::draft("Ada")).unwrap();

    let token = cancel_after(Duration::from_millis(20));
    let err = orchestrator
        .sync_with_cancel(&SyncScope::default(), &token)
        .await
        .unwrap_err();
    assert!(matches!(err, SyncError::Cancelled));

    let person: Person = orchestrator.store().get(id).unwrap().unwrap();
    assert_eq!(person.status(), SyncStatus::Syncing);
    assert!(person.status().is_push_candidate());
}

#[tokio::test]
async fn test_cancel_during_later_push_keeps_children_remapped() {
    let dir = tempfile::tempdir().unwrap();
    let root = Utf8Path::from_path(dir.path()).unwrap();
    let activities = Arc::new(InMemoryCollection::<Activity>::new().with_next_id(55));
    let interactions = Arc::new(InMemoryCollection::<Interaction>::new());

    {
        let mut orchestrator =
            SyncOrchestrator::new(RedbLocalStore::open(root).unwrap(), SyncOptions::default());
        orchestrator
            .register(Syncer::<Activity, _>::windowed(activities.clone()))
            .register(Syncer::<Trip, _>::windowed(Stalled))
            .register(Syncer::<Interaction, _>::windowed(interactions.clone()));
        seed_parent_and_child(orchestrator.store_mut());
        let mut call = Interaction::draft(Some(1), Some(at(10)));
        call.meta = RecordMeta::local(-1);
        call.relations.set_key(rel::INSTANCE, Some(-3));
        orchestrator.store_mut().insert(&call).unwrap();
        orchestrator.store_mut().save().unwrap();

        let token = cancel_after(Duration::from_millis(20));
        let err = orchestrator
            .sync_with_cancel(&march_10(), &token)
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::Cancelled));
        assert_eq!(activities.ids(), vec![55]);
        assert!(interactions.calls().is_empty());
    }

    // Only what was saved before the cancellation is left.
    let mut store = RedbLocalStore::open(root).unwrap();
    assert!(store.get::<Activity>(-3).unwrap().is_none());
    let call: Interaction = store.get(-1).unwrap().unwrap();
    assert_eq!(call.instance(), Some(55));
    let trip: Trip = store.get(-1).unwrap().unwrap();
    assert_eq!(trip.instance(), Some(55));
    assert_eq!(trip.status(), SyncStatus::Local);

    // The pushed activity's temporary id is not handed out again.
    assert_eq!(store.allocate_temporary_id::<Activity>().unwrap(), -4);
}

// ============================================================================
// On-disk store
// ============================================================================

#[tokio::test]
async fn test_cycle_results_survive_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let root = Utf8Path::from_path(dir.path()).unwrap();
    let remotes = Remotes::new();

    {
        let mut orchestrator =
            SyncOrchestrator::new(RedbLocalStore::open(root).unwrap(), SyncOptions::default());
        orchestrator
            .register(Syncer::<Activity, _>::windowed(remotes.activities.clone()))
            .register(Syncer::<Trip, _>::windowed(remotes.trips.clone()));
        seed_parent_and_child(orchestrator.store_mut());
        orchestrator.sync(&march_10()).await.unwrap();
    }

    let reopened = RedbLocalStore::open(root).unwrap();
    let activity: Activity = reopened.get(55).unwrap().unwrap();
    assert_eq!(activity.status(), SyncStatus::Synced);
    let trips = reopened.all::<Trip>().unwrap();
    assert_eq!(trips.len(), 1);
    assert_eq!(trips[0].instance(), Some(55));
}
