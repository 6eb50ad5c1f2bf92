use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

pub mod entities;
pub mod reconcile;
pub mod relations;
pub mod remap;
pub mod window;

pub use relations::{Incomplete, Relation, RelationSpec, RelationTarget, Relations};
pub use remap::{next_temporary_id, RemapTable};
pub use window::{InvalidWindow, Span, SpanColumns, Window};

/// Primary key in the local store. Negative values are temporary ids handed out
/// at local creation; non-negative values mirror the server's permanent ids.
pub type LocalId = i64;

pub fn is_temporary(id: LocalId) -> bool {
    id < 0
}

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    #[default]
    Undefined,
    /// Unsynced local changes, including records that were never pushed.
    Local,
    /// A push attempt is in flight (or was abandoned mid-flight).
    Syncing,
    /// Matches the last known server state.
    Synced,
    /// The last push attempt was rejected.
    Failed,
    /// Deleted locally after having been synced; remote deletion pending.
    ToDelete,
}

impl SyncStatus {
    /// Records picked up by the next push batch. `Syncing` is retried like
    /// `Local` so that an abandoned batch needs no recovery step.
    pub fn is_push_candidate(self) -> bool {
        matches!(self, Self::Local | Self::Failed | Self::Syncing)
    }

    /// Status after a user edit, or `None` when the record may not be edited.
    pub fn after_local_edit(self) -> Option<SyncStatus> {
        match self {
            Self::ToDelete => None,
            _ => Some(Self::Local),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Undefined => "undefined",
            Self::Local => "local",
            Self::Syncing => "syncing",
            Self::Synced => "synced",
            Self::Failed => "failed",
            Self::ToDelete => "to_delete",
        }
    }
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Person,
    Vehicle,
    Activity,
    Trip,
    Interaction,
    AgendaEntry,
}

impl EntityKind {
    pub const ALL: [EntityKind; 6] = [
        Self::Person,
        Self::Vehicle,
        Self::Activity,
        Self::Trip,
        Self::Interaction,
        Self::AgendaEntry,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Person => "person",
            Self::Vehicle => "vehicle",
            Self::Activity => "activity",
            Self::Trip => "trip",
            Self::Interaction => "interaction",
            Self::AgendaEntry => "agenda_entry",
        }
    }

    /// Remote collection used when the settings don't override it.
    pub fn default_collection(self) -> &'static str {
        match self {
            Self::Person => "people",
            Self::Vehicle => "vehicles",
            Self::Activity => "activities",
            Self::Trip => "trips",
            Self::Interaction => "interactions",
            Self::AgendaEntry => "agenda_entries",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of building an outbound payload from a local record.
#[derive(Debug, Clone, PartialEq)]
pub enum PayloadBuild<P> {
    Ready(P),
    /// Not ready to sync yet; the record is skipped without touching its status.
    Incomplete { missing: String },
}

impl<P> PayloadBuild<P> {
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready(_))
    }
}

impl<P> From<Result<P, Incomplete>> for PayloadBuild<P> {
    fn from(value: Result<P, Incomplete>) -> Self {
        match value {
            Ok(payload) => Self::Ready(payload),
            Err(Incomplete { missing }) => Self::Incomplete { missing },
        }
    }
}

/// Sync bookkeeping shared by every record type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordMeta {
    pub local_id: LocalId,
    pub status: SyncStatus,
}

impl RecordMeta {
    pub fn synced(id: LocalId) -> Self {
        Self {
            local_id: id,
            status: SyncStatus::Synced,
        }
    }

    pub fn local(id: LocalId) -> Self {
        Self {
            local_id: id,
            status: SyncStatus::Local,
        }
    }
}

/// Inbound transfer object as returned by a remote collection.
pub trait RemoteDto: Serialize + DeserializeOwned + Clone + fmt::Debug + Send + Sync + 'static {
    fn id(&self) -> LocalId;
}

/// A locally cached entity that takes part in push/pull reconciliation.
pub trait SyncRecord:
    Serialize + DeserializeOwned + Clone + fmt::Debug + Send + Sync + 'static
{
    type Dto: RemoteDto;
    type Payload: Serialize + fmt::Debug + Send + Sync + 'static;

    const KIND: EntityKind;
    const RELATIONS: &'static [RelationSpec] = &[];
    /// Remote columns carrying the time range of log entities.
    const SPAN_COLUMNS: Option<SpanColumns> = None;
    /// Whether the remote collection carries an `archived` column.
    const ARCHIVABLE: bool = false;

    fn meta(&self) -> &RecordMeta;
    fn meta_mut(&mut self) -> &mut RecordMeta;
    fn relations(&self) -> &Relations;
    fn relations_mut(&mut self) -> &mut Relations;

    /// Short human-readable name cached on records that reference this one.
    fn label(&self) -> String;

    fn payload(&self) -> PayloadBuild<Self::Payload>;
    fn from_dto(dto: Self::Dto) -> Self;
    /// In-place overwrite; callers only invoke this on `Synced` records.
    fn update_from(&mut self, dto: Self::Dto);

    fn span(&self) -> Option<Span> {
        None
    }

    fn is_archived(&self) -> bool {
        false
    }

    fn local_id(&self) -> LocalId {
        self.meta().local_id
    }

    fn set_local_id(&mut self, id: LocalId) {
        self.meta_mut().local_id = id;
    }

    fn status(&self) -> SyncStatus {
        self.meta().status
    }

    fn set_status(&mut self, status: SyncStatus) {
        self.meta_mut().status = status;
    }
}
