use std::collections::BTreeMap;

use tracklog_core::{EntityKind, LocalId, RemapTable, Window};
use tracklog_persistence::StorageError;

pub mod edits;
pub mod engine;
pub mod pull;
pub mod push;
pub mod remote;
pub mod resolve;

use remote::RemoteError;

/// Remap tables learned during one push phase, keyed by the kind that was created.
pub type RemapTables = BTreeMap<EntityKind, RemapTable>;

/// Cycle-level failure. Per-record push failures never surface here; they
/// are recorded on the record's status instead.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("windowed pull of {kind} needs a window")]
    MissingWindow { kind: EntityKind },
    #[error("could not decode {kind} rows: {message}")]
    Decode { kind: EntityKind, message: String },
    #[error("remote {kind} collection unavailable: {source}")]
    Remote {
        kind: EntityKind,
        #[source]
        source: RemoteError,
    },
    #[error("local store error: {0}")]
    Local(#[from] StorageError),
    #[error("sync cycle cancelled")]
    Cancelled,
}

impl SyncError {
    pub(crate) fn from_remote(kind: EntityKind, err: RemoteError) -> Self {
        match err {
            RemoteError::Decode(message) => Self::Decode { kind, message },
            source => Self::Remote { kind, source },
        }
    }
}

/// What a pull should cover. Catalogue kinds ignore the window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncScope {
    pub window: Option<Window>,
}

impl SyncScope {
    pub fn window(window: Window) -> Self {
        Self {
            window: Some(window),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PullStrategy {
    /// Records whose span intersects the scope's window.
    Windowed,
    /// The whole collection. Archived rows are left out of both sides of the
    /// diff unless `include_archived` is set.
    FullTable { include_archived: bool },
    /// Push-only.
    None,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncOptions {
    pub push_concurrency: usize,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            push_concurrency: tracklog_config::DEFAULT_PUSH_CONCURRENCY,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushReport {
    pub kind: EntityKind,
    pub created: usize,
    pub updated: usize,
    pub deleted: usize,
    pub failed: usize,
    /// Records whose payload could not be built yet.
    pub skipped: usize,
    pub remap: RemapTable,
}

impl PushReport {
    pub fn new(kind: EntityKind) -> Self {
        Self {
            kind,
            created: 0,
            updated: 0,
            deleted: 0,
            failed: 0,
            skipped: 0,
            remap: RemapTable::default(),
        }
    }

    pub fn is_noop(&self) -> bool {
        self.created + self.updated + self.deleted + self.failed + self.skipped == 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullReport {
    pub kind: EntityKind,
    pub inserted: usize,
    pub updated: usize,
    /// Server rows left alone because the local copy has unsynced edits.
    pub protected: usize,
    pub pruned: usize,
    /// Locally edited records the server no longer has.
    pub orphaned: Vec<LocalId>,
    pub linked: usize,
}

impl PullReport {
    pub fn new(kind: EntityKind) -> Self {
        Self {
            kind,
            inserted: 0,
            updated: 0,
            protected: 0,
            pruned: 0,
            orphaned: Vec::new(),
            linked: 0,
        }
    }
}
