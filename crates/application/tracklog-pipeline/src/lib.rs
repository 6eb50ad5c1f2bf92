pub mod sync;

// Re-export core engine components
pub use sync::edits::{status_counts, EditError, LocalEdits};
pub use sync::engine::{EntitySync, Syncer};
pub use sync::remote::{
    HttpCollection, InMemoryCollection, RemoteCall, RemoteCollection, RemoteError,
};
pub use sync::resolve::RelationResolver;
pub use sync::{
    PullReport, PullStrategy, PushReport, RemapTables, SyncError, SyncOptions, SyncScope,
};
