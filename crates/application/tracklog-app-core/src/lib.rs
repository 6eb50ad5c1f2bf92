pub mod app;
pub mod domain;
pub mod orchestrator;
pub mod persistence;
pub mod ports;

pub use app::{
    build_orchestrator, open_orchestrator, open_store, pending_summary, rest_client, sync_scope,
    PendingSummary,
};
pub use domain::AppSettings;
pub use orchestrator::{SyncCycleReport, SyncOrchestrator, SyncRunId};
pub use persistence::FilePersistence;
pub use ports::*;
