use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{NaiveDate, Utc};
use tracing::info;
use tracklog_core::entities::{Activity, AgendaEntry, Interaction, Person, Trip, Vehicle};
use tracklog_core::{EntityKind, SyncRecord, SyncStatus, Window};
use tracklog_infra::RestClient;
use tracklog_persistence::{LocalStore, RedbLocalStore, StorageError};
use tracklog_pipeline::{status_counts, HttpCollection, SyncOptions, SyncScope, Syncer};

use crate::domain::AppSettings;
use crate::orchestrator::SyncOrchestrator;
use crate::persistence;

/// REST client for the configured backend, rate limited and authenticated.
pub fn rest_client(settings: &AppSettings, http: reqwest::Client) -> Result<Arc<RestClient>> {
    if !settings.is_configured() {
        anyhow::bail!("No remote configured; run `settings set-remote <url>` first");
    }
    let mut client = RestClient::new(http, &settings.remote_url)
        .with_context(|| format!("Invalid remote url {}", settings.remote_url))?
        .with_rate_limit(settings.requests_per_second);
    if let Some(key) = settings.api_key.as_deref().filter(|k| !k.is_empty()) {
        client = client.with_api_key(key);
    }
    Ok(Arc::new(client))
}

pub fn open_store(settings: &AppSettings) -> Result<RedbLocalStore> {
    let root = persistence::data_dir(settings)?;
    std::fs::create_dir_all(&root)
        .with_context(|| format!("Failed to create data directory {root}"))?;
    let store = RedbLocalStore::open(&root)
        .with_context(|| format!("Failed to open local store in {root}"))?;
    info!(path = %store.path(), "local store opened");
    Ok(store)
}

fn http_syncer<R: SyncRecord>(
    client: &Arc<RestClient>,
    settings: &AppSettings,
    catalogue: bool,
) -> Syncer<R, HttpCollection<R>> {
    let remote = HttpCollection::new(client.clone(), settings.collection_name(R::KIND));
    if catalogue {
        Syncer::catalogue(remote)
    } else {
        Syncer::windowed(remote)
    }
}

/// Orchestrator for every entity kind, parents first.
pub fn build_orchestrator<S: LocalStore>(
    store: S,
    client: Arc<RestClient>,
    settings: &AppSettings,
) -> SyncOrchestrator<S> {
    let options = SyncOptions {
        push_concurrency: tracklog_config::clamp_push_concurrency(settings.push_concurrency),
    };
    let mut orchestrator = SyncOrchestrator::new(store, options);
    orchestrator
        .register(http_syncer::<Person>(&client, settings, true))
        .register(http_syncer::<Vehicle>(&client, settings, true))
        .register(http_syncer::<Activity>(&client, settings, false))
        .register(http_syncer::<Trip>(&client, settings, false))
        .register(http_syncer::<Interaction>(&client, settings, false))
        .register(http_syncer::<AgendaEntry>(&client, settings, false));
    orchestrator
}

/// Opens the configured store and wires it to the configured backend.
pub fn open_orchestrator(settings: &AppSettings) -> Result<SyncOrchestrator<RedbLocalStore>> {
    let http = tracklog_infra::default_http_client().context("Failed to build HTTP client")?;
    let client = rest_client(settings, http)?;
    let store = open_store(settings)?;
    Ok(build_orchestrator(store, client, settings))
}

/// Pull scope starting at `from` (today when absent) for `days` days.
pub fn sync_scope(
    settings: &AppSettings,
    from: Option<NaiveDate>,
    days: Option<u32>,
) -> Result<SyncScope> {
    let from = from.unwrap_or_else(|| Utc::now().date_naive());
    let days = days.unwrap_or(settings.window_days);
    let window = Window::days(from, days).context("Invalid sync window")?;
    Ok(SyncScope::window(window))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingSummary {
    pub kind: EntityKind,
    pub synced: usize,
    pub local: usize,
    pub syncing: usize,
    pub failed: usize,
    pub to_delete: usize,
}

impl PendingSummary {
    pub fn pending(&self) -> usize {
        self.local + self.syncing + self.failed + self.to_delete
    }
}

fn summarize<R: SyncRecord, S: LocalStore>(store: &S) -> Result<PendingSummary, StorageError> {
    let counts = status_counts::<R, S>(store)?;
    let count = |status: SyncStatus| counts.get(&status).copied().unwrap_or(0);
    Ok(PendingSummary {
        kind: R::KIND,
        synced: count(SyncStatus::Synced),
        local: count(SyncStatus::Local) + count(SyncStatus::Undefined),
        syncing: count(SyncStatus::Syncing),
        failed: count(SyncStatus::Failed),
        to_delete: count(SyncStatus::ToDelete),
    })
}

/// Per-kind status counts of the local store, in dependency order.
pub fn pending_summary<S: LocalStore>(store: &S) -> Result<Vec<PendingSummary>, StorageError> {
    Ok(vec![
        summarize::<Person, S>(store)?,
        summarize::<Vehicle, S>(store)?,
        summarize::<Activity, S>(store)?,
        summarize::<Trip, S>(store)?,
        summarize::<Interaction, S>(store)?,
        summarize::<AgendaEntry, S>(store)?,
    ])
}
