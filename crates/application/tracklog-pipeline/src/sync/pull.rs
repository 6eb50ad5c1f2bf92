use std::collections::HashMap;

use tracing::{info, warn};
use tracklog_core::reconcile::{plan_pull, LocalEntry};
use tracklog_core::{LocalId, RemoteDto, SyncRecord, SyncStatus};
use tracklog_persistence::{LocalStore, SortOrder};

use crate::sync::remote::RemoteCollection;
use crate::sync::resolve::RelationResolver;
use crate::sync::{PullReport, PullStrategy, SyncError, SyncScope};

/// Reconciles the local copy of `R` with the server for the given scope.
///
/// Server rows overwrite local records only while those are `Synced`; local
/// records missing upstream are pruned under the same rule. Any fetch or
/// decode failure returns before the store is touched.
pub async fn pull<R, C, S>(
    store: &mut S,
    remote: &C,
    strategy: PullStrategy,
    scope: &SyncScope,
    resolver: &RelationResolver<S>,
) -> Result<PullReport, SyncError>
where
    R: SyncRecord,
    C: RemoteCollection<R> + ?Sized,
    S: LocalStore,
{
    let mut report = PullReport::new(R::KIND);

    let (server, local) = match strategy {
        PullStrategy::None => return Ok(report),
        PullStrategy::Windowed => {
            let window = scope
                .window
                .ok_or(SyncError::MissingWindow { kind: R::KIND })?;
            let server = remote
                .fetch_for_window(&window)
                .await
                .map_err(|e| SyncError::from_remote(R::KIND, e))?;
            let local = store.query::<R>(
                &|r| r.span().is_some_and(|span| span.intersects(&window)),
                SortOrder::LocalId,
            )?;
            (server, local)
        }
        PullStrategy::FullTable { include_archived } => {
            let server = remote
                .fetch(include_archived)
                .await
                .map_err(|e| SyncError::from_remote(R::KIND, e))?;
            let local = store.query::<R>(
                &|r| include_archived || !r.is_archived(),
                SortOrder::LocalId,
            )?;
            (server, local)
        }
    };

    let entries: Vec<LocalEntry> = local
        .iter()
        .map(|r| LocalEntry {
            local_id: r.local_id(),
            status: r.status(),
        })
        .collect();
    let plan = plan_pull(server, &entries);
    let mut local_by_id: HashMap<LocalId, R> =
        local.into_iter().map(|r| (r.local_id(), r)).collect();

    for dto in plan.updates {
        if let Some(mut record) = local_by_id.remove(&dto.id()) {
            record.update_from(dto);
            store.insert(&record)?;
            report.updated += 1;
        }
    }

    // Not in scope locally, but the id may still exist outside it.
    for dto in plan.inserts {
        match store.get::<R>(dto.id())? {
            Some(existing) if existing.status() != SyncStatus::Synced => {
                report.protected += 1;
            }
            Some(mut existing) => {
                existing.update_from(dto);
                store.insert(&existing)?;
                report.updated += 1;
            }
            None => {
                store.insert(&R::from_dto(dto))?;
                report.inserted += 1;
            }
        }
    }

    report.protected += plan.protected.len();

    for id in plan.prunes {
        if store.delete::<R>(id)? {
            report.pruned += 1;
        }
    }

    if !plan.orphaned.is_empty() {
        warn!(
            kind = %R::KIND,
            ids = ?plan.orphaned,
            "locally edited records no longer exist upstream"
        );
    }
    report.orphaned = plan.orphaned;

    report.linked = resolver.resolve::<R>(store)?;
    store.save()?;

    info!(
        kind = %R::KIND,
        inserted = report.inserted,
        updated = report.updated,
        protected = report.protected,
        pruned = report.pruned,
        linked = report.linked,
        "pull finished"
    );
    Ok(report)
}
