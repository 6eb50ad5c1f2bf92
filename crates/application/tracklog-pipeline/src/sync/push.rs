use futures::stream::{self, StreamExt};
use tracing::{debug, info, warn};
use tracklog_core::{is_temporary, LocalId, PayloadBuild, RemoteDto, SyncRecord, SyncStatus};
use tracklog_persistence::{LocalStore, SortOrder, StorageError};

use crate::sync::remote::{RemoteCollection, RemoteError};
use crate::sync::{PushReport, RemapTables, SyncError, SyncOptions};

enum Outcome<D> {
    Created { temporary: LocalId, dto: D },
    Updated { id: LocalId },
    Failed { id: LocalId, error: RemoteError },
}

/// Sends every pending record of `R` upstream, applies the outcomes and saves.
pub async fn push<R, C, S>(
    store: &mut S,
    remote: &C,
    options: &SyncOptions,
) -> Result<PushReport, SyncError>
where
    R: SyncRecord,
    C: RemoteCollection<R> + ?Sized,
    S: LocalStore,
{
    let report = push_unsaved::<R, C, S>(store, remote, options).await?;
    store.save()?;
    Ok(report)
}

/// Like [`push`], but leaves the save to the caller.
///
/// Remote writes run concurrently and their results are applied one by one
/// afterwards. Nothing is awaited once the first outcome is applied, so a
/// caller can fold the returned remap into other records before saving. A
/// failing record only changes its own status.
pub async fn push_unsaved<R, C, S>(
    store: &mut S,
    remote: &C,
    options: &SyncOptions,
) -> Result<PushReport, SyncError>
where
    R: SyncRecord,
    C: RemoteCollection<R> + ?Sized,
    S: LocalStore,
{
    let mut report = PushReport::new(R::KIND);
    let concurrency = tracklog_config::clamp_push_concurrency(options.push_concurrency);

    push_deletions::<R, C, S>(store, remote, concurrency, &mut report).await?;

    let candidates = store.query::<R>(&|r| r.status().is_push_candidate(), SortOrder::LocalId)?;
    let mut batch = Vec::with_capacity(candidates.len());
    for mut record in candidates {
        match record.payload() {
            PayloadBuild::Ready(payload) => {
                record.set_status(SyncStatus::Syncing);
                store.insert(&record)?;
                batch.push((record.local_id(), payload));
            }
            PayloadBuild::Incomplete { missing } => {
                report.skipped += 1;
                debug!(
                    kind = %R::KIND,
                    id = record.local_id(),
                    %missing,
                    "payload incomplete, skipping"
                );
            }
        }
    }

    let outcomes: Vec<Outcome<R::Dto>> = stream::iter(batch)
        .map(|(id, payload)| async move {
            let result = if is_temporary(id) {
                remote.create(&payload).await.map(|dto| Outcome::Created {
                    temporary: id,
                    dto,
                })
            } else {
                remote
                    .update(id, &payload)
                    .await
                    .map(|_| Outcome::Updated { id })
            };
            result.unwrap_or_else(|error| Outcome::Failed { id, error })
        })
        .buffer_unordered(concurrency)
        .collect()
        .await;

    for outcome in outcomes {
        match outcome {
            Outcome::Created { temporary, dto } => {
                let permanent = dto.id();
                if is_temporary(permanent) {
                    warn!(
                        kind = %R::KIND,
                        id = temporary,
                        permanent,
                        "server returned a temporary id"
                    );
                    mark_failed::<R, S>(store, temporary)?;
                    report.failed += 1;
                    continue;
                }
                let Some(mut record) = store.get::<R>(temporary)? else {
                    continue;
                };
                store.delete::<R>(temporary)?;
                record.set_local_id(permanent);
                record.set_status(SyncStatus::Synced);
                store.insert(&record)?;
                report.remap.insert(temporary, permanent);
                report.created += 1;
            }
            Outcome::Updated { id } => {
                if let Some(mut record) = store.get::<R>(id)? {
                    record.set_status(SyncStatus::Synced);
                    store.insert(&record)?;
                }
                report.updated += 1;
            }
            Outcome::Failed { id, error } => {
                warn!(kind = %R::KIND, id, %error, "push failed");
                mark_failed::<R, S>(store, id)?;
                report.failed += 1;
            }
        }
    }

    if !report.is_noop() {
        info!(
            kind = %R::KIND,
            created = report.created,
            updated = report.updated,
            deleted = report.deleted,
            failed = report.failed,
            skipped = report.skipped,
            "push finished"
        );
    }
    Ok(report)
}

fn mark_failed<R: SyncRecord, S: LocalStore>(
    store: &mut S,
    id: LocalId,
) -> Result<(), StorageError> {
    if let Some(mut record) = store.get::<R>(id)? {
        record.set_status(SyncStatus::Failed);
        store.insert(&record)?;
    }
    Ok(())
}

async fn push_deletions<R, C, S>(
    store: &mut S,
    remote: &C,
    concurrency: usize,
    report: &mut PushReport,
) -> Result<(), SyncError>
where
    R: SyncRecord,
    C: RemoteCollection<R> + ?Sized,
    S: LocalStore,
{
    let pending: Vec<LocalId> = store
        .query::<R>(&|r| r.status() == SyncStatus::ToDelete, SortOrder::LocalId)?
        .iter()
        .map(|r| r.local_id())
        .collect();
    if pending.is_empty() {
        return Ok(());
    }

    let (never_pushed, pending): (Vec<_>, Vec<_>) =
        pending.into_iter().partition(|id| is_temporary(*id));
    for id in never_pushed {
        store.delete::<R>(id)?;
        report.deleted += 1;
    }

    let results: Vec<(LocalId, Result<bool, RemoteError>)> = stream::iter(pending)
        .map(|id| async move { (id, remote.delete(id).await) })
        .buffer_unordered(concurrency)
        .collect()
        .await;

    for (id, result) in results {
        match result {
            Ok(_) => {
                store.delete::<R>(id)?;
                report.deleted += 1;
            }
            Err(error) if error.is_not_found() => {
                store.delete::<R>(id)?;
                report.deleted += 1;
            }
            Err(error) => {
                warn!(kind = %R::KIND, id, %error, "remote delete failed, will retry");
                report.failed += 1;
            }
        }
    }
    Ok(())
}

/// Rewrites relation keys of `R` that still hold temporary ids learned this cycle.
/// Returns the number of keys rewritten.
pub fn apply_remap<R, S>(store: &mut S, remaps: &RemapTables) -> Result<usize, StorageError>
where
    R: SyncRecord,
    S: LocalStore,
{
    if R::RELATIONS.iter().all(|spec| !remaps.contains_key(&spec.target)) {
        return Ok(0);
    }

    let pending = store.query::<R>(
        &|r| {
            r.relations()
                .iter()
                .any(|(_, rel)| rel.key.is_some_and(is_temporary))
        },
        SortOrder::LocalId,
    )?;

    let mut rewritten = 0;
    for mut record in pending {
        let mut changed = 0;
        for spec in R::RELATIONS {
            if let Some(table) = remaps.get(&spec.target) {
                changed += record.relations_mut().remap(&[spec.name], table);
            }
        }
        if changed > 0 {
            debug!(kind = %R::KIND, id = record.local_id(), changed, "relation keys remapped");
            store.insert(&record)?;
            rewritten += changed;
        }
    }
    Ok(rewritten)
}
