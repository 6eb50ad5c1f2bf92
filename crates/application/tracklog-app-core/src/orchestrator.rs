use std::collections::BTreeSet;

use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracklog_core::{EntityKind, SyncRecord};
use tracklog_persistence::LocalStore;
use tracklog_pipeline::{
    EntitySync, LocalEdits, PullReport, PushReport, RelationResolver, RemapTables,
    RemoteCollection, SyncError, SyncOptions, SyncScope, Syncer,
};
use uuid::Uuid;

pub type SyncRunId = Uuid;

#[derive(Debug, Clone)]
pub struct SyncCycleReport {
    pub run_id: SyncRunId,
    /// One entry per registered kind, in push order.
    pub pushes: Vec<PushReport>,
    pub pulls: Vec<PullReport>,
    /// Relation keys rewritten from temporary to permanent ids.
    pub remapped: usize,
    /// Relations linked by the closing resolve pass.
    pub linked: usize,
}

impl SyncCycleReport {
    fn new(run_id: SyncRunId) -> Self {
        Self {
            run_id,
            pushes: Vec::new(),
            pulls: Vec::new(),
            remapped: 0,
            linked: 0,
        }
    }

    pub fn push_for(&self, kind: EntityKind) -> Option<&PushReport> {
        self.pushes.iter().find(|p| p.kind == kind)
    }

    pub fn pull_for(&self, kind: EntityKind) -> Option<&PullReport> {
        self.pulls.iter().find(|p| p.kind == kind)
    }

    /// Records left `Failed` or awaiting deletion retry.
    pub fn failed(&self) -> usize {
        self.pushes.iter().map(|p| p.failed).sum()
    }
}

/// Runs sync cycles over every registered kind against one local store.
///
/// Kinds are pushed and pulled in registration order, so parents must be
/// registered before the kinds that reference them. The orchestrator owns the
/// store; each stage borrows it in turn.
pub struct SyncOrchestrator<S: LocalStore> {
    store: S,
    stages: Vec<Box<dyn EntitySync<S>>>,
    resolver: RelationResolver<S>,
    options: SyncOptions,
}

impl<S: LocalStore> SyncOrchestrator<S> {
    pub fn new(store: S, options: SyncOptions) -> Self {
        Self {
            store,
            stages: Vec::new(),
            resolver: RelationResolver::new(),
            options,
        }
    }

    pub fn register<R, C>(&mut self, syncer: Syncer<R, C>) -> &mut Self
    where
        R: SyncRecord,
        C: RemoteCollection<R> + 'static,
    {
        let registered: BTreeSet<EntityKind> = self.stages.iter().map(|s| s.kind()).collect();
        for spec in R::RELATIONS {
            if spec.target != R::KIND && !registered.contains(&spec.target) {
                warn!(
                    kind = %R::KIND,
                    parent = %spec.target,
                    "kind registered before its parent; new children wait a cycle"
                );
            }
        }
        self.resolver.register::<R>();
        self.stages.push(Box::new(syncer));
        self
    }

    pub fn kinds(&self) -> Vec<EntityKind> {
        self.stages.iter().map(|s| s.kind()).collect()
    }

    pub fn options(&self) -> &SyncOptions {
        &self.options
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    pub fn edits(&mut self) -> LocalEdits<'_, S> {
        LocalEdits::new(&mut self.store)
    }

    pub async fn sync(&mut self, scope: &SyncScope) -> Result<SyncCycleReport, SyncError> {
        self.sync_with_cancel(scope, &CancellationToken::new()).await
    }

    /// Runs one cycle unless `cancel` fires first. A cancelled cycle leaves
    /// in-flight records `Syncing`; they are retried by the next cycle.
    pub async fn sync_with_cancel(
        &mut self,
        scope: &SyncScope,
        cancel: &CancellationToken,
    ) -> Result<SyncCycleReport, SyncError> {
        let run_id = Uuid::new_v4();
        info!(%run_id, kinds = self.stages.len(), "sync cycle started");

        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(SyncError::Cancelled),
            res = self.run_cycle(run_id, scope) => res,
        };

        match &result {
            Ok(report) => info!(
                %run_id,
                remapped = report.remapped,
                linked = report.linked,
                failed = report.failed(),
                "sync cycle finished"
            ),
            Err(SyncError::Cancelled) => warn!(%run_id, "sync cycle cancelled"),
            Err(e) => error!(%run_id, error = %e, "sync cycle aborted"),
        }
        result
    }

    async fn run_cycle(
        &mut self,
        run_id: SyncRunId,
        scope: &SyncScope,
    ) -> Result<SyncCycleReport, SyncError> {
        let mut report = SyncCycleReport::new(run_id);

        for stage in &self.stages {
            let pushed = stage.push_unsaved(&mut self.store, &self.options).await?;
            if !pushed.remap.is_empty() {
                // All kinds, before the next await: re-keys and rewritten
                // child keys share one save.
                let learned = RemapTables::from([(pushed.kind, pushed.remap.clone())]);
                for target in &self.stages {
                    report.remapped += target.remap(&mut self.store, &learned)?;
                }
            }
            self.store.save()?;
            report.pushes.push(pushed);
        }

        for stage in &self.stages {
            let pulled = stage.pull(&mut self.store, scope, &self.resolver).await?;
            report.pulls.push(pulled);
        }

        // Targets pulled after their referrers.
        for stage in &self.stages {
            report.linked += stage.resolve(&mut self.store, &self.resolver)?;
        }

        self.store.save()?;
        Ok(report)
    }
}
