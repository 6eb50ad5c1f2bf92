use std::marker::PhantomData;

use tracklog_core::{EntityKind, RelationSpec, SyncRecord};
use tracklog_persistence::LocalStore;

use crate::sync::remote::RemoteCollection;
use crate::sync::resolve::RelationResolver;
use crate::sync::{pull, push};
use crate::sync::{
    PullReport, PullStrategy, PushReport, RemapTables, SyncError, SyncOptions, SyncScope,
};

/// Type-erased sync stage for one entity kind, as driven by an orchestrator.
#[async_trait::async_trait]
pub trait EntitySync<S: LocalStore>: Send + Sync {
    fn kind(&self) -> EntityKind;

    fn relations(&self) -> &'static [RelationSpec];

    fn strategy(&self) -> PullStrategy;

    async fn push(&self, store: &mut S, options: &SyncOptions) -> Result<PushReport, SyncError>;

    /// Push without the closing save; the caller saves once it has applied
    /// the returned remap.
    async fn push_unsaved(
        &self,
        store: &mut S,
        options: &SyncOptions,
    ) -> Result<PushReport, SyncError>;

    async fn pull(
        &self,
        store: &mut S,
        scope: &SyncScope,
        resolver: &RelationResolver<S>,
    ) -> Result<PullReport, SyncError>;

    /// Rewrites relation keys that still point at remapped temporary ids.
    fn remap(&self, store: &mut S, remaps: &RemapTables) -> Result<usize, SyncError>;

    fn resolve(&self, store: &mut S, resolver: &RelationResolver<S>) -> Result<usize, SyncError>;
}

/// Push/pull for records of `R` against one remote collection.
pub struct Syncer<R, C> {
    remote: C,
    strategy: PullStrategy,
    _record: PhantomData<fn() -> R>,
}

impl<R, C> Syncer<R, C>
where
    R: SyncRecord,
    C: RemoteCollection<R>,
{
    pub fn new(remote: C, strategy: PullStrategy) -> Self {
        Self {
            remote,
            strategy,
            _record: PhantomData,
        }
    }

    /// Log entities pulled by date window.
    pub fn windowed(remote: C) -> Self {
        Self::new(remote, PullStrategy::Windowed)
    }

    /// Catalogue entities pulled in full, archived rows excluded.
    pub fn catalogue(remote: C) -> Self {
        Self::new(
            remote,
            PullStrategy::FullTable {
                include_archived: false,
            },
        )
    }

    pub fn remote(&self) -> &C {
        &self.remote
    }
}

#[async_trait::async_trait]
impl<R, C, S> EntitySync<S> for Syncer<R, C>
where
    R: SyncRecord,
    C: RemoteCollection<R> + 'static,
    S: LocalStore,
{
    fn kind(&self) -> EntityKind {
        R::KIND
    }

    fn relations(&self) -> &'static [RelationSpec] {
        R::RELATIONS
    }

    fn strategy(&self) -> PullStrategy {
        self.strategy
    }

    async fn push(&self, store: &mut S, options: &SyncOptions) -> Result<PushReport, SyncError> {
        push::push::<R, C, S>(store, &self.remote, options).await
    }

    async fn push_unsaved(
        &self,
        store: &mut S,
        options: &SyncOptions,
    ) -> Result<PushReport, SyncError> {
        push::push_unsaved::<R, C, S>(store, &self.remote, options).await
    }

    async fn pull(
        &self,
        store: &mut S,
        scope: &SyncScope,
        resolver: &RelationResolver<S>,
    ) -> Result<PullReport, SyncError> {
        pull::pull::<R, C, S>(store, &self.remote, self.strategy, scope, resolver).await
    }

    fn remap(&self, store: &mut S, remaps: &RemapTables) -> Result<usize, SyncError> {
        Ok(push::apply_remap::<R, S>(store, remaps)?)
    }

    fn resolve(&self, store: &mut S, resolver: &RelationResolver<S>) -> Result<usize, SyncError> {
        Ok(resolver.resolve::<R>(store)?)
    }
}
