use std::collections::HashMap;

use tracing::debug;
use tracklog_core::{EntityKind, LocalId, RelationTarget, SyncRecord};
use tracklog_persistence::{LocalStore, StorageError};

type Lookup = HashMap<LocalId, RelationTarget>;
type LookupFn<S> = Box<dyn Fn(&S) -> Result<Lookup, StorageError> + Send + Sync>;

/// Fills the `resolved` cache of relations whose target now exists locally.
///
/// Each registered kind contributes a lookup built from its full local table.
/// Resolution only adds links: an existing link is never replaced or removed,
/// and nothing is written upstream.
pub struct RelationResolver<S> {
    lookups: HashMap<EntityKind, LookupFn<S>>,
}

impl<S: LocalStore> Default for RelationResolver<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: LocalStore> RelationResolver<S> {
    pub fn new() -> Self {
        Self {
            lookups: HashMap::new(),
        }
    }

    /// Makes records of `T` available as relation targets.
    pub fn register<T: SyncRecord>(&mut self) {
        self.lookups.insert(
            T::KIND,
            Box::new(|store: &S| {
                Ok(store
                    .all::<T>()?
                    .into_iter()
                    .map(|record| {
                        let target = RelationTarget {
                            kind: T::KIND,
                            local_id: record.local_id(),
                            label: record.label(),
                        };
                        (record.local_id(), target)
                    })
                    .collect())
            }),
        );
    }

    pub fn knows(&self, kind: EntityKind) -> bool {
        self.lookups.contains_key(&kind)
    }

    /// Links unresolved relations of every `R` record. Returns the number of new links.
    pub fn resolve<R: SyncRecord>(&self, store: &mut S) -> Result<usize, StorageError> {
        if R::RELATIONS.is_empty() {
            return Ok(0);
        }

        let mut maps: HashMap<EntityKind, Lookup> = HashMap::new();
        for spec in R::RELATIONS {
            if maps.contains_key(&spec.target) {
                continue;
            }
            if let Some(lookup) = self.lookups.get(&spec.target) {
                maps.insert(spec.target, lookup(store)?);
            }
        }
        if maps.is_empty() {
            return Ok(0);
        }

        let pending = store.query::<R>(
            &|r| r.relations().has_unresolved(),
            tracklog_persistence::SortOrder::LocalId,
        )?;

        let mut linked = 0;
        for mut record in pending {
            let mut changed = false;
            for spec in R::RELATIONS {
                let Some(key) = record.relations().unresolved_key(spec.name) else {
                    continue;
                };
                let Some(target) = maps.get(&spec.target).and_then(|m| m.get(&key)) else {
                    continue;
                };
                if record.relations_mut().link(spec.name, target.clone()) {
                    changed = true;
                    linked += 1;
                }
            }
            if changed {
                store.insert(&record)?;
            }
        }

        if linked > 0 {
            debug!(kind = %R::KIND, linked, "relations resolved");
        }
        Ok(linked)
    }
}
