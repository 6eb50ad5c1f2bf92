use std::collections::{BTreeMap, HashSet};

use crate::{is_temporary, LocalId, RemoteDto, SyncStatus};

/// What the local side knows about a record taking part in a pull.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalEntry {
    pub local_id: LocalId,
    pub status: SyncStatus,
}

/// Result of comparing a server snapshot against the local records of the
/// same scope. Every list is ordered by id.
#[derive(Debug, Clone)]
pub struct PullPlan<D> {
    /// Server records with no local counterpart in scope.
    pub inserts: Vec<D>,
    /// Server records whose local copy is `Synced` and may be overwritten.
    pub updates: Vec<D>,
    /// Server records whose local copy carries unsynced edits.
    pub protected: Vec<LocalId>,
    /// `Synced` local records the server no longer lists.
    pub prunes: Vec<LocalId>,
    /// Edited local records the server no longer lists. They are kept and
    /// will fail on their next push until the user resolves them.
    pub orphaned: Vec<LocalId>,
}

impl<D> PullPlan<D> {
    pub fn is_noop(&self) -> bool {
        self.inserts.is_empty() && self.updates.is_empty() && self.prunes.is_empty()
    }
}

pub fn plan_pull<D: RemoteDto>(server: Vec<D>, local: &[LocalEntry]) -> PullPlan<D> {
    let mut inserts = Vec::new();
    let mut updates = Vec::new();
    let mut protected = Vec::new();
    let mut prunes = Vec::new();
    let mut orphaned = Vec::new();

    // Later duplicates win, matching what a re-fetch would return.
    let server_by_id: BTreeMap<LocalId, D> = server.into_iter().map(|d| (d.id(), d)).collect();

    // Never-synced records have no server identity and stay out of the diff.
    let local_by_id: BTreeMap<LocalId, SyncStatus> = local
        .iter()
        .filter(|e| !is_temporary(e.local_id))
        .map(|e| (e.local_id, e.status))
        .collect();

    let mut seen: HashSet<LocalId> = HashSet::new();

    for (id, dto) in server_by_id {
        seen.insert(id);
        match local_by_id.get(&id) {
            Some(SyncStatus::Synced) => updates.push(dto),
            Some(_) => protected.push(id),
            None => inserts.push(dto),
        }
    }

    for (id, status) in &local_by_id {
        if seen.contains(id) {
            continue;
        }
        match status {
            SyncStatus::Synced => prunes.push(*id),
            SyncStatus::ToDelete => {}
            _ => orphaned.push(*id),
        }
    }

    PullPlan {
        inserts,
        updates,
        protected,
        prunes,
        orphaned,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
    struct Row {
        id: LocalId,
        rev: u32,
    }

    impl RemoteDto for Row {
        fn id(&self) -> LocalId {
            self.id
        }
    }

    fn entry(local_id: LocalId, status: SyncStatus) -> LocalEntry {
        LocalEntry { local_id, status }
    }

    #[test]
    fn empty_server_prunes_only_synced() {
        let local = [
            entry(1, SyncStatus::Synced),
            entry(2, SyncStatus::Local),
            entry(3, SyncStatus::Failed),
            entry(4, SyncStatus::ToDelete),
            entry(-1, SyncStatus::Local),
        ];
        let plan = plan_pull::<Row>(Vec::new(), &local);
        assert_eq!(plan.prunes, vec![1]);
        assert_eq!(plan.orphaned, vec![2, 3]);
        assert!(plan.inserts.is_empty());
    }

    #[test]
    fn duplicate_server_rows_collapse_to_last() {
        let server = vec![Row { id: 5, rev: 1 }, Row { id: 5, rev: 2 }];
        let plan = plan_pull(server, &[]);
        assert_eq!(plan.inserts, vec![Row { id: 5, rev: 2 }]);
    }
}
