use std::collections::BTreeMap;

use crate::LocalId;

/// Temporary id -> permanent id pairs learned from one push cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemapTable(BTreeMap<LocalId, LocalId>);

impl RemapTable {
    pub fn insert(&mut self, temporary: LocalId, permanent: LocalId) {
        self.0.insert(temporary, permanent);
    }

    pub fn get(&self, temporary: LocalId) -> Option<LocalId> {
        self.0.get(&temporary).copied()
    }

    pub fn extend(&mut self, other: &RemapTable) {
        self.0.extend(other.0.iter().map(|(k, v)| (*k, *v)));
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (LocalId, LocalId)> + '_ {
        self.0.iter().map(|(k, v)| (*k, *v))
    }
}

impl FromIterator<(LocalId, LocalId)> for RemapTable {
    fn from_iter<T: IntoIterator<Item = (LocalId, LocalId)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Next temporary id below every id in `existing`. Callers include the lowest
/// id previously issued so that ids are not reused.
pub fn next_temporary_id(existing: impl IntoIterator<Item = LocalId>) -> LocalId {
    existing
        .into_iter()
        .min()
        .map_or(-1, |lowest| lowest.min(0) - 1)
}
