use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{is_temporary, EntityKind, LocalId, RemapTable};

/// Static description of a foreign key carried by a record type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelationSpec {
    pub name: &'static str,
    pub target: EntityKind,
    /// A required relation must hold a permanent id before the record can be pushed.
    pub required: bool,
}

impl RelationSpec {
    pub const fn required(name: &'static str, target: EntityKind) -> Self {
        Self {
            name,
            target,
            required: true,
        }
    }

    pub const fn optional(name: &'static str, target: EntityKind) -> Self {
        Self {
            name,
            target,
            required: false,
        }
    }
}

/// Cached result of looking up a relation key in the local store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationTarget {
    pub kind: EntityKind,
    pub local_id: LocalId,
    pub label: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relation {
    pub key: Option<LocalId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved: Option<RelationTarget>,
}

/// Missing piece that keeps a payload from being built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Incomplete {
    pub missing: String,
}

impl Incomplete {
    pub fn field(name: &str) -> Self {
        Self {
            missing: name.to_string(),
        }
    }
}

/// Foreign keys of a record, keyed by relation name.
///
/// The raw key is the source of truth. `resolved` is only a cache and is
/// dropped whenever the key changes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Relations(BTreeMap<String, Relation>);

impl Relations {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_key(mut self, name: &str, key: Option<LocalId>) -> Self {
        self.set_key(name, key);
        self
    }

    pub fn get(&self, name: &str) -> Option<&Relation> {
        self.0.get(name)
    }

    pub fn key(&self, name: &str) -> Option<LocalId> {
        self.0.get(name).and_then(|r| r.key)
    }

    pub fn resolved(&self, name: &str) -> Option<&RelationTarget> {
        self.0.get(name).and_then(|r| r.resolved.as_ref())
    }

    pub fn set_key(&mut self, name: &str, key: Option<LocalId>) {
        let entry = self.0.entry(name.to_string()).or_default();
        if entry.key != key {
            entry.key = key;
            entry.resolved = None;
        }
    }

    /// Key of a relation that has a raw id but no cached target yet.
    pub fn unresolved_key(&self, name: &str) -> Option<LocalId> {
        self.0
            .get(name)
            .filter(|r| r.resolved.is_none())
            .and_then(|r| r.key)
    }

    pub fn has_unresolved(&self) -> bool {
        self.0
            .values()
            .any(|r| r.key.is_some() && r.resolved.is_none())
    }

    /// Caches `target` for `name`. Ignored unless the key matches the target and
    /// nothing is cached yet; an existing link is never replaced.
    pub fn link(&mut self, name: &str, target: RelationTarget) -> bool {
        match self.0.get_mut(name) {
            Some(rel) if rel.resolved.is_none() && rel.key == Some(target.local_id) => {
                rel.resolved = Some(target);
                true
            }
            _ => false,
        }
    }

    /// Rewrites temporary keys of the named relations found in `table`. Cached targets
    /// follow the rename since they point at the same record.
    pub fn remap(&mut self, names: &[&str], table: &RemapTable) -> usize {
        let mut rewritten = 0;
        for name in names {
            let Some(rel) = self.0.get_mut(*name) else {
                continue;
            };
            let Some(old) = rel.key.filter(|k| is_temporary(*k)) else {
                continue;
            };
            if let Some(new) = table.get(old) {
                rel.key = Some(new);
                if let Some(target) = rel.resolved.as_mut() {
                    target.local_id = new;
                }
                rewritten += 1;
            }
        }
        rewritten
    }

    /// Key to send upstream. Temporary keys can never leave the device, and a
    /// required relation must be present.
    pub fn outbound_key(&self, spec: &RelationSpec) -> Result<Option<LocalId>, Incomplete> {
        match self.key(spec.name) {
            Some(key) if is_temporary(key) => Err(Incomplete::field(spec.name)),
            Some(key) => Ok(Some(key)),
            None if spec.required => Err(Incomplete::field(spec.name)),
            None => Ok(None),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Relation)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PERSON: RelationSpec = RelationSpec::required("person", EntityKind::Person);
    const VEHICLE: RelationSpec = RelationSpec::optional("vehicle", EntityKind::Vehicle);

    fn target(id: LocalId) -> RelationTarget {
        RelationTarget {
            kind: EntityKind::Person,
            local_id: id,
            label: "Ada".into(),
        }
    }

    #[test]
    fn changing_key_drops_cached_target() {
        let mut rels = Relations::new().with_key("person", Some(4));
        assert!(rels.link("person", target(4)));
        assert!(rels.resolved("person").is_some());

        rels.set_key("person", Some(4));
        assert!(rels.resolved("person").is_some(), "same key keeps the link");

        rels.set_key("person", Some(5));
        assert!(rels.resolved("person").is_none());
        assert_eq!(rels.unresolved_key("person"), Some(5));
    }

    #[test]
    fn link_never_replaces_or_mismatches() {
        let mut rels = Relations::new().with_key("person", Some(4));
        assert!(!rels.link("person", target(9)));
        assert!(rels.link("person", target(4)));
        assert!(!rels.link("person", target(4)));
        assert!(!rels.link("missing", target(4)));
    }

    #[test]
    fn remap_rewrites_only_temporary_keys() {
        let mut table = RemapTable::default();
        table.insert(-3, 55);
        table.insert(7, 99);

        let mut rels = Relations::new()
            .with_key("person", Some(-3))
            .with_key("vehicle", Some(7));
        rels.link("person", target(-3));

        assert_eq!(rels.remap(&["person", "vehicle"], &table), 1);
        assert_eq!(rels.key("person"), Some(55));
        assert_eq!(rels.resolved("person").map(|t| t.local_id), Some(55));
        assert_eq!(rels.key("vehicle"), Some(7));
    }

    #[test]
    fn outbound_key_rules() {
        let rels = Relations::new().with_key("vehicle", Some(-1));
        assert_eq!(rels.outbound_key(&PERSON), Err(Incomplete::field("person")));
        assert_eq!(rels.outbound_key(&VEHICLE), Err(Incomplete::field("vehicle")));

        let rels = Relations::new().with_key("person", Some(12));
        assert_eq!(rels.outbound_key(&PERSON), Ok(Some(12)));
        assert_eq!(rels.outbound_key(&VEHICLE), Ok(None));
    }
}
