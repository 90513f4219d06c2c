//! Snapshot value types shared between the driver, cache and projector.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::value::WireValue;

/// One entry of a snapshot: a typed value plus its configured description.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotEntry {
    #[serde(flatten)]
    pub value: WireValue,
    pub description: String,
}

/// A point-in-time mapping from endpoint name to value.
///
/// `BTreeMap` rather than `HashMap` so two snapshots with the same
/// contents serialize to byte-identical JSON — the snapshot slot's
/// change detection depends on this.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot(pub BTreeMap<String, SnapshotEntry>);

impl Snapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: WireValue, description: impl Into<String>) {
        self.0.insert(name.into(), SnapshotEntry { value, description: description.into() });
    }

    pub fn get(&self, name: &str) -> Option<&SnapshotEntry> {
        self.0.get(name)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &SnapshotEntry)> {
        self.0.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_snapshots_serialize_identically() {
        let mut a = Snapshot::new();
        a.insert("Motor:Speed", WireValue::U16(900), "motor speed");
        let mut b = Snapshot::new();
        b.insert("Motor:Speed", WireValue::U16(900), "motor speed");

        let ja = serde_json::to_string(&a).unwrap();
        let jb = serde_json::to_string(&b).unwrap();
        assert_eq!(ja, jb);
    }
}
