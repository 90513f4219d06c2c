//! Address-space projector (C3): reconciles delivered snapshots into
//! the interface partition's dynamically-grown node tree.

use gateway_core::{Snapshot, WireValue};
use std::collections::HashMap;
use tracing::warn;

/// A single projected variable.
#[derive(Debug, Clone)]
pub struct VariableNode {
    pub value: WireValue,
    pub description: String,
}

/// An object node grouping variables that shared a `"<group>:"` prefix.
#[derive(Debug, Clone, Default)]
pub struct ObjectNode {
    pub variables: HashMap<String, VariableNode>,
}

/// The projector's own node table. Namespaced under one root object per
/// snapshot source (`opcua_shm`, `modbus_shm`); a flat name with no
/// `":"` separator at all falls under the root namespace object
/// itself. The synthetic connection-status entries
/// (`"<title> Connections:<alias>: Connection status"`) do contain a
/// colon, so they split like any other flat name: group
/// `"<title> Connections"`, variable `"<alias>: Connection status"`.
pub struct ProjectedAddressSpace {
    namespace: String,
    objects: HashMap<String, ObjectNode>,
}

impl ProjectedAddressSpace {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            objects: HashMap::new(),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn object(&self, name: &str) -> Option<&ObjectNode> {
        self.objects.get(name)
    }

    pub fn object_names(&self) -> Vec<String> {
        self.objects.keys().cloned().collect()
    }

    /// Reconcile a newly delivered snapshot: existing names get their
    /// value written (converted by wire type, which is already the
    /// case for every `WireValue`); new names create the object (if
    /// absent) and variable before writing. Nodes are never removed.
    pub fn reconcile(&mut self, snapshot: &Snapshot) {
        for (flat_name, entry) in snapshot.iter() {
            let (object_name, variable_name) = match flat_name.split_once(':') {
                Some((group, leaf)) => (group.to_string(), leaf.trim_start().to_string()),
                None => (self.namespace.clone(), flat_name.clone()),
            };

            let object = self.objects.entry(object_name).or_default();
            match object.variables.get_mut(&variable_name) {
                Some(existing) => {
                    existing.value = entry.value.clone();
                    existing.description = entry.description.clone();
                }
                None => {
                    object.variables.insert(
                        variable_name,
                        VariableNode {
                            value: entry.value.clone(),
                            description: entry.description.clone(),
                        },
                    );
                }
            }
        }
    }

    /// Defensive conversion entry point for callers reconciling a raw
    /// `(wire_type, raw_value)` pair rather than an already-typed
    /// `WireValue` — unsupported types fail only this one write.
    pub fn write_raw(&mut self, object_name: &str, variable_name: &str, wire_type: &str, raw: &str, description: &str) {
        match WireValue::from_tagged(wire_type, raw) {
            Some(value) => {
                let object = self.objects.entry(object_name.to_string()).or_default();
                object.variables.insert(
                    variable_name.to_string(),
                    VariableNode {
                        value,
                        description: description.to_string(),
                    },
                );
            }
            None => warn!(object_name, variable_name, wire_type, "unsupported wire type, retrying next cycle"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reconcile_splits_on_first_colon() {
        let mut projector = ProjectedAddressSpace::new("modbus_shm");
        let mut snapshot = Snapshot::new();
        snapshot.insert("Motor:Speed", WireValue::U16(900), "motor speed");

        projector.reconcile(&snapshot);
        let object = projector.object("Motor").unwrap();
        assert!(object.variables.contains_key("Speed"));
    }

    #[test]
    fn reconcile_places_colonless_names_under_root_namespace() {
        let mut projector = ProjectedAddressSpace::new("modbus_shm");
        let mut snapshot = Snapshot::new();
        snapshot.insert("SystemHeartbeat", WireValue::Bool(true), "gateway heartbeat");

        projector.reconcile(&snapshot);
        let object = projector.object("modbus_shm").unwrap();
        assert!(object.variables.contains_key("SystemHeartbeat"));
    }

    #[test]
    fn reconcile_splits_synthetic_connection_status_name_on_its_first_colon() {
        let mut projector = ProjectedAddressSpace::new("modbus_shm");
        let mut snapshot = Snapshot::new();
        snapshot.insert(
            "ModbusTCP Connections:plant-a: Connection status",
            WireValue::Bool(true),
            "connection status",
        );

        projector.reconcile(&snapshot);
        let object = projector.object("ModbusTCP Connections").unwrap();
        assert!(object.variables.contains_key("plant-a: Connection status"));
    }

    #[test]
    fn reconcile_never_removes_existing_nodes() {
        let mut projector = ProjectedAddressSpace::new("modbus_shm");
        let mut first = Snapshot::new();
        first.insert("Motor:Speed", WireValue::U16(900), "motor speed");
        projector.reconcile(&first);

        let mut second = Snapshot::new();
        second.insert("Motor:Torque", WireValue::U16(10), "motor torque");
        projector.reconcile(&second);

        let object = projector.object("Motor").unwrap();
        assert!(object.variables.contains_key("Speed"));
        assert!(object.variables.contains_key("Torque"));
    }
}
