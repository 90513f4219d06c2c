//! Snapshot cache (C2): once per cycle, read every driver in a
//! producer group and publish a merged snapshot to that group's
//! interface and VoR slots.

use gateway_core::{Snapshot, WireValue};
use gateway_drivers::EndpointDriver;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::slot::SnapshotSlot;

/// One producer category (e.g. "opcua" or "modbus"), with its drivers
/// and its two consumer slots.
pub struct ProducerGroup {
    pub name: String,
    pub drivers: Vec<Box<dyn EndpointDriver>>,
    pub interface_slot: SnapshotSlot,
    pub vor_slot: SnapshotSlot,
}

impl ProducerGroup {
    async fn build_snapshot(&mut self) -> Snapshot {
        let mut snapshot = Snapshot::new();
        for driver in self.drivers.iter_mut() {
            for name in driver.endpoint_names() {
                match driver.read_typed(&name).await {
                    Some((value, description)) => snapshot.insert(name, value, description),
                    None => snapshot.insert(name, WireValue::read_error(), String::new()),
                }
            }
            snapshot.insert(
                format!("{} Connections:{}: Connection status", self.connection_group_title(), driver.server_alias()),
                WireValue::Bool(driver.healthy()),
                format!("Connection status to the {} server", self.connection_group_title()),
            );
        }
        snapshot
    }

    /// The human-facing title used in the synthetic connection-status
    /// group name, e.g. `"ModbusTCP Connections:<alias>: Connection status"`.
    fn connection_group_title(&self) -> &str {
        match self.name.as_str() {
            "modbus" => "ModbusTCP",
            "opcua" => "OPC UA",
            other => other,
        }
    }

    async fn tick(&mut self) {
        let snapshot = self.build_snapshot().await;
        self.interface_slot.publish(&snapshot);
        self.vor_slot.publish(&snapshot);
    }
}

/// Drives every producer group on a shared interval until `running`
/// is cleared.
pub async fn run(mut groups: Vec<ProducerGroup>, interval: Duration, running: Arc<AtomicBool>) {
    let mut ticker = tokio::time::interval(interval);
    while running.load(Ordering::SeqCst) {
        ticker.tick().await;
        for group in groups.iter_mut() {
            group.tick().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct StubDriver {
        alias: String,
        names: Vec<String>,
        healthy: bool,
    }

    #[async_trait]
    impl EndpointDriver for StubDriver {
        async fn open(&mut self) {}

        async fn read_typed(&mut self, name: &str) -> Option<(WireValue, String)> {
            if self.names.contains(&name.to_string()) {
                Some((WireValue::U16(42), "stub".to_string()))
            } else {
                None
            }
        }

        fn healthy(&self) -> bool {
            self.healthy
        }

        fn server_alias(&self) -> &str {
            &self.alias
        }

        fn endpoint_names(&self) -> Vec<String> {
            self.names.clone()
        }
    }

    #[tokio::test]
    async fn build_snapshot_includes_connection_status_entry() {
        let mut group = ProducerGroup {
            name: "modbus".to_string(),
            drivers: vec![Box::new(StubDriver {
                alias: "plant-a".to_string(),
                names: vec!["Motor:Speed".to_string()],
                healthy: true,
            })],
            interface_slot: SnapshotSlot::new("modbus_interface", 1024).0,
            vor_slot: SnapshotSlot::new("modbus_vor", 1024).0,
        };

        let snapshot = group.build_snapshot().await;
        assert!(snapshot.get("Motor:Speed").is_some());
        assert!(snapshot.get("ModbusTCP Connections:plant-a: Connection status").is_some());
    }
}
