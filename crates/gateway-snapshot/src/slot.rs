//! The snapshot slot: a one-slot SPSC bounded channel replacing the
//! original release/yield/acquire semaphore-guarded shared-memory
//! protocol, per the design note that calls for a proper native
//! shared-state primitive where the language offers one.
//!
//! `tokio::sync::watch` already gives exactly the semantics the
//! original hand-rolled: one slot holding the latest value, a receiver
//! that can tell whether it has seen the current value yet. The
//! producer's "ack digest" step becomes `watch::Sender::send_if_modified`
//! comparing the new snapshot against the currently held one.

use gateway_core::Snapshot;
use tokio::sync::watch;
use tracing::warn;

/// One named producer→consumer snapshot channel.
pub struct SnapshotSlot {
    name: String,
    capacity_bytes: usize,
    tx: watch::Sender<Snapshot>,
}

impl SnapshotSlot {
    /// Create a slot and its single receiver. `capacity_bytes` is the
    /// notional slot size used only to compute the back-pressure
    /// warning threshold; there is no real fixed-size buffer to overrun.
    pub fn new(name: impl Into<String>, capacity_bytes: usize) -> (Self, watch::Receiver<Snapshot>) {
        let (tx, rx) = watch::channel(Snapshot::new());
        (
            Self {
                name: name.into(),
                capacity_bytes,
                tx,
            },
            rx,
        )
    }

    /// Publish a snapshot. A no-op (and no receiver wakeup) if the
    /// snapshot is identical to the one currently held — this is the
    /// "never overwrite an unread snapshot with an identical payload"
    /// property.
    pub fn publish(&self, snapshot: &Snapshot) {
        let encoded_len = serde_json::to_vec(snapshot).map(|v| v.len()).unwrap_or(0);
        if encoded_len as f64 > self.capacity_bytes as f64 * 0.9 {
            warn!(
                slot = %self.name,
                encoded_len,
                capacity_bytes = self.capacity_bytes,
                "snapshot payload exceeds 90% of configured slot capacity"
            );
        }

        self.tx.send_if_modified(|current| {
            if current == snapshot {
                false
            } else {
                *current = snapshot.clone();
                true
            }
        });
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gateway_core::WireValue;

    #[tokio::test]
    async fn identical_snapshot_does_not_retrigger_receiver() {
        let (slot, mut rx) = SnapshotSlot::new("modbus_interface", 12 * 1024);

        let mut snapshot = Snapshot::new();
        snapshot.insert("Motor:Speed", WireValue::U16(900), "motor speed");

        slot.publish(&snapshot);
        assert!(rx.has_changed().unwrap());
        rx.borrow_and_update();
        assert!(!rx.has_changed().unwrap());

        slot.publish(&snapshot);
        assert!(!rx.has_changed().unwrap(), "identical payload must not re-notify");

        let mut changed = snapshot.clone();
        changed.insert("Motor:Speed", WireValue::U16(901), "motor speed");
        slot.publish(&changed);
        assert!(rx.has_changed().unwrap(), "differing payload must notify");
    }
}
