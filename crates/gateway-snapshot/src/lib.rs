//! Snapshot cache (C2) and address-space projector (C3).

pub mod bridge;
pub mod cache;
pub mod error;
pub mod projector;
pub mod slot;

pub use bridge::{serve_slot, subscribe_slot};
pub use cache::{run, ProducerGroup};
pub use error::{Result, SnapshotError};
pub use projector::{ObjectNode, ProjectedAddressSpace, VariableNode};
pub use slot::SnapshotSlot;
