//! Shared types, error taxonomy, clock abstraction and process
//! configuration for the VoR gateway.

pub mod config;
pub mod error;
pub mod feedback;
pub mod request;
pub mod snapshot;
pub mod time;
pub mod value;

pub use config::{
    ControlPlaneConfig, GatewayConfig, InterfaceConfig, IpcConfig, RbacConfig, RulesConfig,
    SnapshotConfig, StorageConfig,
};
pub use error::{CoreError, Result};
pub use feedback::{FeedbackRecord, Stage};
pub use request::{Modification, Request, MAX_PRIORITY};
pub use snapshot::{Snapshot, SnapshotEntry};
pub use time::{MonotonicClock, SimulatedClock, SystemClock};
pub use value::WireValue;
