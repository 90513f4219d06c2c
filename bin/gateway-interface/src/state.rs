//! Shared state handed to every request handler.

use gateway_core::MonotonicClock;
use gateway_feedback::FeedbackSink;
use gateway_rbac::RbacEngine;
use gateway_snapshot::ProjectedAddressSpace;
use gateway_storage::CredentialStore;
use parking_lot::RwLock;
use std::path::PathBuf;
use std::sync::Arc;

pub struct AppState {
    pub credentials: Arc<CredentialStore>,
    pub rbac: Arc<RwLock<RbacEngine>>,
    pub feedback: Arc<dyn FeedbackSink>,
    pub clock: Arc<dyn MonotonicClock>,
    pub queue_socket: PathBuf,
    pub modbus_space: Arc<RwLock<ProjectedAddressSpace>>,
    pub opcua_space: Arc<RwLock<ProjectedAddressSpace>>,
}
