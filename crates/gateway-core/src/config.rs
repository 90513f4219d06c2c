//! Process-level configuration, loaded once at each binary's `main`.
//!
//! Global state (DB paths, snapshot slot names, RBAC model/policy
//! paths) is injected as a startup configuration value rather than
//! hidden behind process-wide singletons.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{CoreError, Result};

/// Top-level gateway process configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    pub storage: StorageConfig,
    pub rbac: RbacConfig,
    pub snapshot: SnapshotConfig,
    pub rules: RulesConfig,
    pub interface: InterfaceConfig,
    pub control_plane: ControlPlaneConfig,
    pub ipc: IpcConfig,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            storage: StorageConfig::default(),
            rbac: RbacConfig::default(),
            snapshot: SnapshotConfig::default(),
            rules: RulesConfig::default(),
            interface: InterfaceConfig::default(),
            control_plane: ControlPlaneConfig::default(),
            ipc: IpcConfig::default(),
        }
    }
}

impl GatewayConfig {
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        toml::from_str(raw).map_err(|e| CoreError::ConfigInvalid(e.to_string()))
    }

    pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_toml_str(&raw)
    }
}

/// Database file locations (C4 credential store, C10 mapped-request store).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub credentials_db_path: PathBuf,
    pub mapped_requests_db_path: PathBuf,
    pub pool_max_connections: u32,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            credentials_db_path: PathBuf::from("data/credentials.sqlite3"),
            mapped_requests_db_path: PathBuf::from("data/mapped_requests.sqlite3"),
            pool_max_connections: 8,
        }
    }
}

/// RBAC model/policy file locations (C5).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RbacConfig {
    pub policy_path: PathBuf,
}

impl Default for RbacConfig {
    fn default() -> Self {
        Self {
            policy_path: PathBuf::from("config/rbac_policy.csv"),
        }
    }
}

/// Snapshot cache cadence and source config (C1/C2/C3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotConfig {
    pub poll_interval_secs: u64,
    pub reconnect_cooldown_secs: u64,
    pub structured_node_endpoints_path: PathBuf,
    pub register_endpoints_path: PathBuf,
    /// Notional slot capacity in bytes, used only to compute the
    /// back-pressure warning threshold described in the snapshot
    /// delivery protocol.
    pub slot_capacity_bytes: usize,
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: 1,
            reconnect_cooldown_secs: 5,
            structured_node_endpoints_path: PathBuf::from("config/opcua_endpoints.xml"),
            register_endpoints_path: PathBuf::from("config/modbus_endpoints.xml"),
            slot_capacity_bytes: 12 * 1024,
        }
    }
}

/// Rule-set document locations (C7/C8/C9 and the supplemented issuer registry).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RulesConfig {
    pub verification_rules_path: PathBuf,
    pub mapping_rules_path: PathBuf,
    pub acceptance_rules_path: PathBuf,
    pub issuer_registry_path: Option<PathBuf>,
}

impl Default for RulesConfig {
    fn default() -> Self {
        Self {
            verification_rules_path: PathBuf::from("config/verification_rules.xml"),
            mapping_rules_path: PathBuf::from("config/mapping_rules.xml"),
            acceptance_rules_path: PathBuf::from("config/acceptance_rules.xml"),
            issuer_registry_path: None,
        }
    }
}

/// Request-submission API bind address.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterfaceConfig {
    pub bind_address: String,
}

impl Default for InterfaceConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Control-plane bridge target.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControlPlaneConfig {
    pub bridge_url: String,
    pub pull_interval_millis: u64,
}

impl Default for ControlPlaneConfig {
    fn default() -> Self {
        Self {
            bridge_url: "http://127.0.0.1:5000/process_xml".to_string(),
            pull_interval_millis: 100,
        }
    }
}

/// Unix-domain-socket directory for the JSON-line bridges that stand in
/// for the original's named shared-memory slots and request queue when
/// the three partitions run as separate OS processes (spec.md §6): "when
/// split across processes, the request queue exposes the same API over a
/// `tokio::net::UnixListener` JSON-line transport ... analogous to POSIX
/// `mq_send`/`mq_receive`". The same transport is used for the four
/// snapshot slots (`gateway-snapshot::bridge`), since a `tokio::sync::watch`
/// channel is exactly as in-process-only as the priority queue is.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IpcConfig {
    pub socket_dir: PathBuf,
}

impl Default for IpcConfig {
    fn default() -> Self {
        Self {
            socket_dir: PathBuf::from("/tmp/vor-gateway"),
        }
    }
}

impl IpcConfig {
    /// Socket path for one named snapshot slot (e.g. `"modbus_interface"`).
    pub fn snapshot_socket_path(&self, slot_name: &str) -> PathBuf {
        self.socket_dir.join(format!("{slot_name}.sock"))
    }

    /// Socket path for the interface→VoR request queue, named after the
    /// original's `/interface_partition_mq`.
    pub fn queue_socket_path(&self) -> PathBuf {
        self.socket_dir.join("interface_partition_mq.sock")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_round_trips_through_toml() {
        let cfg = GatewayConfig::default();
        let raw = toml::to_string(&cfg).unwrap();
        let parsed = GatewayConfig::from_toml_str(&raw).unwrap();
        assert_eq!(parsed.snapshot.poll_interval_secs, cfg.snapshot.poll_interval_secs);
    }
}
