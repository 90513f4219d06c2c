//! Structured-node (secured address-space) driver.
//!
//! The transport-level security negotiation of the underlying protocol
//! is out of scope for this crate — it is a black-box capability of
//! whatever concrete [`StructuredNodeTransport`] is plugged in. This
//! driver only owns the reconnect-cooldown/health bookkeeping and the
//! per-node read dispatch, mirroring [`crate::register::RegisterDriver`].

use async_trait::async_trait;
use chrono::Duration as ChronoDuration;
use gateway_core::{MonotonicClock, WireValue};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{error, info};

use crate::driver::EndpointDriver;

fn reconnect_cooldown() -> ChronoDuration {
    ChronoDuration::seconds(5)
}

/// Security policy a structured-node endpoint negotiates under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SecurityPolicy {
    None,
    Basic128Rsa15,
    Basic256,
    Basic256Sha256,
    Aes128Sha256RsaOaep,
    Aes256Sha256RsaPss,
}

/// Certificate/trust material a secured session is established with.
/// Loading and validating these files is boilerplate out of scope here;
/// this struct only carries the paths through to the transport.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CertificateTriple {
    pub client_cert_path: String,
    pub client_key_path: String,
    pub server_cert_path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructuredNodeServerConfig {
    pub endpoint_url: String,
    pub security_policy: SecurityPolicy,
    pub certificates: Option<CertificateTriple>,
    pub trust_store_path: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
}

/// A single browsable node declaration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructuredNode {
    pub identifier: String,
    pub namespace_index: u16,
    pub datatype: String,
    pub description: String,
}

/// The connection/read surface a concrete structured-node client
/// implementation must provide. Kept deliberately narrow so production
/// code and test doubles can share [`StructuredNodeDriver`] unchanged.
#[async_trait]
pub trait StructuredNodeTransport: Send + Sync {
    async fn connect(&mut self, server: &StructuredNodeServerConfig) -> bool;

    /// Read one node by identifier; `None` on any failure.
    async fn read_node(&mut self, identifier: &str, namespace_index: u16) -> Option<String>;

    fn is_connected(&self) -> bool;
}

pub struct StructuredNodeDriver {
    server_alias: String,
    server: StructuredNodeServerConfig,
    nodes: HashMap<String, StructuredNode>,
    transport: Box<dyn StructuredNodeTransport>,
    last_attempt: Option<chrono::DateTime<chrono::Utc>>,
    clock: Arc<dyn MonotonicClock>,
}

impl StructuredNodeDriver {
    pub fn new(
        server_alias: impl Into<String>,
        server: StructuredNodeServerConfig,
        nodes: Vec<StructuredNode>,
        transport: Box<dyn StructuredNodeTransport>,
        clock: Arc<dyn MonotonicClock>,
    ) -> Self {
        Self {
            server_alias: server_alias.into(),
            server,
            nodes: nodes.into_iter().map(|n| (n.identifier.clone(), n)).collect(),
            transport,
            last_attempt: None,
            clock,
        }
    }

    pub async fn retry_connection(&mut self) {
        let now = self.clock.now();
        if let Some(last) = self.last_attempt {
            if now - last < reconnect_cooldown() {
                return;
            }
        }
        self.last_attempt = Some(now);

        if self.transport.connect(&self.server).await {
            info!(server = %self.server_alias, "(re)connection successful");
        } else {
            error!(server = %self.server_alias, "reconnection failed");
        }
    }
}

#[async_trait]
impl EndpointDriver for StructuredNodeDriver {
    async fn open(&mut self) {
        self.retry_connection().await;
    }

    async fn read_typed(&mut self, name: &str) -> Option<(WireValue, String)> {
        let node = self.nodes.get(name)?.clone();
        if !self.transport.is_connected() {
            self.retry_connection().await;
        }
        if !self.transport.is_connected() {
            return None;
        }

        let raw = self.transport.read_node(&node.identifier, node.namespace_index).await?;
        let value = WireValue::from_tagged(&node.datatype, &raw)?;
        Some((value, node.description))
    }

    fn healthy(&self) -> bool {
        self.transport.is_connected()
    }

    fn server_alias(&self) -> &str {
        &self.server_alias
    }

    fn endpoint_names(&self) -> Vec<String> {
        self.nodes.keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gateway_core::SimulatedClock;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct FakeTransport {
        connected: bool,
        connect_calls: Arc<AtomicUsize>,
        values: Mutex<HashMap<String, String>>,
    }

    #[async_trait]
    impl StructuredNodeTransport for FakeTransport {
        async fn connect(&mut self, _server: &StructuredNodeServerConfig) -> bool {
            self.connect_calls.fetch_add(1, Ordering::SeqCst);
            self.connected = true;
            true
        }

        async fn read_node(&mut self, identifier: &str, _namespace_index: u16) -> Option<String> {
            self.values.lock().unwrap().get(identifier).cloned()
        }

        fn is_connected(&self) -> bool {
            self.connected
        }
    }

    fn server_config() -> StructuredNodeServerConfig {
        StructuredNodeServerConfig {
            endpoint_url: "opc.tcp://localhost:4840".to_string(),
            security_policy: SecurityPolicy::None,
            certificates: None,
            trust_store_path: None,
            username: None,
            password: None,
        }
    }

    #[tokio::test]
    async fn read_typed_converts_via_declared_datatype() {
        let connect_calls = Arc::new(AtomicUsize::new(0));
        let mut values = HashMap::new();
        values.insert("ns=2;s=MotorSpeed".to_string(), "900".to_string());
        let transport = FakeTransport { connected: false, connect_calls: connect_calls.clone(), values: Mutex::new(values) };

        let nodes = vec![StructuredNode {
            identifier: "ns=2;s=MotorSpeed".to_string(),
            namespace_index: 2,
            datatype: "u16".to_string(),
            description: "motor speed".to_string(),
        }];

        let mut driver = StructuredNodeDriver::new(
            "plant-a",
            server_config(),
            nodes,
            Box::new(transport),
            Arc::new(SimulatedClock::new(chrono::Utc::now())),
        );

        let (value, description) = driver.read_typed("ns=2;s=MotorSpeed").await.unwrap();
        assert_eq!(value, WireValue::U16(900));
        assert_eq!(description, "motor speed");
        assert_eq!(connect_calls.load(Ordering::SeqCst), 1);
    }
}
