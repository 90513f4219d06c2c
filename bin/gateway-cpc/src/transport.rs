//! Stand-in structured-node transport.
//!
//! The real secured-session handshake (certificate loading, security
//! policy negotiation, subscription management) is out of scope: only
//! the driver-facing [`StructuredNodeTransport`] contract is implemented
//! here, against an always-empty address space. A concrete transport
//! would replace this module without touching `gateway-drivers`.

use async_trait::async_trait;
use gateway_drivers::{StructuredNodeServerConfig, StructuredNodeTransport};

#[derive(Default)]
pub struct UnimplementedTransport {
    connected: bool,
}

#[async_trait]
impl StructuredNodeTransport for UnimplementedTransport {
    async fn connect(&mut self, server: &StructuredNodeServerConfig) -> bool {
        tracing::warn!(endpoint = %server.endpoint_url, "structured-node transport is unimplemented, refusing connection");
        self.connected = false;
        false
    }

    async fn read_node(&mut self, _identifier: &str, _namespace_index: u16) -> Option<String> {
        None
    }

    fn is_connected(&self) -> bool {
        self.connected
    }
}
