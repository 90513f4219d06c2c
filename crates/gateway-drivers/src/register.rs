//! Register-oriented field bus driver (function-code dispatch over a
//! register-addressed protocol).

use async_trait::async_trait;
use chrono::Duration as ChronoDuration;
use gateway_core::{MonotonicClock, WireValue};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio_modbus::client::{tcp, Context, Reader};
use tracing::{error, info};

use crate::driver::EndpointDriver;

fn reconnect_cooldown() -> ChronoDuration {
    ChronoDuration::seconds(5)
}

/// Function code a register endpoint is read through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReadFunctionCode {
    ReadCoil,
    ReadDiscreteInput,
    ReadHoldingRegister,
}

/// Per-endpoint register configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterEndpoint {
    pub name: String,
    pub description: String,
    pub function: ReadFunctionCode,
    pub address: u16,
    pub quantity: u16,
    /// `-1` means whole-word, any other value selects a single bit.
    pub bit_offset: i8,
}

/// A register-oriented driver for one server.
pub struct RegisterDriver {
    server_alias: String,
    socket_addr: SocketAddr,
    endpoints: HashMap<String, RegisterEndpoint>,
    ctx: Option<Context>,
    connected: bool,
    last_attempt: Option<chrono::DateTime<chrono::Utc>>,
    clock: Arc<dyn MonotonicClock>,
}

impl RegisterDriver {
    pub fn new(
        server_alias: impl Into<String>,
        socket_addr: SocketAddr,
        endpoints: Vec<RegisterEndpoint>,
        clock: Arc<dyn MonotonicClock>,
    ) -> Self {
        Self {
            server_alias: server_alias.into(),
            socket_addr,
            endpoints: endpoints.into_iter().map(|e| (e.name.clone(), e)).collect(),
            ctx: None,
            connected: false,
            last_attempt: None,
            clock,
        }
    }

    /// Retry connecting, skipping the attempt unless at least 5 seconds
    /// have elapsed since the last one, per the injected clock.
    pub async fn retry_connection(&mut self) {
        let now = self.clock.now();
        if let Some(last) = self.last_attempt {
            if now - last < reconnect_cooldown() {
                return;
            }
        }
        self.last_attempt = Some(now);

        match tcp::connect(self.socket_addr).await {
            Ok(ctx) => {
                self.ctx = Some(ctx);
                self.connected = true;
                info!(server = %self.server_alias, "(re)connection successful");
            }
            Err(e) => {
                self.ctx = None;
                self.connected = false;
                error!(server = %self.server_alias, error = %e, "reconnection failed");
            }
        }
    }

    fn endpoint(&self, name: &str) -> Option<&RegisterEndpoint> {
        self.endpoints.get(name)
    }
}

#[async_trait]
impl EndpointDriver for RegisterDriver {
    async fn open(&mut self) {
        self.retry_connection().await;
    }

    async fn read_typed(&mut self, name: &str) -> Option<(WireValue, String)> {
        let endpoint = self.endpoint(name)?.clone();
        if self.ctx.is_none() {
            self.retry_connection().await;
        }
        let ctx = self.ctx.as_mut()?;

        let result = match endpoint.function {
            ReadFunctionCode::ReadCoil => ctx
                .read_coils(endpoint.address, 1)
                .await
                .ok()
                .and_then(|r| r.ok())
                .and_then(|bits| bits.first().copied())
                .map(WireValue::Bool),
            ReadFunctionCode::ReadDiscreteInput => ctx
                .read_discrete_inputs(endpoint.address, 1)
                .await
                .ok()
                .and_then(|r| r.ok())
                .and_then(|bits| bits.first().copied())
                .map(WireValue::Bool),
            ReadFunctionCode::ReadHoldingRegister => {
                ctx.read_holding_registers(endpoint.address, endpoint.quantity)
                    .await
                    .ok()
                    .and_then(|r| r.ok())
                    .and_then(|words| words.first().copied())
                    .map(|word| {
                        if endpoint.bit_offset > -1 {
                            WireValue::Bool(test_bit(word, endpoint.bit_offset as u32))
                        } else {
                            WireValue::U16(word)
                        }
                    })
            }
        };

        if result.is_none() {
            self.connected = false;
        }
        result.map(|v| (v, endpoint.description.clone()))
    }

    fn healthy(&self) -> bool {
        self.connected
    }

    fn server_alias(&self) -> &str {
        &self.server_alias
    }

    fn endpoint_names(&self) -> Vec<String> {
        self.endpoints.keys().cloned().collect()
    }
}

/// Extract bit `offset` of a 16-bit word, matching the source protocol's
/// single-bit selection semantics.
fn test_bit(word: u16, offset: u32) -> bool {
    (word >> offset) & 1 == 1
}

#[cfg(test)]
mod tests {
    use super::*;
    use gateway_core::SimulatedClock;

    #[test]
    fn test_bit_extracts_expected_bit() {
        assert!(test_bit(0b0000_0100, 2));
        assert!(!test_bit(0b0000_0100, 1));
    }

    #[tokio::test]
    async fn retry_connection_respects_cooldown() {
        let clock = SimulatedClock::new(chrono::Utc::now());
        let mut driver = RegisterDriver::new(
            "plant-a",
            "127.0.0.1:1502".parse().unwrap(),
            vec![],
            Arc::new(clock.clone()),
        );

        driver.retry_connection().await;
        let first_attempt = driver.last_attempt;

        driver.retry_connection().await;
        assert_eq!(driver.last_attempt, first_attempt, "second attempt within cooldown is a no-op");

        clock.advance(std::time::Duration::from_secs(5));
        driver.retry_connection().await;
        assert_ne!(driver.last_attempt, first_attempt, "attempt after cooldown elapses is retried");
    }
}
