//! The capability set every endpoint driver implements.

use async_trait::async_trait;
use gateway_core::WireValue;

/// Polymorphic capability set shared by every driver variant:
/// `open`, `read_typed(name)`, `healthy()`. Drivers never throw to
/// callers; a read failure returns `None`, not an `Err`.
#[async_trait]
pub trait EndpointDriver: Send + Sync {
    async fn open(&mut self);

    /// Read one named endpoint, returning its value and description,
    /// or `None` if the read failed or the endpoint is unknown.
    async fn read_typed(&mut self, name: &str) -> Option<(WireValue, String)>;

    fn healthy(&self) -> bool;

    /// The server alias this driver instance reads from, used by the
    /// snapshot cache to name the per-server connection-status entry.
    fn server_alias(&self) -> &str;

    /// The configured endpoint names this driver can read, polled
    /// sequentially once per snapshot cycle.
    fn endpoint_names(&self) -> Vec<String>;
}
