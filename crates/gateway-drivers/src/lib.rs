//! Endpoint drivers (C1): register-oriented field bus and
//! structured-node sources, behind one shared capability trait.

pub mod config;
pub mod driver;
pub mod error;
pub mod register;
pub mod structured;

pub use config::{
    load_register_servers, load_register_servers_from_file, load_structured_servers,
    load_structured_servers_from_file, RegisterServerSpec, StructuredServerSpec,
};
pub use driver::EndpointDriver;
pub use error::{DriverError, Result};
pub use register::{ReadFunctionCode, RegisterDriver, RegisterEndpoint};
pub use structured::{
    CertificateTriple, SecurityPolicy, StructuredNode, StructuredNodeDriver,
    StructuredNodeServerConfig, StructuredNodeTransport,
};
