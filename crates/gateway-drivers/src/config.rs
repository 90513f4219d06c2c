//! XML endpoint-configuration loaders for the two acquisition sources.
//!
//! Grounded on `original_source/cpc-partition/modbus_tcp_client/modbus_tcp_client.py`'s
//! `load_endpoints_from_xml` (register-oriented) and
//! `original_source/cpc-partition/opcua_client/opcua_client.py`'s server/node
//! parsing (structured-node). Schema validation against a paired `.xsd` is
//! boilerplate and out of scope here: a document that fails to parse, or a
//! server/endpoint whose fields don't resolve to a concrete driver config,
//! is dropped and logged rather than aborting the whole load.

use serde::Deserialize;
use std::net::SocketAddr;
use std::path::Path;

use crate::register::{ReadFunctionCode, RegisterEndpoint};
use crate::structured::{CertificateTriple, SecurityPolicy, StructuredNode, StructuredNodeServerConfig};

#[derive(Debug, Deserialize)]
struct RegisterEndpointXml {
    name: String,
    function: String,
    address: u16,
    quantity: u16,
    offset: i8,
    #[serde(rename = "type")]
    #[allow(dead_code)]
    datatype: String,
    description: String,
}

#[derive(Debug, Deserialize, Default)]
struct RegisterEndpointsXml {
    #[serde(rename = "endpoint", default)]
    endpoint: Vec<RegisterEndpointXml>,
}

#[derive(Debug, Deserialize)]
struct RegisterServerXml {
    ipaddr: String,
    port: u16,
    serveralias: String,
    #[serde(default)]
    endpoints: RegisterEndpointsXml,
}

#[derive(Debug, Deserialize, Default)]
struct RegisterServersXml {
    #[serde(rename = "server", default)]
    server: Vec<RegisterServerXml>,
}

/// One register-oriented server, ready to construct a
/// [`crate::register::RegisterDriver`].
pub struct RegisterServerSpec {
    pub server_alias: String,
    pub socket_addr: SocketAddr,
    pub endpoints: Vec<RegisterEndpoint>,
}

fn parse_function(raw: &str) -> Option<ReadFunctionCode> {
    match raw {
        "Read Holding Registers" => Some(ReadFunctionCode::ReadHoldingRegister),
        "Read Discrete Input" | "Read Discrete Inputs" => Some(ReadFunctionCode::ReadDiscreteInput),
        "Read Coil Status" | "Read Coils" => Some(ReadFunctionCode::ReadCoil),
        other => {
            tracing::warn!(function = other, "unrecognized register function code");
            None
        }
    }
}

/// Parse a `<RegisterServers>` document. Invalid XML yields an empty
/// server list; a server whose `ipaddr:port` doesn't parse, or an
/// endpoint whose function code is unrecognized, is dropped.
pub fn load_register_servers(xml: &str) -> Vec<RegisterServerSpec> {
    let parsed: RegisterServersXml = match quick_xml::de::from_str(xml) {
        Ok(p) => p,
        Err(e) => {
            tracing::error!(error = %e, "register endpoints document invalid, yielding empty server list");
            return Vec::new();
        }
    };

    parsed
        .server
        .into_iter()
        .filter_map(|server| {
            let socket_addr: SocketAddr = match format!("{}:{}", server.ipaddr, server.port).parse() {
                Ok(addr) => addr,
                Err(e) => {
                    tracing::error!(alias = %server.serveralias, error = %e, "invalid server address, dropping server");
                    return None;
                }
            };
            let endpoints = server
                .endpoints
                .endpoint
                .into_iter()
                .filter_map(|e| {
                    let function = parse_function(&e.function)?;
                    Some(RegisterEndpoint {
                        name: e.name,
                        description: e.description,
                        function,
                        address: e.address,
                        quantity: e.quantity,
                        bit_offset: e.offset,
                    })
                })
                .collect();
            Some(RegisterServerSpec { server_alias: server.serveralias, socket_addr, endpoints })
        })
        .collect()
}

pub fn load_register_servers_from_file(path: impl AsRef<Path>) -> Vec<RegisterServerSpec> {
    match std::fs::read_to_string(path.as_ref()) {
        Ok(raw) => load_register_servers(&raw),
        Err(e) => {
            tracing::error!(error = %e, "failed to read register endpoints document");
            Vec::new()
        }
    }
}

#[derive(Debug, Deserialize)]
struct SecurityXml {
    policy: String,
    #[serde(default)]
    client_certificate: Option<String>,
    #[serde(default)]
    client_private_key: Option<String>,
    #[serde(default)]
    server_certificate: Option<String>,
    #[serde(default)]
    username: Option<String>,
    #[serde(default)]
    password: Option<String>,
}

#[derive(Debug, Deserialize)]
struct NodeXml {
    #[serde(rename = "Identifier")]
    identifier: String,
    #[serde(rename = "NamespaceIndex")]
    namespace_index: u16,
    datatype: String,
    description: String,
}

#[derive(Debug, Deserialize, Default)]
struct NodesXml {
    #[serde(rename = "node", default)]
    node: Vec<NodeXml>,
}

#[derive(Debug, Deserialize)]
struct StructuredServerXml {
    #[serde(default)]
    #[allow(dead_code)]
    server_app_uri: Option<String>,
    #[serde(default)]
    #[allow(dead_code)]
    client_app_uri: Option<String>,
    alias: String,
    endpoint_url: String,
    security: SecurityXml,
    #[serde(default)]
    nodes: NodesXml,
}

#[derive(Debug, Deserialize, Default)]
struct StructuredServersXml {
    #[serde(rename = "server", default)]
    server: Vec<StructuredServerXml>,
}

/// One structured-node server, ready to construct a
/// [`crate::structured::StructuredNodeDriver`] once paired with a
/// concrete [`crate::structured::StructuredNodeTransport`].
pub struct StructuredServerSpec {
    pub server_alias: String,
    pub server_config: StructuredNodeServerConfig,
    pub nodes: Vec<StructuredNode>,
}

fn parse_security_policy(raw: &str) -> SecurityPolicy {
    match raw {
        "Basic128Rsa15" => SecurityPolicy::Basic128Rsa15,
        "Basic256" => SecurityPolicy::Basic256,
        "Basic256Sha256" => SecurityPolicy::Basic256Sha256,
        "Aes128Sha256RsaOaep" => SecurityPolicy::Aes128Sha256RsaOaep,
        "Aes256Sha256RsaPss" => SecurityPolicy::Aes256Sha256RsaPss,
        _ => SecurityPolicy::None,
    }
}

/// Parse a `<StructuredNodeServers>` document. Invalid XML yields an
/// empty server list.
pub fn load_structured_servers(xml: &str) -> Vec<StructuredServerSpec> {
    let parsed: StructuredServersXml = match quick_xml::de::from_str(xml) {
        Ok(p) => p,
        Err(e) => {
            tracing::error!(error = %e, "structured-node endpoints document invalid, yielding empty server list");
            return Vec::new();
        }
    };

    parsed
        .server
        .into_iter()
        .map(|server| {
            let certificates = match (
                server.security.client_certificate,
                server.security.client_private_key,
                server.security.server_certificate,
            ) {
                (Some(client_cert_path), Some(client_key_path), Some(server_cert_path)) => {
                    Some(CertificateTriple { client_cert_path, client_key_path, server_cert_path })
                }
                _ => None,
            };
            let server_config = StructuredNodeServerConfig {
                endpoint_url: server.endpoint_url,
                security_policy: parse_security_policy(&server.security.policy),
                certificates,
                trust_store_path: None,
                username: server.security.username,
                password: server.security.password,
            };
            let nodes = server
                .nodes
                .node
                .into_iter()
                .map(|n| StructuredNode {
                    identifier: n.identifier,
                    namespace_index: n.namespace_index,
                    datatype: n.datatype,
                    description: n.description,
                })
                .collect();
            StructuredServerSpec { server_alias: server.alias, server_config, nodes }
        })
        .collect()
}

pub fn load_structured_servers_from_file(path: impl AsRef<Path>) -> Vec<StructuredServerSpec> {
    match std::fs::read_to_string(path.as_ref()) {
        Ok(raw) => load_structured_servers(&raw),
        Err(e) => {
            tracing::error!(error = %e, "failed to read structured-node endpoints document");
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const REGISTER_XML: &str = r#"
        <RegisterServers>
            <server>
                <ipaddr>10.0.0.5</ipaddr>
                <port>502</port>
                <serveralias>plant-a</serveralias>
                <endpoints>
                    <endpoint>
                        <name>MotorSpeed_PV</name>
                        <function>Read Holding Registers</function>
                        <address>0</address>
                        <quantity>1</quantity>
                        <offset>-1</offset>
                        <type>u16</type>
                        <description>motor speed process value</description>
                    </endpoint>
                    <endpoint>
                        <name>Pump:Running</name>
                        <function>Read Coil Status</function>
                        <address>3</address>
                        <quantity>1</quantity>
                        <offset>-1</offset>
                        <type>bool</type>
                        <description>pump running state</description>
                    </endpoint>
                </endpoints>
            </server>
        </RegisterServers>
    "#;

    #[test]
    fn load_register_servers_parses_server_and_endpoints() {
        let servers = load_register_servers(REGISTER_XML);
        assert_eq!(servers.len(), 1);
        let server = &servers[0];
        assert_eq!(server.server_alias, "plant-a");
        assert_eq!(server.socket_addr.to_string(), "10.0.0.5:502");
        assert_eq!(server.endpoints.len(), 2);
        assert_eq!(server.endpoints[0].function, ReadFunctionCode::ReadHoldingRegister);
        assert_eq!(server.endpoints[1].function, ReadFunctionCode::ReadCoil);
    }

    #[test]
    fn load_register_servers_drops_unparseable_document() {
        assert!(load_register_servers("<not valid").is_empty());
    }

    const STRUCTURED_XML: &str = r#"
        <StructuredNodeServers>
            <server>
                <server_app_uri>urn:plant-a:server</server_app_uri>
                <client_app_uri>urn:gateway:client</client_app_uri>
                <alias>plant-a</alias>
                <endpoint_url>opc.tcp://10.0.0.6:4840</endpoint_url>
                <security>
                    <policy>Basic256Sha256</policy>
                    <username>gateway</username>
                    <password>secret</password>
                </security>
                <nodes>
                    <node>
                        <Identifier>2</Identifier>
                        <NamespaceIndex>2</NamespaceIndex>
                        <datatype>u16</datatype>
                        <description>motor speed setpoint</description>
                    </node>
                </nodes>
            </server>
        </StructuredNodeServers>
    "#;

    #[test]
    fn load_structured_servers_parses_server_security_and_nodes() {
        let servers = load_structured_servers(STRUCTURED_XML);
        assert_eq!(servers.len(), 1);
        let server = &servers[0];
        assert_eq!(server.server_alias, "plant-a");
        assert_eq!(server.server_config.security_policy, SecurityPolicy::Basic256Sha256);
        assert_eq!(server.server_config.username.as_deref(), Some("gateway"));
        assert!(server.server_config.certificates.is_none());
        assert_eq!(server.nodes.len(), 1);
        assert_eq!(server.nodes[0].identifier, "2");
    }
}
