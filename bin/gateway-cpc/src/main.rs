//! CPC partition entry point: endpoint drivers (C1), snapshot cache
//! (C2), and the cross-process bridges publishing C2's output to the
//! Interface and Intermediate-VoR partitions when they run as separate
//! OS processes.

use gateway_core::{time::shared_clock, GatewayConfig};
use gateway_drivers::{
    load_register_servers_from_file, load_structured_servers_from_file, EndpointDriver,
    RegisterDriver, StructuredNodeDriver,
};
use gateway_snapshot::{bridge::serve_slot, cache::ProducerGroup, slot::SnapshotSlot};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

mod transport;

use transport::UnimplementedTransport;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let config_path = std::env::args().nth(1).unwrap_or_else(|| "config/gateway.toml".to_string());
    let config = match GatewayConfig::from_file(&config_path) {
        Ok(c) => c,
        Err(e) => {
            error!(error = %e, path = %config_path, "failed to load configuration, using defaults");
            GatewayConfig::default()
        }
    };

    let clock = shared_clock();
    let running = Arc::new(AtomicBool::new(true));
    {
        let running = running.clone();
        tokio::spawn(async move {
            let _ = tokio::signal::ctrl_c().await;
            info!("ctrl-c received, shutting down cpc partition");
            running.store(false, Ordering::SeqCst);
        });
    }

    let register_servers = load_register_servers_from_file(&config.snapshot.register_endpoints_path);
    let modbus_drivers: Vec<Box<dyn EndpointDriver>> = register_servers
        .into_iter()
        .map(|server| {
            Box::new(RegisterDriver::new(server.server_alias, server.socket_addr, server.endpoints, clock.clone()))
                as Box<dyn EndpointDriver>
        })
        .collect();

    let structured_servers = load_structured_servers_from_file(&config.snapshot.structured_node_endpoints_path);
    let opcua_drivers: Vec<Box<dyn EndpointDriver>> = structured_servers
        .into_iter()
        .map(|server| {
            Box::new(StructuredNodeDriver::new(
                server.server_alias,
                server.server_config,
                server.nodes,
                Box::new(UnimplementedTransport::default()),
                clock.clone(),
            )) as Box<dyn EndpointDriver>
        })
        .collect();

    let (modbus_interface, modbus_interface_rx) = SnapshotSlot::new("modbus_interface", config.snapshot.slot_capacity_bytes);
    let (modbus_vor, modbus_vor_rx) = SnapshotSlot::new("modbus_vor", config.snapshot.slot_capacity_bytes);
    let (opcua_interface, opcua_interface_rx) = SnapshotSlot::new("opcua_interface", config.snapshot.slot_capacity_bytes);
    let (opcua_vor, opcua_vor_rx) = SnapshotSlot::new("opcua_vor", config.snapshot.slot_capacity_bytes);

    let groups = vec![
        ProducerGroup { name: "modbus".to_string(), drivers: modbus_drivers, interface_slot: modbus_interface, vor_slot: modbus_vor },
        ProducerGroup { name: "opcua".to_string(), drivers: opcua_drivers, interface_slot: opcua_interface, vor_slot: opcua_vor },
    ];

    for (name, rx) in [
        ("modbus_interface", modbus_interface_rx),
        ("modbus_vor", modbus_vor_rx),
        ("opcua_interface", opcua_interface_rx),
        ("opcua_vor", opcua_vor_rx),
    ] {
        let socket_path = config.ipc.snapshot_socket_path(name);
        tokio::spawn(async move {
            if let Err(e) = serve_slot(&socket_path, rx).await {
                error!(slot = name, error = %e, "snapshot bridge terminated");
            }
        });
    }

    info!("cpc partition running");
    gateway_snapshot::cache::run(groups, Duration::from_secs(config.snapshot.poll_interval_secs), running).await;

    info!("cpc partition stopped");
    Ok(())
}
