//! Interface partition entry point: request-submission API (C4/C5),
//! address-space projector (C3) fed from the CPC partition's snapshot
//! bridges, and request forwarding to the Intermediate VoR partition.

mod handlers;
mod state;

use axum::routing::{delete, get, post};
use axum::Router;
use gateway_core::time::shared_clock;
use gateway_core::GatewayConfig;
use gateway_feedback::TracingSink;
use gateway_rbac::RbacEngine;
use gateway_snapshot::{bridge::subscribe_slot, ProjectedAddressSpace};
use gateway_storage::CredentialStore;
use parking_lot::RwLock;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use state::AppState;

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

    let credentials = Arc::new(CredentialStore::open(&config.storage.credentials_db_path, config.storage.pool_max_connections)?);
    let rbac = Arc::new(RwLock::new(RbacEngine::load_from_csv(&config.rbac.policy_path)?));

    let modbus_space = Arc::new(RwLock::new(ProjectedAddressSpace::new("modbus_shm")));
    let opcua_space = Arc::new(RwLock::new(ProjectedAddressSpace::new("opcua_shm")));

    spawn_reconciler(
        subscribe_slot(config.ipc.snapshot_socket_path("modbus_interface")).await,
        modbus_space.clone(),
    );
    spawn_reconciler(
        subscribe_slot(config.ipc.snapshot_socket_path("opcua_interface")).await,
        opcua_space.clone(),
    );

    let state = Arc::new(AppState {
        credentials,
        rbac,
        feedback: Arc::new(TracingSink),
        clock: shared_clock(),
        queue_socket: config.ipc.queue_socket_path(),
        modbus_space,
        opcua_space,
    });

    let app = Router::new()
        .route("/requests", post(handlers::submit_request))
        .route("/users", post(handlers::add_user))
        .route("/users/list", post(handlers::list_users))
        .route("/users/:user_id", delete(handlers::remove_user))
        .route("/users/:user_id/secret", post(handlers::update_user_secret))
        .route("/users/:user_id/exists", get(handlers::check_user_exists))
        .route("/users/:user_id/role", post(handlers::set_user_role))
        .route("/users/:user_id/details", post(handlers::get_user_details))
        .route("/address-space/modbus", get(handlers::address_space_modbus))
        .route("/address-space/opcua", get(handlers::address_space_opcua))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(&config.interface.bind_address).await?;
    info!(bind_address = %config.interface.bind_address, "interface partition listening");
    axum::serve(listener, app).await?;

    Ok(())
}

fn spawn_reconciler(mut rx: tokio::sync::watch::Receiver<gateway_core::Snapshot>, space: Arc<RwLock<ProjectedAddressSpace>>) {
    tokio::spawn(async move {
        loop {
            let snapshot = rx.borrow_and_update().clone();
            space.write().reconcile(&snapshot);
            if rx.changed().await.is_err() {
                break;
            }
        }
    });
}
