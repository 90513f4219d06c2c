//! Request handlers, mirroring
//! `original_source/gateway-komponenten/datenbereitstellung/interface_setup/server_methods.py`
//! one method at a time: the OPC UA method surface becomes an HTTP/JSON
//! surface, but the authenticate-then-authorize-then-act sequencing and
//! the wording of the returned messages are carried over unchanged.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use gateway_core::feedback::{FeedbackRecord, Stage};
use gateway_core::Request as VorRequest;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct SubmitRequestBody {
    pub issuer_id: String,
    pub credentials: String,
    pub description: Vec<String>,
    pub impact: String,
    pub parameter: String,
    pub modification: String,
    pub priority: u8,
}

#[derive(Debug, Serialize)]
pub struct SubmitRequestResponse {
    pub request_id: Uuid,
    pub server_timestamp: chrono::DateTime<Utc>,
    pub message: String,
}

pub async fn submit_request(
    State(state): State<Arc<AppState>>,
    Json(body): Json<SubmitRequestBody>,
) -> (StatusCode, Json<SubmitRequestResponse>) {
    let server_timestamp = state.clock.now();

    let authenticated = state
        .credentials
        .verify(&body.issuer_id, &body.credentials)
        .unwrap_or(false);
    if !authenticated {
        state.feedback.submit(FeedbackRecord::new(
            Stage::Authentication,
            None,
            Some(body.issuer_id.clone()),
            "Authentication failed",
            format!("authentication failed for {}", body.issuer_id),
            server_timestamp,
        ));
        return (
            StatusCode::UNAUTHORIZED,
            Json(SubmitRequestResponse {
                request_id: Uuid::nil(),
                server_timestamp,
                message: format!("Authentication failed for {}", body.issuer_id),
            }),
        );
    }

    let authorized = state.rbac.read().authorize(&body.issuer_id, &body.parameter, &body.modification);
    if !authorized {
        state.feedback.submit(FeedbackRecord::new(
            Stage::Authorization,
            None,
            Some(body.issuer_id.clone()),
            "Authorization failed",
            format!("authorization failed for {} on {}", body.issuer_id, body.parameter),
            server_timestamp,
        ));
        return (
            StatusCode::FORBIDDEN,
            Json(SubmitRequestResponse {
                request_id: Uuid::nil(),
                server_timestamp,
                message: format!("Request authorization failed: {}", body.issuer_id),
            }),
        );
    }

    let request = match VorRequest::new(
        &body.issuer_id,
        server_timestamp,
        body.description,
        &body.impact,
        &body.parameter,
        &body.modification,
        body.priority,
    ) {
        Ok(r) => r,
        Err(e) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(SubmitRequestResponse {
                    request_id: Uuid::nil(),
                    server_timestamp,
                    message: format!("Error: {e}"),
                }),
            )
        }
    };

    let request_id = request.request_id;
    if let Err(e) = gateway_queue::submit(&state.queue_socket, &request).await {
        tracing::error!(error = %e, "error submit request method");
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(SubmitRequestResponse {
                request_id,
                server_timestamp,
                message: format!("Error: {e}"),
            }),
        );
    }

    tracing::info!(priority = body.priority, %server_timestamp, "request received and forwarded");
    (
        StatusCode::OK,
        Json(SubmitRequestResponse {
            request_id,
            server_timestamp,
            message: "Submission received".to_string(),
        }),
    )
}

#[derive(Debug, Serialize)]
pub struct StatusMessage {
    pub message: String,
}

fn status_message(message: impl Into<String>) -> Json<StatusMessage> {
    Json(StatusMessage { message: message.into() })
}

#[derive(Debug, Deserialize)]
pub struct AddUserBody {
    pub admin_id: String,
    pub admin_secret: String,
    pub user_id: String,
    pub secret: String,
}

pub async fn add_user(State(state): State<Arc<AppState>>, Json(body): Json<AddUserBody>) -> (StatusCode, Json<StatusMessage>) {
    if !state.credentials.verify(&body.admin_id, &body.admin_secret).unwrap_or(false) {
        return (StatusCode::FORBIDDEN, status_message(format!("Authentication failed for admin {}.", body.admin_id)));
    }
    if !state.rbac.read().is_admin(&body.admin_id) {
        return (StatusCode::FORBIDDEN, status_message("Admin role required for adding users."));
    }
    if !state.rbac.read().user_exists(&body.user_id) {
        return (StatusCode::FORBIDDEN, status_message(format!("User {} is not part of RBAC policy.", body.user_id)));
    }

    match state.credentials.create(&body.user_id, &body.secret) {
        Ok(()) => (
            StatusCode::OK,
            status_message(format!("User {} added successfully and already exists within RBAC.", body.user_id)),
        ),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, status_message(format!("Error: {e}"))),
    }
}

#[derive(Debug, Deserialize)]
pub struct AdminCredentials {
    pub admin_id: String,
    pub admin_secret: String,
}

pub async fn remove_user(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
    Json(body): Json<AdminCredentials>,
) -> (StatusCode, Json<StatusMessage>) {
    if !state.credentials.verify(&body.admin_id, &body.admin_secret).unwrap_or(false) {
        return (StatusCode::FORBIDDEN, status_message(format!("Authentication failed for admin {}.", body.admin_id)));
    }
    if !state.rbac.read().is_admin(&body.admin_id) {
        return (StatusCode::FORBIDDEN, status_message("Admin role required for user deletion."));
    }

    let Some(details) = state.credentials.get(&user_id).unwrap_or(None) else {
        return (StatusCode::NOT_FOUND, status_message(format!("User {user_id} not found.")));
    };

    let deleted = state.credentials.delete(details.id).unwrap_or(false);
    let rbac_removed = state.rbac.write().delete_user(&user_id).is_ok();
    if deleted && rbac_removed {
        (StatusCode::OK, status_message(format!("User {user_id} deleted successfully.")))
    } else {
        (StatusCode::NOT_FOUND, status_message(format!("User {user_id} not found or could not be deleted.")))
    }
}

#[derive(Debug, Deserialize)]
pub struct UpdateSecretBody {
    pub secret: String,
    pub new_secret: String,
}

pub async fn update_user_secret(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
    Json(body): Json<UpdateSecretBody>,
) -> (StatusCode, Json<StatusMessage>) {
    if !state.credentials.verify(&user_id, &body.secret).unwrap_or(false) {
        return (StatusCode::FORBIDDEN, status_message(format!("Authentication failed for user {user_id}.")));
    }
    match state.credentials.update(&user_id, &body.secret, &body.new_secret) {
        Ok(()) => (StatusCode::OK, status_message(format!("User {user_id} secret updated successfully."))),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, status_message(format!("Failed to update secret for user {user_id}: {e}"))),
    }
}

#[derive(Debug, Serialize)]
pub struct ExistsResponse {
    pub exists: bool,
    pub message: String,
}

pub async fn check_user_exists(State(state): State<Arc<AppState>>, Path(user_id): Path<String>) -> Json<ExistsResponse> {
    match state.credentials.user_exists(&user_id) {
        Ok(exists) => Json(ExistsResponse {
            exists,
            message: if exists { format!("User {user_id} exists.") } else { format!("User {user_id} does not exist.") },
        }),
        Err(e) => Json(ExistsResponse { exists: false, message: format!("Error: {e}") }),
    }
}

#[derive(Debug, Serialize)]
pub struct ListUsersResponse {
    pub users: Vec<String>,
    pub message: String,
}

pub async fn list_users(
    State(state): State<Arc<AppState>>,
    Json(body): Json<AdminCredentials>,
) -> (StatusCode, Json<ListUsersResponse>) {
    if !state.credentials.verify(&body.admin_id, &body.admin_secret).unwrap_or(false) {
        return (
            StatusCode::FORBIDDEN,
            Json(ListUsersResponse { users: vec![], message: format!("Authentication failed for admin {}.", body.admin_id) }),
        );
    }
    if !state.rbac.read().is_admin(&body.admin_id) {
        return (
            StatusCode::FORBIDDEN,
            Json(ListUsersResponse { users: vec![], message: "Admin role required for user listing.".to_string() }),
        );
    }
    match state.credentials.list() {
        Ok(users) => {
            let count = users.len();
            (StatusCode::OK, Json(ListUsersResponse { users, message: format!("Successfully retrieved {count} users.") }))
        }
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, Json(ListUsersResponse { users: vec![], message: format!("Error: {e}") })),
    }
}

#[derive(Debug, Deserialize)]
pub struct SetRoleBody {
    pub admin_id: String,
    pub admin_secret: String,
    #[allow(dead_code)]
    pub role: String,
}

/// Role management is not implemented, mirroring the original's
/// `BadNotImplemented` response: the Casbin-style policy file would
/// need to be rewritten and reloaded atomically, which is out of scope.
pub async fn set_user_role(
    State(state): State<Arc<AppState>>,
    Path(_user_id): Path<String>,
    Json(body): Json<SetRoleBody>,
) -> (StatusCode, Json<StatusMessage>) {
    if !state.credentials.verify(&body.admin_id, &body.admin_secret).unwrap_or(false) {
        return (StatusCode::FORBIDDEN, status_message(format!("Authentication failed for admin {}.", body.admin_id)));
    }
    if !state.rbac.read().is_admin(&body.admin_id) {
        return (StatusCode::FORBIDDEN, status_message("Admin role required for user role management."));
    }
    (StatusCode::NOT_IMPLEMENTED, status_message("Role management is not implemented yet."))
}

#[derive(Debug, Serialize)]
pub struct UserDetailsResponse {
    pub details: Vec<String>,
    pub message: String,
}

pub async fn get_user_details(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
    Json(body): Json<AdminCredentials>,
) -> (StatusCode, Json<UserDetailsResponse>) {
    if !state.credentials.verify(&body.admin_id, &body.admin_secret).unwrap_or(false) {
        return (
            StatusCode::FORBIDDEN,
            Json(UserDetailsResponse { details: vec![], message: format!("Authentication failed for admin {}.", body.admin_id) }),
        );
    }
    if !state.rbac.read().is_admin(&body.admin_id) {
        return (
            StatusCode::FORBIDDEN,
            Json(UserDetailsResponse { details: vec![], message: "Admin role required for user detail extraction.".to_string() }),
        );
    }
    match state.credentials.get(&user_id) {
        Ok(Some(details)) => (
            StatusCode::OK,
            Json(UserDetailsResponse {
                details: vec![format!("id:{}", details.id), format!("username:{}", details.username)],
                message: format!("Successfully retrieved details for user {user_id}."),
            }),
        ),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(UserDetailsResponse { details: vec![], message: format!("User {user_id} not found.") }),
        ),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(UserDetailsResponse { details: vec![], message: format!("Error: {e}") }),
        ),
    }
}

#[derive(Debug, Serialize)]
pub struct AddressSpaceResponse {
    pub objects: std::collections::HashMap<String, std::collections::HashMap<String, gateway_core::WireValue>>,
}

pub async fn address_space_modbus(State(state): State<Arc<AppState>>) -> Json<AddressSpaceResponse> {
    render_address_space(&state.modbus_space)
}

pub async fn address_space_opcua(State(state): State<Arc<AppState>>) -> Json<AddressSpaceResponse> {
    render_address_space(&state.opcua_space)
}

fn render_address_space(space: &parking_lot::RwLock<gateway_snapshot::ProjectedAddressSpace>) -> Json<AddressSpaceResponse> {
    let space = space.read();
    let mut objects = std::collections::HashMap::new();
    for name in space.object_names() {
        if let Some(object) = space.object(&name) {
            let variables = object.variables.iter().map(|(k, v)| (k.clone(), v.value.clone())).collect();
            objects.insert(name, variables);
        }
    }
    Json(AddressSpaceResponse { objects })
}
