// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP transport: the route table binding the core subsystems to wire
//! endpoints. Bodies are TOON in both directions; devices speak the legacy
//! dialect behind attestation, operators speak typed behind bearer auth.

pub mod admin;
pub mod auth;
pub mod body;
pub mod device;

use axum::middleware;
use axum::routing::{delete, get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::state::SharedState;

/// Build the axum `Router` with every endpoint.
pub fn build_router(state: SharedState) -> Router {
    let operator = Router::new()
        // Employees
        .route("/employees/list", get(admin::employees_list))
        .route("/employees/enroll", post(admin::employees_enroll))
        .route("/employees/update", post(admin::employees_update))
        .route("/employees/delete", post(admin::employees_delete))
        // Reports
        .route("/reports/attendance", post(admin::reports_attendance))
        .route("/reports/summary", post(admin::reports_summary))
        .route("/reports/{id}/download", get(admin::reports_download))
        .route("/reports/{id}", delete(admin::reports_delete))
        // Fleet management
        .route("/devices", get(admin::devices_list))
        .route("/devices/export", get(admin::devices_export))
        .route("/devices/{id}", get(admin::devices_detail))
        .route("/devices/command", post(admin::devices_command))
        .route("/devices/revoke", post(admin::devices_revoke))
        .route("/devices/bulk-revoke", post(admin::devices_bulk_revoke))
        // Firmware administration
        .route("/firmware/publish", post(admin::firmware_publish))
        .route("/firmware/deprecate", post(admin::firmware_deprecate))
        .layer(middleware::from_fn_with_state(state.clone(), auth::operator_layer));

    let devices = Router::new()
        .route("/devices/register", post(device::register))
        .route("/devices/events", post(device::ingest_events))
        .route("/devices/heartbeat", post(device::heartbeat))
        .route("/devices/commands", get(device::poll_commands))
        .route("/devices/command-ack", post(device::command_ack))
        .route("/devices/firmware/check", post(device::firmware_check))
        .route("/devices/firmware/ack", post(device::firmware_ack))
        .route("/devices/logs", post(device::upload_logs))
        // Token-gated, not attested: the signed URL is the credential.
        .route("/firmware/{id}/download", get(device::firmware_download))
        // Health (no auth)
        .route("/health", get(device::health));

    Router::new()
        .merge(devices)
        .merge(operator)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
