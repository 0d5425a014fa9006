//! WebAPI - Local Operator API
//!
//! ## Responsibilities
//!
//! - Scanner control (close, resume, diagnostics)
//! - Status and recent scan queries
//! - WebSocket feed for kiosk displays

mod routes;

pub use routes::create_router;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;

use crate::models::{HealthResponse, KioskStatusResponse};
use crate::state::AppState;

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let verifier_ok = state.verifier.health_check().await;

    let response = HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_sec: state.started_at.elapsed().as_secs(),
        verifier_reachable: verifier_ok,
        scanner_state: state.scanner.status().state.as_str().to_string(),
    };

    Json(response)
}

/// Kiosk status endpoint
pub async fn kiosk_status(State(state): State<AppState>) -> impl IntoResponse {
    Json(KioskStatusResponse {
        device_type: "checkin-kiosk".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_sec: state.started_at.elapsed().as_secs(),
        capture_device: state.config.capture_device.clone(),
        verify_url: state.verifier.endpoint().to_string(),
        display_clients: state.realtime.connection_count(),
        scans_recorded: state.history.count().await,
    })
}
