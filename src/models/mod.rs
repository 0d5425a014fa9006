//! Shared data models

use serde::{Deserialize, Serialize};

/// API response wrapper
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            ok: true,
            data: Some(data),
        }
    }

    /// Acknowledgement without payload
    pub fn accepted() -> Self {
        Self { ok: true, data: None }
    }
}

/// Health check response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_sec: u64,
    pub verifier_reachable: bool,
    pub scanner_state: String,
}

/// Kiosk status response
#[derive(Debug, Serialize, Deserialize)]
pub struct KioskStatusResponse {
    pub device_type: String,
    pub version: String,
    pub uptime_sec: u64,
    pub capture_device: String,
    pub verify_url: String,
    pub display_clients: u64,
    pub scans_recorded: usize,
}

/// Body of `PUT /api/scanner/diagnostics`
#[derive(Debug, Deserialize)]
pub struct DiagnosticsRequest {
    pub enabled: bool,
}

/// Query parameters for `GET /api/scans`
#[derive(Debug, Deserialize)]
pub struct ScanQuery {
    pub limit: Option<usize>,
    pub kind: Option<String>,
}
