//! Application state
//!
//! Holds all shared components and state

use crate::capture_source::{FacingMode, STDIN_DEVICE};
use crate::realtime_hub::RealtimeHub;
use crate::scan_controller::ScannerHandle;
use crate::scan_history::{ScanHistory, DEFAULT_CAPACITY};
use crate::verification_client::HttpVerifier;
use std::sync::Arc;
use std::time::Instant;

/// Application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Check-in verification endpoint
    pub verify_url: String,
    /// Value sent in the X-CSRFToken header and csrftoken cookie
    pub csrf_token: Option<String>,
    /// Operator session id (sessionid cookie)
    pub session_cookie: Option<String>,
    /// Verification request timeout
    pub verify_timeout_secs: u64,
    /// Capture device path, "-" for stdin
    pub capture_device: String,
    pub capture_facing: FacingMode,
    /// Server port
    pub port: u16,
    /// Server host
    pub host: String,
    /// Number of scan results kept for the operator API
    pub history_capacity: usize,
    /// Start with diagnostic logging of scan attempts
    pub diagnostics: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            verify_url: std::env::var("VERIFY_URL")
                .unwrap_or_else(|_| "http://localhost:8000/api/process-qr-scan/".to_string()),
            csrf_token: std::env::var("CSRF_TOKEN").ok().filter(|t| !t.is_empty()),
            session_cookie: std::env::var("SESSION_COOKIE").ok().filter(|s| !s.is_empty()),
            verify_timeout_secs: std::env::var("VERIFY_TIMEOUT_SECS")
                .ok()
                .and_then(|t| t.parse().ok())
                .unwrap_or(10),
            capture_device: std::env::var("CAPTURE_DEVICE")
                .unwrap_or_else(|_| STDIN_DEVICE.to_string()),
            capture_facing: std::env::var("CAPTURE_FACING")
                .ok()
                .and_then(|f| f.parse().ok())
                .unwrap_or_default(),
            port: std::env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(8090),
            host: std::env::var("HOST")
                .unwrap_or_else(|_| "127.0.0.1".to_string()),
            history_capacity: std::env::var("SCAN_HISTORY_CAPACITY")
                .ok()
                .and_then(|c| c.parse().ok())
                .unwrap_or(DEFAULT_CAPACITY),
            diagnostics: std::env::var("SCANNER_DIAGNOSTICS")
                .map(|v| matches!(v.as_str(), "1" | "true" | "yes" | "on"))
                .unwrap_or(false),
        }
    }
}

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Application config
    pub config: AppConfig,
    /// Running scan controller
    pub scanner: ScannerHandle,
    /// RealtimeHub (WebSocket)
    pub realtime: Arc<RealtimeHub>,
    /// Recent presented results
    pub history: Arc<ScanHistory>,
    /// Verification endpoint client (health checks)
    pub verifier: Arc<HttpVerifier>,
    pub started_at: Instant,
}
