//! Check-in Kiosk Library
//!
//! QR scan session controller for the gym reception kiosk
//!
//! ## Architecture (7 Components)
//!
//! 1. ScanSession - Pure scan state machine
//! 2. CaptureSource - QR capture device abstraction
//! 3. VerificationClient - Check-in verification endpoint adapter
//! 4. ResultPresenter - Result card rendering
//! 5. ScanController - Async driver for the session
//! 6. RealtimeHub - WebSocket distribution to kiosk displays
//! 7. WebAPI - Local operator endpoints
//!
//! ## Design Principles
//!
//! - One verification per physical scan
//! - Capture only runs while the session is Capturing
//! - Close is safe from any state

pub mod capture_source;
pub mod error;
pub mod models;
pub mod realtime_hub;
pub mod result_presenter;
pub mod scan_controller;
pub mod scan_history;
pub mod scan_session;
pub mod state;
pub mod verification_client;
pub mod web_api;

pub use error::{Error, Result};
pub use state::AppState;
