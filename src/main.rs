//! Check-in Kiosk - gym reception QR scanner
//!
//! Main entry point for the kiosk application.

use checkin_kiosk::{
    capture_source::{CaptureConfig, LineCaptureSource},
    realtime_hub::RealtimeHub,
    result_presenter::HubPresenter,
    scan_controller::{ScanController, ScannerHandle},
    scan_history::ScanHistory,
    scan_session::ScanSession,
    state::{AppConfig, AppState},
    verification_client::HttpVerifier,
    web_api,
};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "checkin_kiosk=debug,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Check-in Kiosk v{}", env!("CARGO_PKG_VERSION"));

    let config = AppConfig::default();
    tracing::info!(
        verify_url = %config.verify_url,
        capture_device = %config.capture_device,
        diagnostics = config.diagnostics,
        "Configuration loaded"
    );

    // Verification client
    let mut verifier = HttpVerifier::with_timeout(
        config.verify_url.clone(),
        Duration::from_secs(config.verify_timeout_secs),
    )?;
    if let Some(token) = &config.csrf_token {
        verifier = verifier.with_csrf_token(token.clone());
    } else {
        tracing::warn!("CSRF_TOKEN not set, verification requests may be rejected");
    }
    if let Some(session) = &config.session_cookie {
        verifier = verifier.with_session_cookie(session.clone());
    }
    let verifier = Arc::new(verifier);

    if !verifier.health_check().await {
        tracing::warn!(endpoint = %verifier.endpoint(), "Verification endpoint not reachable yet");
    }

    // Display fan-out and history
    let realtime = Arc::new(RealtimeHub::new());
    let history = Arc::new(ScanHistory::new(config.history_capacity));
    let presenter = Arc::new(HubPresenter::new(realtime.clone(), history.clone()));

    // Scan session
    let capture = Arc::new(LineCaptureSource::new(config.capture_device.clone()));
    tracing::info!(device = capture.device(), "Using line capture source");
    let session = ScanSession::new()
        .with_diagnostics(config.diagnostics)
        .with_capture_config(CaptureConfig {
            facing: config.capture_facing,
            ..CaptureConfig::default()
        });
    let scanner = ScanController::spawn(capture, verifier.clone(), presenter, session);
    scanner.spawn_status_relay(realtime.clone());
    tracing::info!("ScanController started");

    let state = AppState {
        config: config.clone(),
        scanner: scanner.clone(),
        realtime,
        history,
        verifier,
        started_at: Instant::now(),
    };

    let app = web_api::create_router(state)
        .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any))
        .layer(TraceLayer::new_for_http());

    // Start server
    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(scanner))
        .await?;

    tracing::info!("Check-in Kiosk stopped");
    Ok(())
}

/// Resolves on Ctrl-C or once the operator closed the scanner
async fn shutdown_signal(scanner: ScannerHandle) {
    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                tracing::error!(error = %e, "Failed to listen for shutdown signal");
            }
            tracing::info!("Shutdown signal received");
            scanner.close().await;
            scanner.closed().await;
        }
        _ = scanner.closed() => {
            tracing::info!("Scanner closed, shutting down");
        }
    }
}
