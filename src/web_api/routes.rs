//! API Routes

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::IntoResponse,
    routing::{get, post, put},
    Json, Router,
};
use futures::{SinkExt, StreamExt};

use crate::error::{Error, Result};
use crate::models::{ApiResponse, DiagnosticsRequest, ScanQuery};
use crate::realtime_hub::HubMessage;
use crate::result_presenter::PresentationKind;
use crate::state::AppState;

/// Default page size for `GET /api/scans`
const DEFAULT_SCAN_LIMIT: usize = 50;

/// Create API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health
        .route("/healthz", get(super::health_check))
        .route("/api/status", get(super::kiosk_status))
        // Scanner control
        .route("/api/scanner", get(get_scanner))
        .route("/api/scanner/close", post(close_scanner))
        .route("/api/scanner/resume", post(resume_scanner))
        .route("/api/scanner/diagnostics", put(set_diagnostics))
        // Scan history
        .route("/api/scans", get(list_scans))
        // WebSocket
        .route("/api/ws", get(websocket_handler))
        .with_state(state)
}

// ========================================
// Scanner Handlers
// ========================================

async fn get_scanner(State(state): State<AppState>) -> impl IntoResponse {
    Json(ApiResponse::success(state.scanner.status()))
}

async fn close_scanner(State(state): State<AppState>) -> impl IntoResponse {
    tracing::info!("Close requested by operator");
    state.scanner.close().await;
    Json(ApiResponse::<()>::accepted())
}

async fn resume_scanner(State(state): State<AppState>) -> Result<Json<ApiResponse<()>>> {
    state.scanner.resume().await?;
    Ok(Json(ApiResponse::accepted()))
}

async fn set_diagnostics(
    State(state): State<AppState>,
    Json(req): Json<DiagnosticsRequest>,
) -> Result<Json<ApiResponse<()>>> {
    state.scanner.set_diagnostics(req.enabled).await?;
    Ok(Json(ApiResponse::accepted()))
}

// ========================================
// Scan History Handlers
// ========================================

async fn list_scans(
    State(state): State<AppState>,
    Query(query): Query<ScanQuery>,
) -> Result<impl IntoResponse> {
    let limit = query.limit.unwrap_or(DEFAULT_SCAN_LIMIT);

    let records = match query.kind {
        Some(kind) => {
            let kind: PresentationKind = serde_json::from_value(serde_json::Value::String(kind))
                .map_err(|e| Error::Validation(format!("invalid kind: {}", e)))?;
            state.history.by_kind(kind, limit).await
        }
        None => state.history.latest(limit).await,
    };

    Ok(Json(ApiResponse::success(records)))
}

// ========================================
// WebSocket
// ========================================

async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_websocket(socket, state))
}

/// Handle display connection
async fn handle_websocket(socket: WebSocket, state: AppState) {
    let (mut sender, mut receiver) = socket.split();

    let (conn_id, mut rx) = state.realtime.register().await;

    // New displays start from the current scanner state
    state
        .realtime
        .send_to(&conn_id, HubMessage::ScannerStatus(state.scanner.status()))
        .await;

    let send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if sender.send(Message::Text(msg)).await.is_err() {
                break;
            }
        }
    });

    let recv_task = tokio::spawn(async move {
        while let Some(result) = receiver.next().await {
            match result {
                Ok(Message::Ping(data)) => {
                    tracing::trace!("Received ping: {:?}", data);
                }
                Ok(Message::Close(_)) => {
                    tracing::info!(connection_id = %conn_id, "Display disconnected");
                    break;
                }
                Err(e) => {
                    tracing::warn!(connection_id = %conn_id, error = %e, "WebSocket error");
                    break;
                }
                _ => {}
            }
        }
        conn_id
    });

    let conn_id = tokio::select! {
        _ = send_task => conn_id,
        result = recv_task => result.unwrap_or(conn_id),
    };

    state.realtime.unregister(&conn_id).await;
}
