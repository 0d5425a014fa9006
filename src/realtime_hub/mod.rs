//! RealtimeHub - Display Fan-out over WebSocket
//!
//! ## Responsibilities
//!
//! - Display client connection management
//! - Broadcasting scan results, countdown ticks and scanner faults
//!
//! Kiosk screens connect to `/api/ws` and render whatever the hub sends;
//! the hub keeps no history of its own (see ScanHistory).

use crate::result_presenter::PresentationView;
use crate::scan_session::SessionSnapshot;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Hub message types
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "data")]
#[serde(rename_all = "snake_case")]
pub enum HubMessage {
    /// Result card to display
    ScanResult(ScanResultMessage),
    /// Cooldown countdown while a result is displayed
    CountdownTick(CountdownTickMessage),
    /// Result card dismissed, scanning again
    ResultCleared(ResultClearedMessage),
    /// Session status (sent to newly connected displays)
    ScannerStatus(SessionSnapshot),
    /// Fatal scanner problem requiring operator action
    ScannerFault(ScannerFaultMessage),
    /// Session terminated
    SessionClosed(SessionClosedMessage),
}

impl HubMessage {
    pub fn message_type(&self) -> &'static str {
        match self {
            HubMessage::ScanResult(_) => "scan_result",
            HubMessage::CountdownTick(_) => "countdown_tick",
            HubMessage::ResultCleared(_) => "result_cleared",
            HubMessage::ScannerStatus(_) => "scanner_status",
            HubMessage::ScannerFault(_) => "scanner_fault",
            HubMessage::SessionClosed(_) => "session_closed",
        }
    }
}

/// Scan result message
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanResultMessage {
    pub view: PresentationView,
    /// Countdown length before scanning resumes
    pub countdown_secs: u32,
    pub timestamp: String,
}

/// Countdown tick message
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CountdownTickMessage {
    pub seconds_remaining: u32,
}

/// Result cleared message
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultClearedMessage {
    pub timestamp: String,
}

/// Scanner fault message
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScannerFaultMessage {
    pub message: String,
    pub timestamp: String,
}

/// Session closed message
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionClosedMessage {
    pub timestamp: String,
}

/// Client connection
struct ClientConnection {
    id: Uuid,
    tx: mpsc::UnboundedSender<String>,
}

/// RealtimeHub instance
pub struct RealtimeHub {
    connections: RwLock<HashMap<Uuid, ClientConnection>>,
    connection_count: AtomicU64,
}

impl RealtimeHub {
    /// Create new RealtimeHub
    pub fn new() -> Self {
        Self {
            connections: RwLock::new(HashMap::new()),
            connection_count: AtomicU64::new(0),
        }
    }

    /// Register a new display client
    pub async fn register(&self) -> (Uuid, mpsc::UnboundedReceiver<String>) {
        let id = Uuid::new_v4();
        let (tx, rx) = mpsc::unbounded_channel();

        {
            let mut connections = self.connections.write().await;
            connections.insert(id, ClientConnection { id, tx });
        }

        self.connection_count.fetch_add(1, Ordering::Relaxed);

        tracing::info!(connection_id = %id, "Display connected");

        (id, rx)
    }

    /// Unregister a client
    pub async fn unregister(&self, id: &Uuid) {
        let mut connections = self.connections.write().await;
        if connections.remove(id).is_some() {
            self.connection_count.fetch_sub(1, Ordering::Relaxed);
            tracing::info!(connection_id = %id, "Display disconnected");
        }
    }

    /// Broadcast message to all clients
    pub async fn broadcast(&self, message: HubMessage) {
        let msg_type = message.message_type();

        let json = match serde_json::to_string(&message) {
            Ok(j) => j,
            Err(e) => {
                tracing::error!(error = %e, "Failed to serialize message");
                return;
            }
        };

        let connections = self.connections.read().await;
        tracing::debug!(
            message_type = %msg_type,
            client_count = connections.len(),
            "Broadcasting message to displays"
        );

        for conn in connections.values() {
            if let Err(e) = conn.tx.send(json.clone()) {
                tracing::warn!(connection_id = %conn.id, error = %e, "Failed to send message");
            }
        }
    }

    /// Send message to one client
    pub async fn send_to(&self, id: &Uuid, message: HubMessage) {
        let json = match serde_json::to_string(&message) {
            Ok(j) => j,
            Err(e) => {
                tracing::error!(error = %e, "Failed to serialize message");
                return;
            }
        };

        let connections = self.connections.read().await;
        if let Some(conn) = connections.get(id) {
            if let Err(e) = conn.tx.send(json) {
                tracing::warn!(connection_id = %conn.id, error = %e, "Failed to send message");
            }
        }
    }

    /// Get connection count
    pub fn connection_count(&self) -> u64 {
        self.connection_count.load(Ordering::Relaxed)
    }
}

impl Default for RealtimeHub {
    fn default() -> Self {
        Self::new()
    }
}
