//! ResultPresenter - Result Card Rendering
//!
//! ## Responsibilities
//!
//! - Render granted / warning / denied / connection-error cards
//! - Show the cooldown countdown
//! - Surface fatal scanner faults to the operator
//!
//! The countdown timer itself is owned by the scan controller; presenters
//! only render the ticks they are given.

mod types;

pub use types::*;

use crate::realtime_hub::{
    CountdownTickMessage, HubMessage, RealtimeHub, ResultClearedMessage, ScanResultMessage,
    ScannerFaultMessage, SessionClosedMessage,
};
use crate::scan_history::{ScanHistory, ScanRecord};
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;

/// Presenter contract used by the scan controller
#[async_trait]
pub trait ResultPresenter: Send + Sync {
    /// Display a result card with a countdown of `countdown_secs`
    async fn show(&self, view: &PresentationView, countdown_secs: u32);

    /// Update the countdown display
    async fn countdown(&self, remaining: u32);

    /// Dismiss the result card
    async fn clear(&self);

    /// Report a fatal, operator-visible problem
    async fn fatal(&self, message: &str);

    /// Session terminated
    async fn closed(&self);
}

/// Presenter broadcasting to kiosk displays and recording history
pub struct HubPresenter {
    hub: Arc<RealtimeHub>,
    history: Arc<ScanHistory>,
}

impl HubPresenter {
    pub fn new(hub: Arc<RealtimeHub>, history: Arc<ScanHistory>) -> Self {
        Self { hub, history }
    }
}

#[async_trait]
impl ResultPresenter for HubPresenter {
    async fn show(&self, view: &PresentationView, countdown_secs: u32) {
        match view.kind {
            PresentationKind::Granted => {
                tracing::info!(name = %view.name, rut = %view.rut, "Access granted");
            }
            PresentationKind::Warning => {
                tracing::warn!(name = %view.name, first_access = %view.time, "Already checked in today");
            }
            PresentationKind::Denied => {
                tracing::warn!(name = %view.name, reason = ?view.error, "Access denied");
            }
            PresentationKind::ConnectionError => {
                tracing::error!("Verification server unreachable");
            }
        }

        self.history.add(ScanRecord::from_view(view)).await;

        self.hub
            .broadcast(HubMessage::ScanResult(ScanResultMessage {
                view: view.clone(),
                countdown_secs,
                timestamp: Utc::now().to_rfc3339(),
            }))
            .await;
    }

    async fn countdown(&self, remaining: u32) {
        self.hub
            .broadcast(HubMessage::CountdownTick(CountdownTickMessage {
                seconds_remaining: remaining,
            }))
            .await;
    }

    async fn clear(&self) {
        self.hub
            .broadcast(HubMessage::ResultCleared(ResultClearedMessage {
                timestamp: Utc::now().to_rfc3339(),
            }))
            .await;
    }

    async fn fatal(&self, message: &str) {
        tracing::error!(message = %message, "Scanner fault");
        self.hub
            .broadcast(HubMessage::ScannerFault(ScannerFaultMessage {
                message: message.to_string(),
                timestamp: Utc::now().to_rfc3339(),
            }))
            .await;
    }

    async fn closed(&self) {
        self.hub
            .broadcast(HubMessage::SessionClosed(SessionClosedMessage {
                timestamp: Utc::now().to_rfc3339(),
            }))
            .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::verification_client::VerificationOutcome;
    use chrono::NaiveTime;

    #[tokio::test]
    async fn test_show_records_and_broadcasts() {
        let hub = Arc::new(RealtimeHub::new());
        let history = Arc::new(ScanHistory::default());
        let presenter = HubPresenter::new(hub.clone(), history.clone());
        let (_id, mut rx) = hub.register().await;

        let view = PresentationView::from_outcome(
            &VerificationOutcome::Denied {
                subject: None,
                reason: None,
            },
            NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
        );
        presenter.show(&view, 5).await;

        assert_eq!(history.count().await, 1);
        let value: serde_json::Value = serde_json::from_str(&rx.recv().await.unwrap()).unwrap();
        assert_eq!(value["type"], "scan_result");
        assert_eq!(value["data"]["countdown_secs"], 5);
        assert_eq!(value["data"]["view"]["kind"], "denied");
    }

    #[tokio::test]
    async fn test_fatal_broadcasts_fault() {
        let hub = Arc::new(RealtimeHub::new());
        let presenter = HubPresenter::new(hub.clone(), Arc::new(ScanHistory::default()));
        let (_id, mut rx) = hub.register().await;

        presenter.fatal("camera missing").await;

        let value: serde_json::Value = serde_json::from_str(&rx.recv().await.unwrap()).unwrap();
        assert_eq!(value["type"], "scanner_fault");
        assert_eq!(value["data"]["message"], "camera missing");
    }
}
