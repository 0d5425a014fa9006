//! Presentation types

use crate::verification_client::{SubjectInfo, VerificationOutcome};
use chrono::NaiveTime;
use serde::{Deserialize, Serialize};

pub const UNKNOWN_SUBJECT: &str = "Unknown subject";
pub const NOT_AVAILABLE: &str = "N/A";
pub const NO_ACTIVE_PLAN: &str = "No active plan";
pub const EXPIRED: &str = "EXPIRED";
pub const CONNECTION_ERROR: &str = "Connection error";
pub const CONNECTION_ERROR_PLAN: &str = "Error";
pub const CONNECTION_ERROR_EXPIRY: &str = "Processing failed";
pub const CONNECTION_ERROR_DETAIL: &str = "Could not reach the server";

/// Visual state of a result card
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PresentationKind {
    Granted,
    Warning,
    Denied,
    ConnectionError,
}

/// Data handed to the presenter for one result card
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresentationView {
    pub allowed: bool,
    pub already_accessed_today: bool,
    pub kind: PresentationKind,
    pub name: String,
    pub rut: String,
    pub plan: String,
    pub expiry: String,
    pub time: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub days_remaining: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weekly_access: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub monthly_access: Option<serde_json::Value>,
}

fn clock(time: NaiveTime) -> String {
    time.format("%H:%M:%S").to_string()
}

impl PresentationView {
    /// Build the card for an outcome. `received_at` stamps results the
    /// server did not time itself.
    pub fn from_outcome(outcome: &VerificationOutcome, received_at: NaiveTime) -> Self {
        match outcome {
            VerificationOutcome::Granted { subject } => Self::granted(subject),
            VerificationOutcome::AlreadyProcessedToday { subject, reason } => {
                Self::already_processed(subject, reason.clone())
            }
            VerificationOutcome::Denied { subject, reason } => {
                Self::denied(subject.as_ref(), reason.clone(), received_at)
            }
            VerificationOutcome::TransportFailure { .. } => Self::connection_error(received_at),
        }
    }

    fn granted(subject: &SubjectInfo) -> Self {
        Self {
            allowed: true,
            already_accessed_today: false,
            kind: PresentationKind::Granted,
            name: subject.name.clone().unwrap_or_default(),
            rut: subject.rut.clone().unwrap_or_default(),
            plan: subject.membership_plan.clone().unwrap_or_default(),
            expiry: subject.membership_end.clone().unwrap_or_default(),
            time: subject.access_time.clone().unwrap_or_default(),
            error: None,
            days_remaining: subject.days_remaining.clone(),
            weekly_access: subject.weekly_access.clone(),
            monthly_access: subject.monthly_access.clone(),
        }
    }

    fn already_processed(subject: &SubjectInfo, reason: Option<String>) -> Self {
        Self {
            allowed: false,
            already_accessed_today: true,
            kind: PresentationKind::Warning,
            name: subject.name.clone().unwrap_or_default(),
            rut: subject.rut.clone().unwrap_or_default(),
            plan: subject.membership_plan.clone().unwrap_or_default(),
            expiry: subject.membership_end.clone().unwrap_or_default(),
            time: subject
                .first_access_today
                .clone()
                .or_else(|| subject.access_time.clone())
                .unwrap_or_default(),
            error: reason,
            days_remaining: None,
            weekly_access: subject.weekly_access.clone(),
            monthly_access: subject.monthly_access.clone(),
        }
    }

    fn denied(subject: Option<&SubjectInfo>, reason: Option<String>, received_at: NaiveTime) -> Self {
        let name = subject.and_then(|s| s.name.clone());
        let rut = subject.and_then(|s| s.rut.clone());
        let plan = subject.and_then(|s| s.membership_plan.clone());

        Self {
            allowed: false,
            already_accessed_today: false,
            kind: PresentationKind::Denied,
            name: name.unwrap_or_else(|| UNKNOWN_SUBJECT.to_string()),
            rut: rut.unwrap_or_else(|| NOT_AVAILABLE.to_string()),
            plan: plan.unwrap_or_else(|| NO_ACTIVE_PLAN.to_string()),
            expiry: EXPIRED.to_string(),
            time: clock(received_at),
            error: reason,
            days_remaining: None,
            weekly_access: None,
            monthly_access: None,
        }
    }

    fn connection_error(received_at: NaiveTime) -> Self {
        Self {
            allowed: false,
            already_accessed_today: false,
            kind: PresentationKind::ConnectionError,
            name: CONNECTION_ERROR.to_string(),
            rut: NOT_AVAILABLE.to_string(),
            plan: CONNECTION_ERROR_PLAN.to_string(),
            expiry: CONNECTION_ERROR_EXPIRY.to_string(),
            time: clock(received_at),
            error: Some(CONNECTION_ERROR_DETAIL.to_string()),
            days_remaining: None,
            weekly_access: None,
            monthly_access: None,
        }
    }
}
