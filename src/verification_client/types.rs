//! Verification wire types and response classification

use serde::{Deserialize, Serialize};

/// Request body sent to the verification endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyRequest {
    pub qr_data: String,
}

/// Subject (member) details returned by the server.
///
/// Display data only; forwarded verbatim.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SubjectInfo {
    #[serde(default)]
    pub name: Option<String>,

    /// National identifier (RUT)
    #[serde(default)]
    pub rut: Option<String>,

    #[serde(default)]
    pub membership_plan: Option<String>,

    #[serde(default)]
    pub membership_end: Option<String>,

    #[serde(default)]
    pub access_time: Option<String>,

    #[serde(default)]
    pub first_access_today: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub days_remaining: Option<serde_json::Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weekly_access: Option<serde_json::Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub monthly_access: Option<serde_json::Value>,
}

/// Response body (HTTP 2xx or 403)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VerifyResponse {
    #[serde(default)]
    pub success: bool,

    #[serde(default)]
    pub status: Option<String>,

    #[serde(default)]
    pub already_accessed_today: Option<bool>,

    #[serde(default)]
    pub error: Option<String>,

    #[serde(default)]
    pub message: Option<String>,

    #[serde(default)]
    pub user: Option<SubjectInfo>,
}

/// Result of one verification call
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum VerificationOutcome {
    /// First valid access of the day
    Granted { subject: SubjectInfo },
    /// Member already checked in today (warning, not a denial)
    AlreadyProcessedToday {
        subject: SubjectInfo,
        reason: Option<String>,
    },
    /// Server explicitly refused access
    Denied {
        subject: Option<SubjectInfo>,
        reason: Option<String>,
    },
    /// Network failure, unexpected status or unparseable body
    TransportFailure { reason: String },
}

impl VerificationOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            VerificationOutcome::Granted { .. } => "granted",
            VerificationOutcome::AlreadyProcessedToday { .. } => "already_processed_today",
            VerificationOutcome::Denied { .. } => "denied",
            VerificationOutcome::TransportFailure { .. } => "transport_failure",
        }
    }

    pub fn is_transport_failure(&self) -> bool {
        matches!(self, VerificationOutcome::TransportFailure { .. })
    }
}

/// HTTP statuses whose body is parsed as a verification answer
fn is_answer_status(status: u16) -> bool {
    (200..300).contains(&status) || status == 403
}

/// Map an HTTP status and raw body to an outcome.
///
/// Only 2xx and 403 carry an answer; 403 counts only when it reports an
/// earlier check-in today, otherwise it is a transport failure.
pub fn classify_response(status: u16, body: &[u8]) -> VerificationOutcome {
    if !is_answer_status(status) {
        return VerificationOutcome::TransportFailure {
            reason: format!("HTTP {}", status),
        };
    }

    match serde_json::from_slice::<VerifyResponse>(body) {
        Ok(response) => classify_parsed(status, response),
        Err(e) => VerificationOutcome::TransportFailure {
            reason: format!("Malformed response body: {}", e),
        },
    }
}

/// Map an already-parsed answer body
pub fn classify_parsed(status: u16, response: VerifyResponse) -> VerificationOutcome {
    let http_success = (200..300).contains(&status);

    if http_success && response.success && response.status.as_deref() == Some("allowed") {
        return VerificationOutcome::Granted {
            subject: response.user.unwrap_or_default(),
        };
    }

    // Server sends `message` on some denials instead of `error`
    let reason = response.error.or(response.message);

    if response.already_accessed_today == Some(true) {
        return VerificationOutcome::AlreadyProcessedToday {
            subject: response.user.unwrap_or_default(),
            reason,
        };
    }

    if !http_success {
        return VerificationOutcome::TransportFailure {
            reason: format!("HTTP {} without already_accessed_today", status),
        };
    }

    VerificationOutcome::Denied {
        subject: response.user,
        reason,
    }
}
