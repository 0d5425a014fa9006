//! ScanSession types

use crate::capture_source::CaptureConfig;
use crate::result_presenter::PresentationView;
use crate::verification_client::VerificationOutcome;
use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Cooldown shown after every result, in one-second ticks
pub const COUNTDOWN_SECS: u32 = 5;

/// Out-of-band resume delay after a transport failure
pub const RETRY_DELAY: Duration = Duration::from_secs(3);

/// Diagnostic log interval for no-detection frames
pub const ATTEMPT_LOG_EVERY: u64 = 100;

/// Session state
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// Not capturing (initial, camera acquisition failed or device lost)
    Idle,
    /// Camera running, waiting for a decode
    Capturing,
    /// One verification call in flight
    Verifying,
    /// Result being handed to the presenter
    Presenting,
    /// Countdown running before capture resumes
    Cooling,
    /// Terminated
    Closed,
}

impl SessionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::Idle => "idle",
            SessionState::Capturing => "capturing",
            SessionState::Verifying => "verifying",
            SessionState::Presenting => "presenting",
            SessionState::Cooling => "cooling",
            SessionState::Closed => "closed",
        }
    }
}

/// Inputs to the state machine
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    CaptureStarted,
    CaptureFailed(String),
    /// Device stopped delivering after a successful start
    CaptureLost(String),
    Decoded(String),
    NoDetection,
    VerificationFinished {
        cycle: u64,
        outcome: VerificationOutcome,
        received_at: NaiveTime,
    },
    Presented {
        cycle: u64,
    },
    CountdownTick {
        cycle: u64,
    },
    RetryElapsed {
        cycle: u64,
    },
    ResumeRequested,
    CloseRequested,
    SetDiagnostics(bool),
}

impl SessionEvent {
    pub fn name(&self) -> &'static str {
        match self {
            SessionEvent::CaptureStarted => "capture_started",
            SessionEvent::CaptureFailed(_) => "capture_failed",
            SessionEvent::CaptureLost(_) => "capture_lost",
            SessionEvent::Decoded(_) => "decoded",
            SessionEvent::NoDetection => "no_detection",
            SessionEvent::VerificationFinished { .. } => "verification_finished",
            SessionEvent::Presented { .. } => "presented",
            SessionEvent::CountdownTick { .. } => "countdown_tick",
            SessionEvent::RetryElapsed { .. } => "retry_elapsed",
            SessionEvent::ResumeRequested => "resume_requested",
            SessionEvent::CloseRequested => "close_requested",
            SessionEvent::SetDiagnostics(_) => "set_diagnostics",
        }
    }
}

/// Side effects requested by the state machine, executed in order
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    StartCapture(CaptureConfig),
    PauseCapture,
    ResumeCapture,
    StopCapture,
    Verify { cycle: u64, payload: String },
    Present { cycle: u64, view: PresentationView },
    StartCountdown { cycle: u64, seconds: u32 },
    ScheduleRetry { cycle: u64, delay: Duration },
    UpdateCountdown { remaining: u32 },
    CancelTimers,
    ClearPresentation,
    ReportFatal(String),
    Terminate,
}

/// Point-in-time view of the session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub state: SessionState,
    pub attempt_count: u64,
    pub cycle: u64,
    pub in_flight: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub countdown_remaining: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_decoded_payload: Option<String>,
    pub diagnostics: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fault: Option<String>,
}
