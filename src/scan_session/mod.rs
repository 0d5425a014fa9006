//! ScanSession - Check-in Scan State Machine
//!
//! ## Responsibilities
//!
//! - Track the scan cycle: Idle -> Capturing -> Verifying -> Presenting -> Cooling -> Capturing
//! - Guarantee at most one verification per physical scan
//! - Decide which timers run and which one resumes capture
//!
//! ## Design
//!
//! `handle` is synchronous and performs no I/O. It returns the effects the
//! controller must execute (capture calls, verification, timers, rendering).
//! Every asynchronous input carries the `cycle` it was issued for; inputs from
//! an older cycle are dropped, which is what makes resume idempotent and late
//! responses harmless.

mod types;

pub use types::*;

use crate::capture_source::CaptureConfig;
use crate::result_presenter::PresentationView;

/// Scan session (one per kiosk process)
#[derive(Debug)]
pub struct ScanSession {
    state: SessionState,
    attempt_count: u64,
    last_decoded_payload: Option<String>,
    cycle: u64,
    in_flight: u8,
    countdown_remaining: u32,
    retry_pending: bool,
    start_requested: bool,
    diagnostics: bool,
    fault: Option<String>,
    capture_config: CaptureConfig,
}

impl ScanSession {
    /// Create new session in Idle
    pub fn new() -> Self {
        Self {
            state: SessionState::Idle,
            attempt_count: 0,
            last_decoded_payload: None,
            cycle: 0,
            in_flight: 0,
            countdown_remaining: 0,
            retry_pending: false,
            start_requested: false,
            diagnostics: false,
            fault: None,
            capture_config: CaptureConfig::default(),
        }
    }

    pub fn with_diagnostics(mut self, enabled: bool) -> Self {
        self.diagnostics = enabled;
        self
    }

    pub fn with_capture_config(mut self, config: CaptureConfig) -> Self {
        self.capture_config = config;
        self
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn attempt_count(&self) -> u64 {
        self.attempt_count
    }

    pub fn cycle(&self) -> u64 {
        self.cycle
    }

    pub fn in_flight(&self) -> u8 {
        self.in_flight
    }

    pub fn countdown_remaining(&self) -> u32 {
        self.countdown_remaining
    }

    pub fn last_decoded_payload(&self) -> Option<&str> {
        self.last_decoded_payload.as_deref()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            state: self.state,
            attempt_count: self.attempt_count,
            cycle: self.cycle,
            in_flight: self.in_flight,
            countdown_remaining: (self.state == SessionState::Cooling)
                .then_some(self.countdown_remaining),
            last_decoded_payload: self.last_decoded_payload.clone(),
            diagnostics: self.diagnostics,
            fault: self.fault.clone(),
        }
    }

    /// Request camera acquisition. Only acts from Idle.
    pub fn start(&mut self) -> Vec<Effect> {
        if self.state != SessionState::Idle || self.start_requested {
            tracing::debug!(state = self.state.as_str(), "Start ignored");
            return Vec::new();
        }

        self.start_requested = true;
        self.fault = None;
        tracing::info!(
            fps = self.capture_config.fps,
            region = self.capture_config.detection_region.width,
            "Requesting capture device"
        );
        vec![Effect::StartCapture(self.capture_config.clone())]
    }

    /// Apply one event and return the effects to execute
    pub fn handle(&mut self, event: SessionEvent) -> Vec<Effect> {
        if self.state == SessionState::Closed {
            tracing::trace!(event = event.name(), "Event after close ignored");
            return Vec::new();
        }

        match event {
            SessionEvent::CaptureStarted => self.on_capture_started(),
            SessionEvent::CaptureFailed(reason) => self.on_capture_failed(reason),
            SessionEvent::CaptureLost(reason) => self.on_capture_lost(reason),
            SessionEvent::Decoded(payload) => self.on_decoded(payload),
            SessionEvent::NoDetection => {
                self.on_no_detection();
                Vec::new()
            }
            SessionEvent::VerificationFinished {
                cycle,
                outcome,
                received_at,
            } => {
                if cycle != self.cycle || self.state != SessionState::Verifying {
                    tracing::debug!(cycle, current = self.cycle, "Stale verification result dropped");
                    return Vec::new();
                }

                self.in_flight = 0;
                self.retry_pending = outcome.is_transport_failure();
                self.state = SessionState::Presenting;

                tracing::info!(cycle, outcome = outcome.label(), "Verification finished");

                let view = PresentationView::from_outcome(&outcome, received_at);
                vec![Effect::Present { cycle, view }]
            }
            SessionEvent::Presented { cycle } => self.on_presented(cycle),
            SessionEvent::CountdownTick { cycle } => self.on_countdown_tick(cycle),
            SessionEvent::RetryElapsed { cycle } => {
                if cycle != self.cycle {
                    return Vec::new();
                }
                tracing::info!(cycle, "Retry delay elapsed, resuming");
                self.resume()
            }
            SessionEvent::ResumeRequested => self.resume(),
            SessionEvent::CloseRequested => self.close(),
            SessionEvent::SetDiagnostics(enabled) => {
                self.diagnostics = enabled;
                tracing::info!(enabled, "Diagnostics toggled");
                Vec::new()
            }
        }
    }

    fn enter_capturing(&mut self) {
        self.state = SessionState::Capturing;
        self.attempt_count = 0;
        self.cycle += 1;
        self.countdown_remaining = 0;
        self.retry_pending = false;
    }

    fn on_capture_started(&mut self) -> Vec<Effect> {
        if self.state != SessionState::Idle || !self.start_requested {
            return Vec::new();
        }

        self.enter_capturing();
        tracing::info!(cycle = self.cycle, "Scanner started");
        Vec::new()
    }

    fn on_capture_failed(&mut self, reason: String) -> Vec<Effect> {
        if self.state != SessionState::Idle {
            return Vec::new();
        }

        // Stay in Idle; a new start() must come from the operator
        self.start_requested = false;
        let message = format!(
            "Could not start the scanner: {}. Check the reader is connected and readable.",
            reason
        );
        self.fault = Some(message.clone());
        tracing::error!(reason = %reason, "Capture device unavailable");
        vec![Effect::ReportFatal(message)]
    }

    fn on_capture_lost(&mut self, reason: String) -> Vec<Effect> {
        if self.state == SessionState::Idle {
            return Vec::new();
        }

        let previous = self.state;
        self.state = SessionState::Idle;
        self.start_requested = false;
        self.in_flight = 0;
        self.countdown_remaining = 0;
        self.retry_pending = false;

        let message = format!(
            "Scanner disconnected: {}. Reconnect the reader and restart the kiosk.",
            reason
        );
        self.fault = Some(message.clone());
        tracing::error!(previous = previous.as_str(), reason = %reason, "Capture device lost");

        vec![
            Effect::StopCapture,
            Effect::CancelTimers,
            Effect::ReportFatal(message),
        ]
    }

    fn on_decoded(&mut self, payload: String) -> Vec<Effect> {
        if self.state != SessionState::Capturing || self.in_flight > 0 {
            tracing::debug!(state = self.state.as_str(), "Decode dropped");
            return Vec::new();
        }

        self.state = SessionState::Verifying;
        self.in_flight = 1;
        self.last_decoded_payload = Some(payload.clone());

        tracing::info!(cycle = self.cycle, attempts = self.attempt_count, "QR decoded, verifying");

        vec![
            Effect::PauseCapture,
            Effect::Verify {
                cycle: self.cycle,
                payload,
            },
        ]
    }

    fn on_no_detection(&mut self) {
        if self.state != SessionState::Capturing {
            return;
        }

        self.attempt_count += 1;
        if self.diagnostics && self.attempt_count % ATTEMPT_LOG_EVERY == 0 {
            tracing::info!(attempts = self.attempt_count, "Scan attempts without decode");
        }
    }

    fn on_presented(&mut self, cycle: u64) -> Vec<Effect> {
        if cycle != self.cycle || self.state != SessionState::Presenting {
            return Vec::new();
        }

        self.state = SessionState::Cooling;
        self.countdown_remaining = COUNTDOWN_SECS;

        let mut effects = vec![Effect::StartCountdown {
            cycle,
            seconds: COUNTDOWN_SECS,
        }];
        if self.retry_pending {
            effects.push(Effect::ScheduleRetry {
                cycle,
                delay: RETRY_DELAY,
            });
        }
        effects
    }

    fn on_countdown_tick(&mut self, cycle: u64) -> Vec<Effect> {
        if cycle != self.cycle || self.state != SessionState::Cooling {
            return Vec::new();
        }

        self.countdown_remaining = self.countdown_remaining.saturating_sub(1);
        let mut effects = vec![Effect::UpdateCountdown {
            remaining: self.countdown_remaining,
        }];

        if self.countdown_remaining == 0 {
            effects.extend(self.resume());
        }
        effects
    }

    /// Return to Capturing. Calling it again while already capturing is a no-op.
    fn resume(&mut self) -> Vec<Effect> {
        match self.state {
            SessionState::Presenting | SessionState::Cooling => {
                self.enter_capturing();
                tracing::info!(cycle = self.cycle, "Scanner resumed");
                vec![
                    Effect::CancelTimers,
                    Effect::ClearPresentation,
                    Effect::ResumeCapture,
                ]
            }
            state => {
                tracing::debug!(state = state.as_str(), "Resume ignored");
                Vec::new()
            }
        }
    }

    fn close(&mut self) -> Vec<Effect> {
        let previous = self.state;
        self.state = SessionState::Closed;
        tracing::info!(previous = previous.as_str(), "Scan session closed");

        match previous {
            SessionState::Closed => Vec::new(),
            SessionState::Idle => vec![Effect::Terminate],
            _ => vec![Effect::StopCapture, Effect::CancelTimers, Effect::Terminate],
        }
    }
}

impl Default for ScanSession {
    fn default() -> Self {
        Self::new()
    }
}
