//! ScanController - Async Scan Session Driver
//!
//! ## Responsibilities
//!
//! - Own the `ScanSession` on a single task
//! - Execute effects against capture, verifier and presenter
//! - Run the countdown and retry timers
//! - Publish session snapshots for the operator API
//!
//! ## Design
//!
//! All inputs (capture events, verification results, timer ticks, operator
//! commands) arrive on one mpsc channel, so the session is never touched
//! concurrently. Follow-up events produced while executing effects are queued
//! locally and processed before the next channel message.

use crate::capture_source::{CaptureConfig, CaptureEvent, CaptureSource};
use crate::error::{Error, Result};
use crate::realtime_hub::{HubMessage, RealtimeHub};
use crate::result_presenter::ResultPresenter;
use crate::scan_session::{
    Effect, ScanSession, SessionEvent, SessionSnapshot, SessionState, COUNTDOWN_SECS,
};
use crate::verification_client::Verifier;
use chrono::Local;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant};

/// Event channel depth
const EVENT_CHANNEL_SIZE: usize = 256;

/// ScanController instance
pub struct ScanController {
    session: ScanSession,
    capture: Arc<dyn CaptureSource>,
    verifier: Arc<dyn Verifier>,
    presenter: Arc<dyn ResultPresenter>,
    events_tx: mpsc::Sender<SessionEvent>,
    events_rx: mpsc::Receiver<SessionEvent>,
    pending: VecDeque<SessionEvent>,
    forwarder: Option<JoinHandle<()>>,
    countdown_task: Option<JoinHandle<()>>,
    retry_task: Option<JoinHandle<()>>,
    status: watch::Sender<SessionSnapshot>,
}

impl ScanController {
    /// Start the session on a background task and return its handle
    pub fn spawn(
        capture: Arc<dyn CaptureSource>,
        verifier: Arc<dyn Verifier>,
        presenter: Arc<dyn ResultPresenter>,
        session: ScanSession,
    ) -> ScannerHandle {
        let (events_tx, events_rx) = mpsc::channel(EVENT_CHANNEL_SIZE);
        let (status, status_rx) = watch::channel(session.snapshot());

        let controller = Self {
            session,
            capture,
            verifier,
            presenter,
            events_tx: events_tx.clone(),
            events_rx,
            pending: VecDeque::new(),
            forwarder: None,
            countdown_task: None,
            retry_task: None,
            status,
        };

        tokio::spawn(controller.run());

        ScannerHandle {
            events: events_tx,
            status: status_rx,
        }
    }

    async fn run(mut self) {
        tracing::info!("Starting scan controller");

        let effects = self.session.start();
        let mut terminated = self.execute(effects).await;
        self.publish();

        while !terminated {
            let event = match self.pending.pop_front() {
                Some(event) => event,
                None => match self.events_rx.recv().await {
                    Some(event) => event,
                    None => break,
                },
            };

            tracing::trace!(event = event.name(), "Session event");
            let effects = self.session.handle(event);
            terminated = self.execute(effects).await;
            self.publish();
        }

        self.cancel_timers();
        if let Some(forwarder) = self.forwarder.take() {
            forwarder.abort();
        }
        tracing::info!("Scan controller stopped");
    }

    fn publish(&self) {
        self.status.send_replace(self.session.snapshot());
    }

    /// Execute effects in order. Returns true once the session terminated.
    async fn execute(&mut self, effects: Vec<Effect>) -> bool {
        let mut terminated = false;

        for effect in effects {
            match effect {
                Effect::StartCapture(config) => self.start_capture(config).await,
                Effect::PauseCapture => self.capture.pause().await,
                Effect::ResumeCapture => self.capture.resume().await,
                Effect::StopCapture => self.capture.stop().await,
                Effect::Verify { cycle, payload } => self.spawn_verification(cycle, payload),
                Effect::Present { cycle, view } => {
                    self.presenter.show(&view, COUNTDOWN_SECS).await;
                    self.pending.push_back(SessionEvent::Presented { cycle });
                }
                Effect::StartCountdown { cycle, seconds } => self.start_countdown(cycle, seconds),
                Effect::ScheduleRetry { cycle, delay } => self.schedule_retry(cycle, delay),
                Effect::UpdateCountdown { remaining } => self.presenter.countdown(remaining).await,
                Effect::CancelTimers => self.cancel_timers(),
                Effect::ClearPresentation => self.presenter.clear().await,
                Effect::ReportFatal(message) => self.presenter.fatal(&message).await,
                Effect::Terminate => {
                    self.cancel_timers();
                    self.pending.clear();
                    self.presenter.closed().await;
                    terminated = true;
                }
            }
        }

        terminated
    }

    async fn start_capture(&mut self, config: CaptureConfig) {
        let (capture_tx, mut capture_rx) = mpsc::channel(EVENT_CHANNEL_SIZE);

        match self.capture.start(config, capture_tx).await {
            Ok(()) => {
                let events = self.events_tx.clone();
                self.forwarder = Some(tokio::spawn(async move {
                    while let Some(event) = capture_rx.recv().await {
                        let (event, lost) = match event {
                            CaptureEvent::Decoded(payload) => (SessionEvent::Decoded(payload), false),
                            CaptureEvent::NoDetection => (SessionEvent::NoDetection, false),
                            CaptureEvent::Lost(reason) => (SessionEvent::CaptureLost(reason), true),
                        };
                        if events.send(event).await.is_err() || lost {
                            return;
                        }
                    }

                    // Source dropped its sender without saying why
                    let lost = SessionEvent::CaptureLost("capture stream ended".to_string());
                    if events.send(lost).await.is_err() {
                        tracing::debug!("Capture stream ended after shutdown");
                    }
                }));
                self.pending.push_back(SessionEvent::CaptureStarted);
            }
            Err(e) => {
                self.pending
                    .push_back(SessionEvent::CaptureFailed(e.to_string()));
            }
        }
    }

    fn spawn_verification(&self, cycle: u64, payload: String) {
        let verifier = self.verifier.clone();
        let events = self.events_tx.clone();

        tokio::spawn(async move {
            let outcome = verifier.verify(&payload).await;
            let finished = SessionEvent::VerificationFinished {
                cycle,
                outcome,
                received_at: Local::now().time(),
            };
            if events.send(finished).await.is_err() {
                tracing::debug!(cycle, "Verification result arrived after shutdown");
            }
        });
    }

    fn start_countdown(&mut self, cycle: u64, seconds: u32) {
        if let Some(task) = self.countdown_task.take() {
            task.abort();
        }

        let events = self.events_tx.clone();
        self.countdown_task = Some(tokio::spawn(async move {
            let period = Duration::from_secs(1);
            let mut ticker = interval_at(Instant::now() + period, period);

            for _ in 0..seconds {
                ticker.tick().await;
                if events.send(SessionEvent::CountdownTick { cycle }).await.is_err() {
                    break;
                }
            }
        }));
    }

    fn schedule_retry(&mut self, cycle: u64, delay: Duration) {
        if let Some(task) = self.retry_task.take() {
            task.abort();
        }

        tracing::info!(cycle, delay_ms = delay.as_millis() as u64, "Retry scheduled");

        let events = self.events_tx.clone();
        self.retry_task = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if events.send(SessionEvent::RetryElapsed { cycle }).await.is_err() {
                tracing::debug!(cycle, "Retry elapsed after shutdown");
            }
        }));
    }

    fn cancel_timers(&mut self) {
        for task in [self.countdown_task.take(), self.retry_task.take()]
            .into_iter()
            .flatten()
        {
            task.abort();
        }
    }
}

/// Cloneable handle to a running scan controller
#[derive(Clone)]
pub struct ScannerHandle {
    events: mpsc::Sender<SessionEvent>,
    status: watch::Receiver<SessionSnapshot>,
}

impl ScannerHandle {
    /// Close the session. Safe to call repeatedly and after termination.
    pub async fn close(&self) {
        if self.events.send(SessionEvent::CloseRequested).await.is_err() {
            tracing::debug!("Close requested on terminated scanner");
        }
    }

    /// Return to capturing now instead of waiting for the countdown
    pub async fn resume(&self) -> Result<()> {
        self.ensure_open()?;
        self.events
            .send(SessionEvent::ResumeRequested)
            .await
            .map_err(|_| Error::SessionClosed)
    }

    pub async fn set_diagnostics(&self, enabled: bool) -> Result<()> {
        self.ensure_open()?;
        self.events
            .send(SessionEvent::SetDiagnostics(enabled))
            .await
            .map_err(|_| Error::SessionClosed)
    }

    fn ensure_open(&self) -> Result<()> {
        if self.status.borrow().state == SessionState::Closed {
            return Err(Error::SessionClosed);
        }
        Ok(())
    }

    /// Latest published snapshot
    pub fn status(&self) -> SessionSnapshot {
        self.status.borrow().clone()
    }

    /// Receiver for every published snapshot
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.status.clone()
    }

    /// Wait until a snapshot matches `predicate`. Returns `None` if the
    /// controller stopped first without ever matching.
    pub async fn wait_until<F>(&self, predicate: F) -> Option<SessionSnapshot>
    where
        F: FnMut(&SessionSnapshot) -> bool,
    {
        let mut rx = self.subscribe();
        let snapshot = rx.wait_for(predicate).await.ok()?;
        Some((*snapshot).clone())
    }

    /// Resolves once the session reached Closed
    pub async fn closed(&self) {
        self.wait_until(|s| s.state == SessionState::Closed).await;
    }

    /// Broadcast state changes to kiosk displays
    pub fn spawn_status_relay(&self, hub: Arc<RealtimeHub>) -> JoinHandle<()> {
        let mut rx = self.subscribe();

        tokio::spawn(async move {
            let mut last_state = None;
            loop {
                let snapshot = rx.borrow_and_update().clone();
                if last_state != Some(snapshot.state) {
                    last_state = Some(snapshot.state);
                    hub.broadcast(HubMessage::ScannerStatus(snapshot)).await;
                }
                if rx.changed().await.is_err() {
                    break;
                }
            }
        })
    }
}
