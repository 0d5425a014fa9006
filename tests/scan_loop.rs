//! Scan loop integration tests.
//!
//! Drives a real `ScanController` with scripted capture, verifier and
//! presenter doubles. Timer tests run on tokio's paused clock so the 5s
//! countdown and 3s retry complete instantly and deterministically.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use tokio::io::AsyncWriteExt;
use tokio::sync::{mpsc, Notify};
use tokio::time::Instant;

use checkin_kiosk::capture_source::{CaptureConfig, CaptureEvent, CaptureSource, LineCaptureSource};
use checkin_kiosk::error::{Error, Result};
use checkin_kiosk::realtime_hub::RealtimeHub;
use checkin_kiosk::result_presenter::{
    HubPresenter, PresentationKind, PresentationView, ResultPresenter,
};
use checkin_kiosk::scan_controller::{ScanController, ScannerHandle};
use checkin_kiosk::scan_history::ScanHistory;
use checkin_kiosk::scan_session::{ScanSession, SessionState};
use checkin_kiosk::verification_client::{
    HttpVerifier, SubjectInfo, VerificationOutcome, Verifier,
};

// ---------------------------------------------------------------------------
// Doubles
// ---------------------------------------------------------------------------

/// Capture source that keeps emitting even while paused
#[derive(Default)]
struct ScriptedCapture {
    fail_start: bool,
    events: Mutex<Option<mpsc::Sender<CaptureEvent>>>,
    calls: Mutex<Vec<&'static str>>,
}

impl ScriptedCapture {
    fn failing() -> Self {
        Self {
            fail_start: true,
            ..Default::default()
        }
    }

    async fn emit(&self, event: CaptureEvent) {
        let tx = self.events.lock().unwrap().clone().expect("capture not started");
        tx.send(event).await.unwrap();
    }

    /// Drop the event sender the way a source that exits without a reason would
    fn disconnect(&self) {
        self.events.lock().unwrap().take();
    }

    fn count(&self, call: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| **c == call).count()
    }
}

#[async_trait]
impl CaptureSource for ScriptedCapture {
    async fn start(&self, _config: CaptureConfig, events: mpsc::Sender<CaptureEvent>) -> Result<()> {
        self.calls.lock().unwrap().push("start");
        if self.fail_start {
            return Err(Error::CameraUnavailable("NotAllowedError".to_string()));
        }
        *self.events.lock().unwrap() = Some(events);
        Ok(())
    }

    async fn pause(&self) {
        self.calls.lock().unwrap().push("pause");
    }

    async fn resume(&self) {
        self.calls.lock().unwrap().push("resume");
    }

    async fn stop(&self) {
        self.calls.lock().unwrap().push("stop");
    }
}

/// Verifier answering from a queue, optionally held until released
#[derive(Default)]
struct ScriptedVerifier {
    outcomes: Mutex<VecDeque<VerificationOutcome>>,
    gate: Option<Arc<Notify>>,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl ScriptedVerifier {
    fn answering(outcomes: Vec<VerificationOutcome>) -> Self {
        Self {
            outcomes: Mutex::new(outcomes.into()),
            ..Default::default()
        }
    }

    fn gated(outcomes: Vec<VerificationOutcome>, gate: Arc<Notify>) -> Self {
        Self {
            gate: Some(gate),
            ..Self::answering(outcomes)
        }
    }
}

#[async_trait]
impl Verifier for ScriptedVerifier {
    async fn verify(&self, _payload: &str) -> VerificationOutcome {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);

        if let Some(gate) = &self.gate {
            gate.notified().await;
        }

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.outcomes
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(VerificationOutcome::TransportFailure {
                reason: "no scripted outcome".to_string(),
            })
    }
}

#[derive(Default)]
struct RecordingPresenter {
    calls: Mutex<Vec<String>>,
}

impl RecordingPresenter {
    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn count_prefix(&self, prefix: &str) -> usize {
        self.calls().iter().filter(|c| c.starts_with(prefix)).count()
    }
}

#[async_trait]
impl ResultPresenter for RecordingPresenter {
    async fn show(&self, view: &PresentationView, countdown_secs: u32) {
        self.calls
            .lock()
            .unwrap()
            .push(format!("show:{:?}:{}", view.kind, countdown_secs));
    }

    async fn countdown(&self, remaining: u32) {
        self.calls.lock().unwrap().push(format!("countdown:{}", remaining));
    }

    async fn clear(&self) {
        self.calls.lock().unwrap().push("clear".to_string());
    }

    async fn fatal(&self, message: &str) {
        self.calls.lock().unwrap().push(format!("fatal:{}", message));
    }

    async fn closed(&self) {
        self.calls.lock().unwrap().push("closed".to_string());
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn granted() -> VerificationOutcome {
    VerificationOutcome::Granted {
        subject: SubjectInfo {
            name: Some("Ana Rojas".to_string()),
            rut: Some("12.345.678-9".to_string()),
            ..Default::default()
        },
    }
}

fn spawn(
    capture: &Arc<ScriptedCapture>,
    verifier: &Arc<ScriptedVerifier>,
    presenter: &Arc<RecordingPresenter>,
) -> ScannerHandle {
    ScanController::spawn(
        capture.clone(),
        verifier.clone(),
        presenter.clone(),
        ScanSession::new(),
    )
}

async fn wait_for_state(handle: &ScannerHandle, state: SessionState, cycle: u64) {
    handle
        .wait_until(|s| s.state == state && s.cycle == cycle)
        .await
        .expect("controller stopped before reaching state");
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn granted_scan_counts_down_then_resumes() {
    let capture = Arc::new(ScriptedCapture::default());
    let verifier = Arc::new(ScriptedVerifier::answering(vec![granted()]));
    let presenter = Arc::new(RecordingPresenter::default());
    let handle = spawn(&capture, &verifier, &presenter);

    wait_for_state(&handle, SessionState::Capturing, 1).await;
    for _ in 0..3 {
        capture.emit(CaptureEvent::NoDetection).await;
    }
    capture.emit(CaptureEvent::Decoded("member-1".to_string())).await;

    wait_for_state(&handle, SessionState::Cooling, 1).await;
    let cooling_at = Instant::now();

    wait_for_state(&handle, SessionState::Capturing, 2).await;
    let elapsed = cooling_at.elapsed();
    assert!(elapsed >= Duration::from_secs(5), "resumed after {:?}", elapsed);
    assert!(elapsed < Duration::from_secs(6), "resumed after {:?}", elapsed);

    let status = handle.status();
    assert_eq!(status.attempt_count, 0);
    assert_eq!(status.in_flight, 0);
    assert_eq!(status.last_decoded_payload.as_deref(), Some("member-1"));

    assert_eq!(
        presenter.calls(),
        vec![
            "show:Granted:5",
            "countdown:4",
            "countdown:3",
            "countdown:2",
            "countdown:1",
            "countdown:0",
            "clear",
        ]
    );
    assert_eq!(capture.count("pause"), 1);
    assert_eq!(capture.count("resume"), 1);
    assert_eq!(verifier.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn decodes_outside_capturing_are_ignored() {
    let gate = Arc::new(Notify::new());
    let capture = Arc::new(ScriptedCapture::default());
    let verifier = Arc::new(ScriptedVerifier::gated(vec![granted()], gate.clone()));
    let presenter = Arc::new(RecordingPresenter::default());
    let handle = spawn(&capture, &verifier, &presenter);

    wait_for_state(&handle, SessionState::Capturing, 1).await;
    capture.emit(CaptureEvent::Decoded("first".to_string())).await;
    wait_for_state(&handle, SessionState::Verifying, 1).await;

    // Same QR held in front of the camera
    for _ in 0..10 {
        capture.emit(CaptureEvent::Decoded("first".to_string())).await;
    }
    capture.emit(CaptureEvent::Decoded("second".to_string())).await;
    tokio::time::sleep(Duration::from_millis(500)).await;

    assert_eq!(verifier.calls.load(Ordering::SeqCst), 1);
    assert_eq!(handle.status().in_flight, 1);

    gate.notify_one();
    wait_for_state(&handle, SessionState::Cooling, 1).await;
    capture.emit(CaptureEvent::Decoded("during-cooldown".to_string())).await;

    wait_for_state(&handle, SessionState::Capturing, 2).await;
    assert_eq!(verifier.calls.load(Ordering::SeqCst), 1);
    assert_eq!(verifier.max_in_flight.load(Ordering::SeqCst), 1);
    assert_eq!(handle.status().last_decoded_payload.as_deref(), Some("first"));
    assert_eq!(presenter.count_prefix("show:"), 1);
}

#[tokio::test(start_paused = true)]
async fn transport_failure_resumes_within_retry_delay() {
    let capture = Arc::new(ScriptedCapture::default());
    let verifier = Arc::new(ScriptedVerifier::answering(vec![
        VerificationOutcome::TransportFailure {
            reason: "HTTP 502".to_string(),
        },
    ]));
    let presenter = Arc::new(RecordingPresenter::default());
    let handle = spawn(&capture, &verifier, &presenter);

    wait_for_state(&handle, SessionState::Capturing, 1).await;
    capture.emit(CaptureEvent::Decoded("member-2".to_string())).await;

    wait_for_state(&handle, SessionState::Cooling, 1).await;
    let cooling_at = Instant::now();
    wait_for_state(&handle, SessionState::Capturing, 2).await;
    assert!(cooling_at.elapsed() <= Duration::from_secs(3));

    // The countdown would have finished by now; it must not resume again
    tokio::time::sleep(Duration::from_secs(5)).await;
    let status = handle.status();
    assert_eq!(status.state, SessionState::Capturing);
    assert_eq!(status.cycle, 2);

    assert_eq!(capture.count("resume"), 1);
    assert_eq!(presenter.count_prefix("show:ConnectionError"), 1);
    assert_eq!(presenter.count_prefix("clear"), 1);
}

#[tokio::test(start_paused = true)]
async fn explicit_resume_during_cooldown_is_idempotent() {
    let capture = Arc::new(ScriptedCapture::default());
    let verifier = Arc::new(ScriptedVerifier::answering(vec![granted()]));
    let presenter = Arc::new(RecordingPresenter::default());
    let handle = spawn(&capture, &verifier, &presenter);

    wait_for_state(&handle, SessionState::Capturing, 1).await;
    capture.emit(CaptureEvent::Decoded("member-3".to_string())).await;
    wait_for_state(&handle, SessionState::Cooling, 1).await;

    handle.resume().await.unwrap();
    handle.resume().await.unwrap();
    wait_for_state(&handle, SessionState::Capturing, 2).await;
    tokio::time::sleep(Duration::from_secs(6)).await;

    assert_eq!(handle.status().cycle, 2);
    assert_eq!(capture.count("resume"), 1);
    assert_eq!(presenter.count_prefix("clear"), 1);
}

#[tokio::test(start_paused = true)]
async fn camera_failure_is_fatal_and_not_retried() {
    let capture = Arc::new(ScriptedCapture::failing());
    let verifier = Arc::new(ScriptedVerifier::default());
    let presenter = Arc::new(RecordingPresenter::default());
    let handle = spawn(&capture, &verifier, &presenter);

    let status = handle
        .wait_until(|s| s.fault.is_some())
        .await
        .expect("controller stopped");
    assert_eq!(status.state, SessionState::Idle);

    tokio::time::sleep(Duration::from_secs(30)).await;

    assert_eq!(handle.status().state, SessionState::Idle);
    assert_eq!(capture.count("start"), 1);
    assert_eq!(presenter.count_prefix("fatal:"), 1);
    assert_eq!(verifier.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn unplugged_reader_is_fatal_and_not_retried() {
    let (device, reader) = tokio::io::duplex(64);
    let capture = Arc::new(LineCaptureSource::from_reader(reader));
    let verifier = Arc::new(ScriptedVerifier::default());
    let presenter = Arc::new(RecordingPresenter::default());
    let handle = ScanController::spawn(
        capture,
        verifier.clone(),
        presenter.clone(),
        ScanSession::new(),
    );
    wait_for_state(&handle, SessionState::Capturing, 1).await;

    drop(device);
    let status = handle
        .wait_until(|s| s.fault.is_some())
        .await
        .expect("controller stopped");
    assert_eq!(status.state, SessionState::Idle);
    assert!(status.fault.unwrap().contains("end of input"));

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(handle.status().state, SessionState::Idle);
    assert_eq!(presenter.count_prefix("fatal:"), 1);
    assert_eq!(verifier.calls.load(Ordering::SeqCst), 0);

    handle.close().await;
    handle.closed().await;
    assert_eq!(presenter.count_prefix("closed"), 1);
}

#[tokio::test(start_paused = true)]
async fn capture_loss_during_cooldown_cancels_retry() {
    let capture = Arc::new(ScriptedCapture::default());
    let verifier = Arc::new(ScriptedVerifier::answering(vec![
        VerificationOutcome::TransportFailure {
            reason: "connection refused".to_string(),
        },
    ]));
    let presenter = Arc::new(RecordingPresenter::default());
    let handle = spawn(&capture, &verifier, &presenter);

    wait_for_state(&handle, SessionState::Capturing, 1).await;
    capture.emit(CaptureEvent::Decoded("member-6".to_string())).await;
    wait_for_state(&handle, SessionState::Cooling, 1).await;

    // Sender dropped with no Lost event still counts as a loss
    capture.disconnect();
    let status = handle
        .wait_until(|s| s.fault.is_some())
        .await
        .expect("controller stopped");
    assert_eq!(status.state, SessionState::Idle);

    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(handle.status().state, SessionState::Idle);
    assert_eq!(handle.status().cycle, 1);
    assert_eq!(capture.count("start"), 1);
    assert_eq!(capture.count("resume"), 0);
    assert_eq!(capture.count("stop"), 1);
    assert_eq!(presenter.count_prefix("fatal:"), 1);
}

#[tokio::test(start_paused = true)]
async fn close_while_verifying_discards_late_response() {
    let gate = Arc::new(Notify::new());
    let capture = Arc::new(ScriptedCapture::default());
    let verifier = Arc::new(ScriptedVerifier::gated(vec![granted()], gate.clone()));
    let presenter = Arc::new(RecordingPresenter::default());
    let handle = spawn(&capture, &verifier, &presenter);

    wait_for_state(&handle, SessionState::Capturing, 1).await;
    capture.emit(CaptureEvent::Decoded("member-4".to_string())).await;
    wait_for_state(&handle, SessionState::Verifying, 1).await;

    handle.close().await;
    handle.closed().await;

    // Response arrives after close
    gate.notify_one();
    tokio::time::sleep(Duration::from_secs(10)).await;
    handle.close().await;

    assert_eq!(handle.status().state, SessionState::Closed);
    assert_eq!(presenter.count_prefix("show:"), 0);
    assert_eq!(presenter.count_prefix("closed"), 1);
    assert_eq!(capture.count("stop"), 1);
    assert!(handle.resume().await.is_err());
}

#[tokio::test]
async fn already_checked_in_over_http_presents_warning() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/api/process-qr-scan/")
        .with_status(403)
        .with_header("content-type", "application/json")
        .with_body(
            json!({
                "success": false,
                "already_accessed_today": true,
                "error": "Ya registraste tu entrada hoy",
                "user": {
                    "name": "Ana Rojas",
                    "rut": "12.345.678-9",
                    "first_access_today": "07:02:11"
                }
            })
            .to_string(),
        )
        .create_async()
        .await;

    let (mut reader_input, reader) = tokio::io::duplex(256);
    let capture = Arc::new(LineCaptureSource::from_reader(reader));
    let verifier = Arc::new(
        HttpVerifier::new(format!("{}/api/process-qr-scan/", server.url()))
            .unwrap()
            .with_csrf_token("token"),
    );
    let hub = Arc::new(RealtimeHub::new());
    let history = Arc::new(ScanHistory::default());
    let presenter = Arc::new(HubPresenter::new(hub.clone(), history.clone()));

    let handle = ScanController::spawn(capture, verifier, presenter, ScanSession::new());
    wait_for_state(&handle, SessionState::Capturing, 1).await;

    reader_input.write_all(b"\n\nmember-5\n").await.unwrap();
    wait_for_state(&handle, SessionState::Cooling, 1).await;

    let latest = history.latest(1).await;
    assert_eq!(latest.len(), 1);
    assert_eq!(latest[0].kind, PresentationKind::Warning);
    assert_eq!(latest[0].time, "07:02:11");
    mock.assert_async().await;

    handle.close().await;
    handle.closed().await;
}
