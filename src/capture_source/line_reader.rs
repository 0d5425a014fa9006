//! Line-oriented capture source
//!
//! Hardware QR readers in keyboard-wedge or serial mode decode on the device
//! and emit one payload per line. Blank lines are reported as no-detection
//! frames.

use super::{CaptureConfig, CaptureEvent, CaptureSource};
use crate::error::{Error, Result};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;

type BoxedReader = Box<dyn AsyncRead + Send + Unpin>;

/// Device path meaning "read from standard input"
pub const STDIN_DEVICE: &str = "-";

/// Capture source reading newline-terminated payloads from a device
pub struct LineCaptureSource {
    device: String,
    injected: Mutex<Option<BoxedReader>>,
    paused: Arc<AtomicBool>,
    reader_task: Mutex<Option<JoinHandle<()>>>,
}

impl LineCaptureSource {
    /// Create a source for a device path (`-` for stdin)
    pub fn new(device: impl Into<String>) -> Self {
        Self {
            device: device.into(),
            injected: Mutex::new(None),
            paused: Arc::new(AtomicBool::new(false)),
            reader_task: Mutex::new(None),
        }
    }

    /// Create a source over an already-open reader
    pub fn from_reader<R>(reader: R) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
    {
        Self {
            device: "<reader>".to_string(),
            injected: Mutex::new(Some(Box::new(reader))),
            paused: Arc::new(AtomicBool::new(false)),
            reader_task: Mutex::new(None),
        }
    }

    pub fn device(&self) -> &str {
        &self.device
    }

    async fn open(&self) -> Result<BoxedReader> {
        if let Some(reader) = self.injected.lock().await.take() {
            return Ok(reader);
        }

        if self.device == STDIN_DEVICE {
            return Ok(Box::new(tokio::io::stdin()));
        }

        let file = tokio::fs::File::open(&self.device)
            .await
            .map_err(|e| Error::CameraUnavailable(format!("{}: {}", self.device, e)))?;
        Ok(Box::new(file))
    }
}

#[async_trait]
impl CaptureSource for LineCaptureSource {
    async fn start(&self, config: CaptureConfig, events: mpsc::Sender<CaptureEvent>) -> Result<()> {
        let mut task = self.reader_task.lock().await;
        if task.is_some() {
            return Err(Error::Internal(format!(
                "capture device {} already started",
                self.device
            )));
        }

        let reader = self.open().await?;
        self.paused.store(false, Ordering::SeqCst);

        tracing::info!(
            device = %self.device,
            facing = ?config.facing,
            fps = config.fps,
            region_width = config.detection_region.width,
            region_height = config.detection_region.height,
            aspect_ratio = config.aspect_ratio,
            "Capture source started"
        );

        let paused = self.paused.clone();
        let device = self.device.clone();

        *task = Some(tokio::spawn(async move {
            let mut lines = BufReader::new(reader).lines();

            let lost = loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        // Device keeps reading while paused; input is discarded
                        if paused.load(Ordering::SeqCst) {
                            tracing::trace!(device = %device, "Input dropped while paused");
                            continue;
                        }

                        let payload = line.trim();
                        let event = if payload.is_empty() {
                            CaptureEvent::NoDetection
                        } else {
                            CaptureEvent::Decoded(payload.to_string())
                        };

                        if events.send(event).await.is_err() {
                            tracing::debug!(device = %device, "Event receiver dropped");
                            break None;
                        }
                    }
                    Ok(None) => break Some(format!("{}: end of input", device)),
                    Err(e) => break Some(format!("{}: {}", device, e)),
                }
            };

            if let Some(reason) = lost {
                tracing::warn!(device = %device, reason = %reason, "Capture device lost");
                if events.send(CaptureEvent::Lost(reason)).await.is_err() {
                    tracing::debug!(device = %device, "Event receiver dropped");
                }
            }
        }));

        Ok(())
    }

    async fn pause(&self) {
        self.paused.store(true, Ordering::SeqCst);
        tracing::debug!(device = %self.device, "Capture paused");
    }

    async fn resume(&self) {
        self.paused.store(false, Ordering::SeqCst);
        tracing::debug!(device = %self.device, "Capture resumed");
    }

    async fn stop(&self) {
        if let Some(handle) = self.reader_task.lock().await.take() {
            handle.abort();
            tracing::info!(device = %self.device, "Capture source stopped");
        }
    }
}
