//! CaptureSource - QR Capture Device Abstraction
//!
//! ## Responsibilities
//!
//! - Open the capture device with a target frame rate and detection region
//! - Deliver decode / no-detection events to the scan controller
//! - Pause (device stays open, no events), resume, stop
//!
//! Events are pushed into an mpsc channel; the source never blocks the
//! controller and the controller never blocks the source.

mod line_reader;
mod types;

pub use line_reader::{LineCaptureSource, STDIN_DEVICE};
pub use types::*;

use crate::error::Result;
use async_trait::async_trait;
use tokio::sync::mpsc;

/// Capture device contract used by the scan controller
#[async_trait]
pub trait CaptureSource: Send + Sync {
    /// Acquire the device and begin emitting events.
    ///
    /// An `Err` here means the device could not be acquired; the session
    /// treats it as fatal and does not retry.
    async fn start(&self, config: CaptureConfig, events: mpsc::Sender<CaptureEvent>) -> Result<()>;

    /// Stop yielding decode events while keeping the device open
    async fn pause(&self);

    /// Resume yielding events after `pause`
    async fn resume(&self);

    /// Release the device
    async fn stop(&self);
}
