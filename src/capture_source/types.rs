//! CaptureSource types

use serde::{Deserialize, Serialize};

/// Target frame rate requested from the capture device
pub const TARGET_FPS: u32 = 30;

/// Side length of the square central detection region (logical units)
pub const DETECTION_REGION_SIZE: u32 = 250;

/// Which camera to open
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FacingMode {
    /// Rear / world-facing camera
    Environment,
    /// Front / operator-facing camera
    User,
}

impl Default for FacingMode {
    fn default() -> Self {
        Self::Environment
    }
}

impl std::str::FromStr for FacingMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "environment" | "rear" | "back" => Ok(Self::Environment),
            "user" | "front" => Ok(Self::User),
            other => Err(format!("unknown facing mode: {}", other)),
        }
    }
}

/// Central detection region
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct DetectionRegion {
    pub width: u32,
    pub height: u32,
}

impl Default for DetectionRegion {
    fn default() -> Self {
        Self {
            width: DETECTION_REGION_SIZE,
            height: DETECTION_REGION_SIZE,
        }
    }
}

/// Parameters passed to `CaptureSource::start`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CaptureConfig {
    pub facing: FacingMode,
    pub fps: u32,
    pub detection_region: DetectionRegion,
    pub aspect_ratio: f32,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            facing: FacingMode::Environment,
            fps: TARGET_FPS,
            detection_region: DetectionRegion::default(),
            aspect_ratio: 1.0,
        }
    }
}

/// Event produced by a running capture source
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureEvent {
    /// A payload was decoded from a frame
    Decoded(String),
    /// Frame processed, nothing decoded (normal polling outcome)
    NoDetection,
    /// Device went away after a successful start; no further events follow
    Lost(String),
}
