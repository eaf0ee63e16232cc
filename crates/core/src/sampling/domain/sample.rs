use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::detection::domain::detector_handle::DetectorInitError;
use crate::estimation::domain::gaze_estimator::GazeDirection;

/// Everything one sampling cycle learned about the scene.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub face_count: usize,
    pub is_rotated: bool,
    pub is_looking_away: bool,
    /// `None` when no face was analysed.
    pub gaze_direction: Option<GazeDirection>,
    /// Mean luma in `[0, 255]`.
    pub brightness: f64,
    pub processing_time_ms: f64,
}

/// Why a cycle was aborted. These never count toward the overrun breaker.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CycleError {
    #[error("frame capture failed: {0}")]
    Capture(String),
    #[error(transparent)]
    DetectorInit(#[from] DetectorInitError),
    #[error("landmark detection failed: {0}")]
    Detection(String),
}

/// The single outcome a completed tick reports.
#[derive(Clone, Debug, PartialEq)]
pub enum SamplerEvent {
    Analysis(Sample),
    /// The overrun breaker tripped; sampling stays off until restarted.
    Disabled(String),
    Error(CycleError),
}
