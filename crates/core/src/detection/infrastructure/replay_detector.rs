use std::fs;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::detection::domain::landmark_detector::{Detection, LandmarkDetector};
use crate::shared::error::BoxError;
use crate::shared::frame::Frame;
use crate::shared::landmark::Landmark;

#[derive(Error, Debug)]
pub enum FixtureError {
    #[error("failed to read fixture {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid fixture: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("fixture contains no frames")]
    Empty,
}

/// One scripted detector response.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ReplayFrame {
    #[serde(default)]
    pub faces: Vec<Vec<Landmark>>,
    /// When set, `detect` fails with this message instead of returning faces.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Simulated inference latency.
    #[serde(default)]
    pub delay_ms: u64,
}

impl ReplayFrame {
    pub fn faces(faces: Vec<Vec<Landmark>>) -> Self {
        Self {
            faces,
            ..Self::default()
        }
    }

    pub fn failure(message: &str) -> Self {
        Self {
            error: Some(message.to_string()),
            ..Self::default()
        }
    }
}

#[derive(Deserialize)]
struct Fixture {
    frames: Vec<ReplayFrame>,
}

/// Replays scripted detections in order, wrapping around at the end.
///
/// Stands in for a real inference engine in the CLI and in tests: the
/// pipeline sees the same faces it would get from a model, without the
/// model.
pub struct ReplayLandmarkDetector {
    frames: Vec<ReplayFrame>,
    cursor: usize,
}

impl ReplayLandmarkDetector {
    pub fn new(frames: Vec<ReplayFrame>) -> Result<Self, FixtureError> {
        if frames.is_empty() {
            return Err(FixtureError::Empty);
        }
        Ok(Self { frames, cursor: 0 })
    }

    /// Parses `{"frames": [{"faces": [[{"x": .., "y": ..}, ..]]}, ..]}`.
    pub fn from_json_str(json: &str) -> Result<Self, FixtureError> {
        let fixture: Fixture = serde_json::from_str(json)?;
        Self::new(fixture.frames)
    }

    pub fn load(path: &Path) -> Result<Self, FixtureError> {
        let json = fs::read_to_string(path).map_err(|source| FixtureError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&json)
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

impl LandmarkDetector for ReplayLandmarkDetector {
    fn detect(&mut self, _frame: &Frame) -> Result<Detection, BoxError> {
        let scripted = &self.frames[self.cursor % self.frames.len()];
        self.cursor += 1;

        if scripted.delay_ms > 0 {
            thread::sleep(Duration::from_millis(scripted.delay_ms));
        }
        if let Some(message) = &scripted.error {
            return Err(message.clone().into());
        }
        Ok(Detection::new(scripted.faces.clone()))
    }
}
