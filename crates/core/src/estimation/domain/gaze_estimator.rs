//! Eye-gaze classification from iris position inside each eye opening.
//!
//! Each eye contributes an iris offset in `[-1, 1]` along both axes,
//! normalized against its corner landmarks (horizontal) and eyelid
//! midpoints (vertical). The two eyes are averaged and thresholded into a
//! coarse direction.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::shared::constants::{
    DEFAULT_HORIZONTAL_GAZE_THRESHOLD, DEFAULT_MIN_EYE_OPENING_RATIO,
    DEFAULT_VERTICAL_GAZE_THRESHOLD, FACE_MESH_LANDMARK_COUNT, LEFT_EYELID_BOTTOM,
    LEFT_EYELID_TOP, LEFT_EYE_INNER, LEFT_EYE_OUTER, LEFT_IRIS_CENTER, RIGHT_EYELID_BOTTOM,
    RIGHT_EYELID_TOP, RIGHT_EYE_INNER, RIGHT_EYE_OUTER, RIGHT_IRIS_CENTER,
};
use crate::shared::landmark::{point, Landmark};

/// Below this span (in normalized units) an eye opening is treated as collapsed.
const MIN_SPAN: f64 = 1e-6;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HorizontalGaze {
    Left,
    Right,
    Center,
    Unknown,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VerticalGaze {
    Up,
    Down,
    Center,
    Unknown,
}

/// Combined direction: vertical component first, then horizontal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GazeDirection {
    Center,
    Left,
    Right,
    Up,
    Down,
    UpLeft,
    UpRight,
    DownLeft,
    DownRight,
    Unknown,
}

impl GazeDirection {
    pub fn combine(vertical: VerticalGaze, horizontal: HorizontalGaze) -> Self {
        use HorizontalGaze as H;
        use VerticalGaze as V;
        match (vertical, horizontal) {
            (V::Unknown, _) | (_, H::Unknown) => Self::Unknown,
            (V::Center, H::Center) => Self::Center,
            (V::Center, H::Left) => Self::Left,
            (V::Center, H::Right) => Self::Right,
            (V::Up, H::Center) => Self::Up,
            (V::Down, H::Center) => Self::Down,
            (V::Up, H::Left) => Self::UpLeft,
            (V::Up, H::Right) => Self::UpRight,
            (V::Down, H::Left) => Self::DownLeft,
            (V::Down, H::Right) => Self::DownRight,
        }
    }

    /// Wire label, e.g. `UP_LEFT`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Center => "CENTER",
            Self::Left => "LEFT",
            Self::Right => "RIGHT",
            Self::Up => "UP",
            Self::Down => "DOWN",
            Self::UpLeft => "UP_LEFT",
            Self::UpRight => "UP_RIGHT",
            Self::DownLeft => "DOWN_LEFT",
            Self::DownRight => "DOWN_RIGHT",
            Self::Unknown => "UNKNOWN",
        }
    }

    /// Human-readable label, e.g. `up-left`.
    pub fn label(&self) -> String {
        self.as_str().to_lowercase().replace('_', "-")
    }
}

impl fmt::Display for GazeDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GazeConfig {
    pub horizontal_threshold: f64,
    pub vertical_threshold: f64,
    /// Minimum eye height / width ratio for the vertical offset to count.
    pub min_eye_opening_ratio: f64,
}

impl Default for GazeConfig {
    fn default() -> Self {
        Self {
            horizontal_threshold: DEFAULT_HORIZONTAL_GAZE_THRESHOLD,
            vertical_threshold: DEFAULT_VERTICAL_GAZE_THRESHOLD,
            min_eye_opening_ratio: DEFAULT_MIN_EYE_OPENING_RATIO,
        }
    }
}

/// Per-eye offsets behind a [`GazeResult`]. Vertical offsets are `None`
/// when the eye was too closed to measure.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct GazeDetails {
    pub left_horizontal: f64,
    pub right_horizontal: f64,
    pub left_vertical: Option<f64>,
    pub right_vertical: Option<f64>,
    pub avg_horizontal: f64,
    pub avg_vertical: f64,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GazeResult {
    pub horizontal: HorizontalGaze,
    pub vertical: VerticalGaze,
    pub direction: GazeDirection,
    pub is_looking_away: bool,
    /// Agreement between the two eyes, not a calibrated probability.
    pub confidence: f64,
    pub details: GazeDetails,
}

impl GazeResult {
    pub fn unknown() -> Self {
        Self {
            horizontal: HorizontalGaze::Unknown,
            vertical: VerticalGaze::Unknown,
            direction: GazeDirection::Unknown,
            is_looking_away: false,
            confidence: 0.0,
            details: GazeDetails::default(),
        }
    }
}

struct EyeIndices {
    corners: (usize, usize),
    lids: (usize, usize),
    iris: usize,
}

const RIGHT_EYE: EyeIndices = EyeIndices {
    corners: (RIGHT_EYE_OUTER, RIGHT_EYE_INNER),
    lids: (RIGHT_EYELID_TOP, RIGHT_EYELID_BOTTOM),
    iris: RIGHT_IRIS_CENTER,
};

const LEFT_EYE: EyeIndices = EyeIndices {
    corners: (LEFT_EYE_INNER, LEFT_EYE_OUTER),
    lids: (LEFT_EYELID_TOP, LEFT_EYELID_BOTTOM),
    iris: LEFT_IRIS_CENTER,
};

struct EyeOffset {
    horizontal: f64,
    vertical: Option<f64>,
}

/// Classifies where the eyes point. Never fails: incomplete meshes yield
/// [`GazeResult::unknown`].
pub fn estimate_gaze(landmarks: &[Landmark], config: &GazeConfig) -> GazeResult {
    if landmarks.len() < FACE_MESH_LANDMARK_COUNT {
        return GazeResult::unknown();
    }

    let left = eye_offset(landmarks, &LEFT_EYE, config.min_eye_opening_ratio);
    let right = eye_offset(landmarks, &RIGHT_EYE, config.min_eye_opening_ratio);

    let avg_horizontal = (left.horizontal + right.horizontal) / 2.0;
    let (avg_vertical, vertical_spread) = match (left.vertical, right.vertical) {
        (Some(l), Some(r)) => ((l + r) / 2.0, (l - r).abs()),
        _ => (0.0, 0.0),
    };

    let horizontal = if avg_horizontal.abs() > config.horizontal_threshold {
        if avg_horizontal < 0.0 {
            HorizontalGaze::Left
        } else {
            HorizontalGaze::Right
        }
    } else {
        HorizontalGaze::Center
    };

    // Image y grows downward, so a negative offset means looking up.
    let vertical = if avg_vertical.abs() > config.vertical_threshold {
        if avg_vertical < 0.0 {
            VerticalGaze::Up
        } else {
            VerticalGaze::Down
        }
    } else {
        VerticalGaze::Center
    };

    let horizontal_spread = (left.horizontal - right.horizontal).abs();
    let confidence = (1.0 - (horizontal_spread + vertical_spread)).max(0.0);

    GazeResult {
        horizontal,
        vertical,
        direction: GazeDirection::combine(vertical, horizontal),
        is_looking_away: horizontal != HorizontalGaze::Center
            || vertical != VerticalGaze::Center,
        confidence,
        details: GazeDetails {
            left_horizontal: left.horizontal,
            right_horizontal: right.horizontal,
            left_vertical: left.vertical,
            right_vertical: right.vertical,
            avg_horizontal,
            avg_vertical,
        },
    }
}

fn eye_offset(landmarks: &[Landmark], eye: &EyeIndices, min_opening_ratio: f64) -> EyeOffset {
    let (Some(a), Some(b), Some(iris)) = (
        point(landmarks, eye.corners.0),
        point(landmarks, eye.corners.1),
        point(landmarks, eye.iris),
    ) else {
        return EyeOffset {
            horizontal: 0.0,
            vertical: None,
        };
    };

    let eye_width = (a.x - b.x).abs();
    let horizontal = normalized_offset(iris.x, a.x, b.x);

    let vertical = match (point(landmarks, eye.lids.0), point(landmarks, eye.lids.1)) {
        (Some(top), Some(bottom)) if eye_width > MIN_SPAN => {
            let eye_height = (top.y - bottom.y).abs();
            (eye_height / eye_width >= min_opening_ratio)
                .then(|| normalized_offset(iris.y, top.y, bottom.y))
        }
        _ => None,
    };

    EyeOffset {
        horizontal,
        vertical,
    }
}

/// Position of `value` between two bounds, mapped to `[-1, 1]`.
fn normalized_offset(value: f64, bound_a: f64, bound_b: f64) -> f64 {
    let min = bound_a.min(bound_b);
    let max = bound_a.max(bound_b);
    let range = max - min;
    if range < MIN_SPAN {
        return 0.0;
    }
    let center = (min + max) / 2.0;
    (((value - center) / range) * 2.0).clamp(-1.0, 1.0)
}
