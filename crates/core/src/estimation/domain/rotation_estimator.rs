//! Coarse head-rotation classification from face mesh landmarks.
//!
//! Yaw compares the nose-to-ear distances on both sides: when the head
//! turns, the ear on the far side appears closer to the nose in the image.
//! Roll uses the vertical offset between the outer eye corners normalized by
//! their separation.

use serde::{Deserialize, Serialize};

use crate::shared::constants::{
    DEFAULT_ROLL_THRESHOLD, DEFAULT_YAW_RATIO_THRESHOLD, FACE_MESH_LANDMARK_COUNT, LEFT_EAR,
    LEFT_EYE_OUTER, NOSE_TIP, RIGHT_EAR, RIGHT_EYE_OUTER,
};
use crate::shared::landmark::{point, Landmark};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Yaw {
    Left,
    Right,
    Center,
    Unknown,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Roll {
    TiltedLeft,
    TiltedRight,
    Level,
    Unknown,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RotationConfig {
    /// Yaw is LEFT below this nose/ear distance ratio and RIGHT above its inverse.
    pub yaw_ratio_threshold: f64,
    /// Normalized eye-corner height difference beyond which the head is tilted.
    pub roll_threshold: f64,
}

impl Default for RotationConfig {
    fn default() -> Self {
        Self {
            yaw_ratio_threshold: DEFAULT_YAW_RATIO_THRESHOLD,
            roll_threshold: DEFAULT_ROLL_THRESHOLD,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RotationResult {
    pub yaw: Yaw,
    pub roll: Roll,
    pub is_rotated: bool,
}

impl RotationResult {
    pub fn unknown() -> Self {
        Self {
            yaw: Yaw::Unknown,
            roll: Roll::Unknown,
            is_rotated: false,
        }
    }
}

/// Classifies yaw and roll. Never fails: incomplete meshes yield
/// [`RotationResult::unknown`].
pub fn estimate_rotation(landmarks: &[Landmark], config: &RotationConfig) -> RotationResult {
    if landmarks.len() < FACE_MESH_LANDMARK_COUNT {
        return RotationResult::unknown();
    }

    let yaw = classify_yaw(landmarks, config.yaw_ratio_threshold);
    let roll = classify_roll(landmarks, config.roll_threshold);

    RotationResult {
        yaw,
        roll,
        is_rotated: yaw != Yaw::Center,
    }
}

fn classify_yaw(landmarks: &[Landmark], threshold: f64) -> Yaw {
    let (Some(nose), Some(right_ear), Some(left_ear)) = (
        point(landmarks, NOSE_TIP),
        point(landmarks, RIGHT_EAR),
        point(landmarks, LEFT_EAR),
    ) else {
        return Yaw::Center;
    };

    let to_right = nose.distance(right_ear);
    let to_left = nose.distance(left_ear);
    if to_right == 0.0 || to_left == 0.0 {
        return Yaw::Center;
    }

    let ratio = to_right / to_left;
    if ratio < threshold {
        Yaw::Left
    } else if ratio > 1.0 / threshold {
        Yaw::Right
    } else {
        Yaw::Center
    }
}

fn classify_roll(landmarks: &[Landmark], threshold: f64) -> Roll {
    let (Some(left_outer), Some(right_outer)) = (
        point(landmarks, LEFT_EYE_OUTER),
        point(landmarks, RIGHT_EYE_OUTER),
    ) else {
        return Roll::Level;
    };

    let eye_distance = left_outer.distance(right_outer);
    if eye_distance == 0.0 {
        return Roll::Level;
    }

    let height_diff = (left_outer.y - right_outer.y) / eye_distance;
    if height_diff > threshold {
        Roll::TiltedRight
    } else if height_diff < -threshold {
        Roll::TiltedLeft
    } else {
        Roll::Level
    }
}
