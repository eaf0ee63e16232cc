use serde::{Deserialize, Serialize};

/// A normalized facial keypoint. `z` is present only for 3D meshes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Landmark {
    pub x: f64,
    pub y: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub z: Option<f64>,
}

impl Landmark {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y, z: None }
    }

    /// A point with a NaN or infinite coordinate is treated as not detected.
    pub fn is_valid(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }

    /// Planar distance; `z` is ignored.
    pub fn distance(&self, other: &Landmark) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

/// Looks up a landmark by canonical index, returning `None` when the index
/// is out of range or the point is not valid.
pub fn point(landmarks: &[Landmark], index: usize) -> Option<&Landmark> {
    landmarks.get(index).filter(|p| p.is_valid())
}
