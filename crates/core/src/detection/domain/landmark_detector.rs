use crate::shared::error::BoxError;
use crate::shared::frame::Frame;
use crate::shared::landmark::Landmark;

/// Faces found in one frame, each as an ordered landmark sequence.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Detection {
    pub faces: Vec<Vec<Landmark>>,
}

impl Detection {
    pub fn new(faces: Vec<Vec<Landmark>>) -> Self {
        Self { faces }
    }

    pub fn count(&self) -> usize {
        self.faces.len()
    }

    /// Landmarks of the first detected face, which the estimators analyse.
    pub fn primary(&self) -> Option<&[Landmark]> {
        self.faces.first().map(Vec::as_slice)
    }
}

/// Domain interface for the face landmark inference engine.
///
/// Implementations may keep inference state between frames, hence
/// `&mut self`.
pub trait LandmarkDetector: Send {
    fn detect(&mut self, frame: &Frame) -> Result<Detection, BoxError>;

    /// Releases engine resources. Called once when the owning handle is
    /// released; the default does nothing.
    fn close(&mut self) {}
}
