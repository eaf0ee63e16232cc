use crate::shared::error::BoxError;
use crate::shared::frame::Frame;

/// How much media the source has buffered, ordered from nothing to enough
/// for uninterrupted playback.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum ReadyState {
    HaveNothing,
    HaveMetadata,
    HaveCurrentData,
    HaveFutureData,
    HaveEnoughData,
}

impl ReadyState {
    /// Whether a frame for the current instant can be captured.
    pub fn can_capture(self) -> bool {
        self >= ReadyState::HaveCurrentData
    }
}

/// A live video feed the scheduler samples from.
///
/// Device acquisition, permissions and teardown are the implementor's
/// business; the scheduler only asks for the current picture.
pub trait VideoSource: Send {
    /// Native `(width, height)` of the feed, if known.
    fn dimensions(&self) -> Option<(u32, u32)>;

    fn ready_state(&self) -> ReadyState;

    /// Writes the current picture into `frame`, which has already been
    /// shaped to the capture size.
    fn capture(&mut self, frame: &mut Frame) -> Result<(), BoxError>;
}
