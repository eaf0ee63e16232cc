/// Error type crossing adapter seams (video sources, detectors), which may
/// be produced on one thread and reported from another.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;
