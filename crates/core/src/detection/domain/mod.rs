pub mod detector_handle;
pub mod landmark_detector;
