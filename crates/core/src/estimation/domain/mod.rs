pub mod gaze_estimator;
pub mod rotation_estimator;
