/// Number of points in the dense face mesh layout consumed by the estimators.
pub const FACE_MESH_LANDMARK_COUNT: usize = 478;

// Canonical face mesh indices. "Left"/"right" are the subject's own sides.
pub const NOSE_TIP: usize = 1;
pub const RIGHT_EAR: usize = 234;
pub const LEFT_EAR: usize = 454;

pub const RIGHT_EYE_OUTER: usize = 33;
pub const RIGHT_EYE_INNER: usize = 133;
pub const LEFT_EYE_INNER: usize = 362;
pub const LEFT_EYE_OUTER: usize = 263;

pub const RIGHT_EYELID_TOP: usize = 159;
pub const RIGHT_EYELID_BOTTOM: usize = 145;
pub const LEFT_EYELID_TOP: usize = 386;
pub const LEFT_EYELID_BOTTOM: usize = 374;

pub const RIGHT_IRIS_CENTER: usize = 468;
pub const LEFT_IRIS_CENTER: usize = 473;

/// Sampling cadence (2 Hz).
pub const DEFAULT_SAMPLE_INTERVAL_MS: u64 = 500;
/// A cycle slower than this counts as an overrun.
pub const DEFAULT_PROCESSING_BUDGET_MS: u64 = 200;
/// Consecutive overruns that trip the breaker.
pub const DEFAULT_OVERRUN_LIMIT: u32 = 3;
/// Capture size used when the source cannot report its own dimensions.
pub const FALLBACK_FRAME_WIDTH: u32 = 320;
pub const FALLBACK_FRAME_HEIGHT: u32 = 240;
/// Brightness is estimated from every Nth pixel.
pub const DEFAULT_BRIGHTNESS_STRIDE: usize = 10;

pub const DEFAULT_YAW_RATIO_THRESHOLD: f64 = 0.6;
pub const DEFAULT_ROLL_THRESHOLD: f64 = 0.15;

pub const DEFAULT_HORIZONTAL_GAZE_THRESHOLD: f64 = 0.15;
pub const DEFAULT_VERTICAL_GAZE_THRESHOLD: f64 = 0.25;
pub const DEFAULT_MIN_EYE_OPENING_RATIO: f64 = 0.02;

/// Empty samples needed before the face is reported missing (~1.5 s at 2 Hz).
pub const DEFAULT_MISSING_FACE_THRESHOLD: u32 = 3;
pub const DEFAULT_LOW_LIGHT_THRESHOLD: f64 = 50.0;
pub const DEFAULT_HISTORY_CAPACITY: usize = 20;
