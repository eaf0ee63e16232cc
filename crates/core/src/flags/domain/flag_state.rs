use std::collections::{BTreeSet, VecDeque};

use serde::{Deserialize, Serialize};

use crate::estimation::domain::gaze_estimator::GazeDirection;
use crate::flags::domain::flag_kind::{FlagKind, Severity};
use crate::shared::constants::{
    DEFAULT_HISTORY_CAPACITY, DEFAULT_LOW_LIGHT_THRESHOLD, DEFAULT_MISSING_FACE_THRESHOLD,
};

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlagConfig {
    /// Consecutive faceless samples before `FaceMissing` is raised.
    pub missing_face_threshold: u32,
    /// Mean luma strictly below this raises `LowLight`.
    pub low_light_threshold: f64,
    pub history_capacity: usize,
}

impl Default for FlagConfig {
    fn default() -> Self {
        Self {
            missing_face_threshold: DEFAULT_MISSING_FACE_THRESHOLD,
            low_light_threshold: DEFAULT_LOW_LIGHT_THRESHOLD,
            history_capacity: DEFAULT_HISTORY_CAPACITY,
        }
    }
}

/// The sample values recorded alongside a history entry.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HistoryDetails {
    pub face_count: usize,
    pub is_rotated: bool,
    pub is_looking_away: bool,
    pub gaze_direction: Option<GazeDirection>,
    pub brightness: u8,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub timestamp_ms: u64,
    pub flags: BTreeSet<FlagKind>,
    pub details: HistoryDetails,
}

/// Snapshot of the aggregated status after some number of samples.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FlagState {
    pub current_flags: BTreeSet<FlagKind>,
    /// Set only while `GazeAway` is raised.
    pub gaze_direction: Option<GazeDirection>,
    pub consecutive_missing: u32,
    pub last_update_ms: Option<u64>,
    /// Oldest first.
    pub history: VecDeque<HistoryEntry>,
}

impl FlagState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has(&self, kind: FlagKind) -> bool {
        self.current_flags.contains(&kind)
    }

    /// Worst severity among the current flags; `Ok` when none are raised.
    pub fn severity(&self) -> Severity {
        self.current_flags
            .iter()
            .map(|kind| kind.severity())
            .max()
            .unwrap_or(Severity::Ok)
    }

    pub fn messages(&self) -> Vec<String> {
        self.current_flags
            .iter()
            .map(|kind| kind.message(self.gaze_direction))
            .collect()
    }
}
