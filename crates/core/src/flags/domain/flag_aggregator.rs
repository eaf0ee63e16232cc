//! Folds per-cycle samples into debounced status flags.
//!
//! Face presence is judged first (several faces, none, or exactly one and
//! then how it is oriented); lighting is judged independently. A missing
//! face is only reported after several faceless samples in a row so a
//! single dropped detection does not flicker the status.

use std::collections::{BTreeMap, BTreeSet};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::flags::domain::flag_kind::FlagKind;
use crate::flags::domain::flag_state::{FlagConfig, FlagState, HistoryDetails, HistoryEntry};
use crate::sampling::domain::sample::Sample;

/// Like [`process_analysis_at`], stamped with the current wall-clock time.
pub fn process_analysis(state: &FlagState, sample: &Sample, config: &FlagConfig) -> FlagState {
    process_analysis_at(state, sample, config, now_ms())
}

/// Returns the state after observing `sample`. `state` is left untouched.
pub fn process_analysis_at(
    state: &FlagState,
    sample: &Sample,
    config: &FlagConfig,
    timestamp_ms: u64,
) -> FlagState {
    let mut flags = BTreeSet::new();
    let mut consecutive_missing = state.consecutive_missing;
    let mut gaze_direction = None;

    match sample.face_count {
        0 => {
            consecutive_missing = consecutive_missing.saturating_add(1);
            if consecutive_missing >= config.missing_face_threshold {
                flags.insert(FlagKind::FaceMissing);
            }
        }
        1 => {
            consecutive_missing = 0;
            if sample.is_rotated {
                flags.insert(FlagKind::FaceRotated);
            } else if sample.is_looking_away {
                flags.insert(FlagKind::GazeAway);
                gaze_direction = sample.gaze_direction;
            } else {
                flags.insert(FlagKind::FaceOk);
            }
        }
        _ => {
            consecutive_missing = 0;
            flags.insert(FlagKind::MultipleFaces);
        }
    }

    if sample.brightness < config.low_light_threshold {
        flags.insert(FlagKind::LowLight);
    }

    let flags_changed = flags != state.current_flags;
    let gaze_moved = flags.contains(&FlagKind::GazeAway)
        && state.current_flags.contains(&FlagKind::GazeAway)
        && gaze_direction != state.gaze_direction;

    let mut history = state.history.clone();
    if flags_changed || gaze_moved {
        history.push_back(HistoryEntry {
            timestamp_ms,
            flags: flags.clone(),
            details: HistoryDetails {
                face_count: sample.face_count,
                is_rotated: sample.is_rotated,
                is_looking_away: sample.is_looking_away,
                gaze_direction: sample.gaze_direction,
                brightness: sample.brightness.round().clamp(0.0, 255.0) as u8,
            },
        });
        while history.len() > config.history_capacity {
            history.pop_front();
        }
    }

    FlagState {
        current_flags: flags,
        gaze_direction,
        consecutive_missing,
        last_update_ms: Some(timestamp_ms),
        history,
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Owns the latest [`FlagState`] for callers that want a stateful handle.
pub struct FlagAggregator {
    state: FlagState,
    config: FlagConfig,
}

impl FlagAggregator {
    pub fn new(config: FlagConfig) -> Self {
        Self {
            state: FlagState::new(),
            config,
        }
    }

    pub fn apply(&mut self, sample: &Sample) -> &FlagState {
        self.state = process_analysis(&self.state, sample, &self.config);
        &self.state
    }

    pub fn apply_at(&mut self, sample: &Sample, timestamp_ms: u64) -> &FlagState {
        self.state = process_analysis_at(&self.state, sample, &self.config, timestamp_ms);
        &self.state
    }

    pub fn state(&self) -> &FlagState {
        &self.state
    }

    pub fn into_state(self) -> FlagState {
        self.state
    }

    pub fn reset(&mut self) {
        self.state = FlagState::new();
    }

    /// How many history entries raised each flag.
    pub fn summary(&self) -> BTreeMap<FlagKind, usize> {
        let mut counts = BTreeMap::new();
        for entry in &self.state.history {
            for kind in &entry.flags {
                *counts.entry(*kind).or_insert(0) += 1;
            }
        }
        counts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::estimation::domain::gaze_estimator::GazeDirection;
    use rstest::rstest;

    fn sample(face_count: usize) -> Sample {
        Sample {
            face_count,
            is_rotated: false,
            is_looking_away: false,
            gaze_direction: (face_count > 0).then_some(GazeDirection::Center),
            brightness: 120.0,
            processing_time_ms: 10.0,
        }
    }

    fn looking(direction: GazeDirection) -> Sample {
        Sample {
            is_looking_away: true,
            gaze_direction: Some(direction),
            ..sample(1)
        }
    }

    fn flags(kinds: &[FlagKind]) -> BTreeSet<FlagKind> {
        kinds.iter().copied().collect()
    }

    fn run(samples: &[Sample]) -> Vec<FlagState> {
        let config = FlagConfig::default();
        let mut state = FlagState::new();
        let mut states = Vec::new();
        for (i, s) in samples.iter().enumerate() {
            state = process_analysis_at(&state, s, &config, (i as u64 + 1) * 500);
            states.push(state.clone());
        }
        states
    }

    #[test]
    fn test_missing_face_is_debounced() {
        let samples: Vec<_> = [1, 1, 0, 0, 0, 1].iter().map(|&n| sample(n)).collect();
        let states = run(&samples);

        assert_eq!(states[0].current_flags, flags(&[FlagKind::FaceOk]));
        assert_eq!(states[1].current_flags, flags(&[FlagKind::FaceOk]));
        assert!(states[2].current_flags.is_empty());
        assert_eq!(states[2].consecutive_missing, 1);
        assert!(states[3].current_flags.is_empty());
        assert_eq!(states[4].current_flags, flags(&[FlagKind::FaceMissing]));
        assert_eq!(states[4].consecutive_missing, 3);
        assert_eq!(states[5].current_flags, flags(&[FlagKind::FaceOk]));
        assert_eq!(states[5].consecutive_missing, 0);

        let recorded: Vec<_> = states[5].history.iter().map(|e| e.flags.clone()).collect();
        assert_eq!(
            recorded,
            vec![
                flags(&[FlagKind::FaceOk]),
                flags(&[]),
                flags(&[FlagKind::FaceMissing]),
                flags(&[FlagKind::FaceOk]),
            ]
        );
        assert_eq!(states[5].history[2].timestamp_ms, 2_500);
    }

    #[test]
    fn test_multiple_faces_reset_missing_counter() {
        let states = run(&[sample(0), sample(0), sample(2), sample(0)]);

        assert_eq!(states[2].current_flags, flags(&[FlagKind::MultipleFaces]));
        assert_eq!(states[2].consecutive_missing, 0);
        assert_eq!(states[3].consecutive_missing, 1);
        assert!(!states[3].has(FlagKind::FaceMissing));
    }

    #[test]
    fn test_rotation_takes_priority_over_gaze() {
        let rotated = Sample {
            is_rotated: true,
            ..looking(GazeDirection::Left)
        };
        let state = process_analysis_at(&FlagState::new(), &rotated, &FlagConfig::default(), 1);

        assert_eq!(state.current_flags, flags(&[FlagKind::FaceRotated]));
        assert_eq!(state.gaze_direction, None);
    }

    #[test]
    fn test_gaze_away_carries_direction() {
        let state = process_analysis_at(
            &FlagState::new(),
            &looking(GazeDirection::UpLeft),
            &FlagConfig::default(),
            1,
        );

        assert_eq!(state.current_flags, flags(&[FlagKind::GazeAway]));
        assert_eq!(state.gaze_direction, Some(GazeDirection::UpLeft));
        assert_eq!(state.messages(), vec!["Looking away (up-left)".to_string()]);
    }

    #[rstest]
    #[case::just_below(49.9, true)]
    #[case::at_threshold(50.0, false)]
    #[case::bright(200.0, false)]
    fn test_low_light_threshold(#[case] brightness: f64, #[case] expected: bool) {
        let dark = Sample {
            brightness,
            ..sample(1)
        };
        let state = process_analysis_at(&FlagState::new(), &dark, &FlagConfig::default(), 1);

        assert_eq!(state.has(FlagKind::LowLight), expected);
        assert!(state.has(FlagKind::FaceOk));
    }

    #[test]
    fn test_low_light_combines_with_missing_face() {
        let dark = |n| Sample {
            brightness: 10.0,
            ..sample(n)
        };
        let states = run(&[dark(0), dark(0), dark(0)]);

        assert_eq!(states[0].current_flags, flags(&[FlagKind::LowLight]));
        assert_eq!(
            states[2].current_flags,
            flags(&[FlagKind::FaceMissing, FlagKind::LowLight])
        );
    }

    #[test]
    fn test_unchanged_flags_do_not_append_history() {
        let states = run(&[sample(1), sample(1), sample(1)]);
        assert_eq!(states[2].history.len(), 1);
        assert_eq!(states[2].last_update_ms, Some(1_500));
    }

    #[test]
    fn test_first_empty_state_records_nothing() {
        let states = run(&[sample(0)]);
        assert!(states[0].history.is_empty());
    }

    #[test]
    fn test_gaze_direction_change_appends_history() {
        let states = run(&[
            looking(GazeDirection::Left),
            looking(GazeDirection::Left),
            looking(GazeDirection::Right),
        ]);

        let history = &states[2].history;
        assert_eq!(history.len(), 2);
        assert_eq!(history[1].details.gaze_direction, Some(GazeDirection::Right));
        assert_eq!(history[1].flags, flags(&[FlagKind::GazeAway]));
    }

    #[test]
    fn test_history_is_capped_fifo() {
        let samples: Vec<_> = (0..30).map(|i| sample(if i % 2 == 0 { 1 } else { 2 })).collect();
        let states = run(&samples);

        let last = states.last().unwrap();
        assert_eq!(last.history.len(), 20);
        assert_eq!(last.history.front().unwrap().timestamp_ms, 11 * 500);
        assert_eq!(last.history.back().unwrap().timestamp_ms, 30 * 500);
    }

    #[test]
    fn test_custom_thresholds() {
        let config = FlagConfig {
            missing_face_threshold: 1,
            low_light_threshold: 130.0,
            history_capacity: 2,
        };
        let state = process_analysis_at(&FlagState::new(), &sample(0), &config, 1);
        assert_eq!(
            state.current_flags,
            flags(&[FlagKind::FaceMissing, FlagKind::LowLight])
        );
    }

    #[test]
    fn test_input_state_is_not_mutated() {
        let before = FlagState::new();
        let _ = process_analysis_at(&before, &sample(1), &FlagConfig::default(), 1);
        assert_eq!(before, FlagState::new());
    }

    #[test]
    fn test_history_rounds_brightness() {
        let s = Sample {
            brightness: 87.6,
            ..sample(1)
        };
        let state = process_analysis_at(&FlagState::new(), &s, &FlagConfig::default(), 1);
        assert_eq!(state.history[0].details.brightness, 88);
    }

    #[test]
    fn test_wall_clock_stamp() {
        let state = process_analysis(&FlagState::new(), &sample(1), &FlagConfig::default());
        assert!(state.last_update_ms.unwrap() > 0);
    }

    #[test]
    fn test_aggregator_tracks_state_and_summary() {
        let mut aggregator = FlagAggregator::new(FlagConfig::default());
        for (i, n) in [1, 2, 1, 2, 0].iter().enumerate() {
            aggregator.apply_at(&sample(*n), i as u64);
        }

        let summary = aggregator.summary();
        assert_eq!(summary.get(&FlagKind::FaceOk), Some(&2));
        assert_eq!(summary.get(&FlagKind::MultipleFaces), Some(&2));
        assert_eq!(summary.get(&FlagKind::FaceMissing), None);
        assert_eq!(aggregator.state().consecutive_missing, 1);

        aggregator.reset();
        assert_eq!(aggregator.state(), &FlagState::new());
        assert!(aggregator.apply(&sample(1)).has(FlagKind::FaceOk));
    }
}
