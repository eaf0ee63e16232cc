use std::fmt;

use serde::{Deserialize, Serialize};

use crate::estimation::domain::gaze_estimator::GazeDirection;

/// A semantic status condition derived from one or more samples.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FlagKind {
    FaceOk,
    FaceMissing,
    MultipleFaces,
    FaceRotated,
    GazeAway,
    LowLight,
}

/// Ordered so that `max` picks the worst.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Ok,
    Warning,
    Error,
}

impl FlagKind {
    pub const ALL: [FlagKind; 6] = [
        FlagKind::FaceOk,
        FlagKind::FaceMissing,
        FlagKind::MultipleFaces,
        FlagKind::FaceRotated,
        FlagKind::GazeAway,
        FlagKind::LowLight,
    ];

    pub fn severity(self) -> Severity {
        match self {
            FlagKind::FaceOk => Severity::Ok,
            FlagKind::MultipleFaces => Severity::Error,
            FlagKind::FaceMissing
            | FlagKind::FaceRotated
            | FlagKind::GazeAway
            | FlagKind::LowLight => Severity::Warning,
        }
    }

    /// Status line for this flag. `gaze` only affects [`FlagKind::GazeAway`].
    pub fn message(self, gaze: Option<GazeDirection>) -> String {
        match self {
            FlagKind::FaceOk => "Face detected and centered".to_string(),
            FlagKind::FaceMissing => "No face detected".to_string(),
            FlagKind::MultipleFaces => "Multiple faces detected".to_string(),
            FlagKind::FaceRotated => "Face turned away from the camera".to_string(),
            FlagKind::GazeAway => match gaze {
                Some(direction)
                    if direction != GazeDirection::Center
                        && direction != GazeDirection::Unknown =>
                {
                    format!("Looking away ({})", direction.label())
                }
                _ => "Looking away from the screen".to_string(),
            },
            FlagKind::LowLight => "Lighting too dark".to_string(),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            FlagKind::FaceOk => "FACE_OK",
            FlagKind::FaceMissing => "FACE_MISSING",
            FlagKind::MultipleFaces => "MULTIPLE_FACES",
            FlagKind::FaceRotated => "FACE_ROTATED",
            FlagKind::GazeAway => "GAZE_AWAY",
            FlagKind::LowLight => "LOW_LIGHT",
        }
    }
}

impl fmt::Display for FlagKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Severity::Ok => "ok",
            Severity::Warning => "warning",
            Severity::Error => "error",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(FlagKind::FaceOk, Severity::Ok)]
    #[case(FlagKind::MultipleFaces, Severity::Error)]
    #[case(FlagKind::FaceMissing, Severity::Warning)]
    #[case(FlagKind::FaceRotated, Severity::Warning)]
    #[case(FlagKind::GazeAway, Severity::Warning)]
    #[case(FlagKind::LowLight, Severity::Warning)]
    fn test_severity(#[case] kind: FlagKind, #[case] expected: Severity) {
        assert_eq!(kind.severity(), expected);
    }

    #[test]
    fn test_severity_orders_worst_last() {
        assert!(Severity::Ok < Severity::Warning);
        assert!(Severity::Warning < Severity::Error);
    }

    #[rstest]
    #[case(GazeDirection::UpLeft, "Looking away (up-left)")]
    #[case(GazeDirection::Right, "Looking away (right)")]
    #[case(GazeDirection::DownRight, "Looking away (down-right)")]
    fn test_gaze_message_names_direction(#[case] direction: GazeDirection, #[case] expected: &str) {
        assert_eq!(FlagKind::GazeAway.message(Some(direction)), expected);
    }

    #[test]
    fn test_gaze_message_without_direction() {
        assert_eq!(
            FlagKind::GazeAway.message(None),
            "Looking away from the screen"
        );
        assert_eq!(
            FlagKind::GazeAway.message(Some(GazeDirection::Unknown)),
            "Looking away from the screen"
        );
    }

    #[test]
    fn test_other_messages_ignore_gaze() {
        assert_eq!(
            FlagKind::LowLight.message(Some(GazeDirection::Left)),
            FlagKind::LowLight.message(None)
        );
    }

    #[test]
    fn test_serializes_screaming_snake_case() {
        let json = serde_json::to_string(&FlagKind::MultipleFaces).unwrap();
        assert_eq!(json, "\"MULTIPLE_FACES\"");
        assert_eq!(FlagKind::MultipleFaces.to_string(), "MULTIPLE_FACES");
        assert_eq!(serde_json::to_string(&Severity::Warning).unwrap(), "\"warning\"");
    }
}
