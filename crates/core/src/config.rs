use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::estimation::domain::gaze_estimator::GazeConfig;
use crate::estimation::domain::rotation_estimator::RotationConfig;
use crate::flags::domain::flag_state::FlagConfig;
use crate::sampling::frame_scheduler::SamplerConfig;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid config value: {0}")]
    Invalid(String),
}

/// Every tunable of the pipeline. Missing JSON fields keep their defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    pub sampler: SamplerConfig,
    pub rotation: RotationConfig,
    pub gaze: GazeConfig,
    pub flags: FlagConfig,
}

impl MonitorConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let json = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&json)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let s = &self.sampler;
        if s.sample_interval_ms == 0 {
            return Err(invalid("sampler.sample_interval_ms must be positive"));
        }
        if s.overrun_limit == 0 {
            return Err(invalid("sampler.overrun_limit must be at least 1"));
        }
        if s.brightness_stride == 0 {
            return Err(invalid("sampler.brightness_stride must be at least 1"));
        }
        if s.fallback_width == 0 || s.fallback_height == 0 {
            return Err(invalid("sampler fallback dimensions must be positive"));
        }
        if !(self.rotation.yaw_ratio_threshold > 0.0 && self.rotation.yaw_ratio_threshold <= 1.0) {
            return Err(ConfigError::Invalid(format!(
                "rotation.yaw_ratio_threshold must be in (0, 1], got {}",
                self.rotation.yaw_ratio_threshold
            )));
        }
        if self.flags.history_capacity == 0 {
            return Err(invalid("flags.history_capacity must be at least 1"));
        }
        Ok(())
    }
}

fn invalid(message: &str) -> ConfigError {
    ConfigError::Invalid(message.to_string())
}
