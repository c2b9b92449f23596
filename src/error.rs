//! Configuration errors
//!
//! The simulation itself never fails; only building a configuration can.

use std::path::PathBuf;

/// Reasons a [`crate::BattleConfig`] cannot be used
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("minimum speed {min} exceeds maximum speed {max}")]
    SpeedRange { min: f32, max: f32 },

    #[error("bounce energy must be in (0, 1], got {0}")]
    BounceEnergy(f32),

    #[error("arena {width}x{height} is smaller than its {floor} px floor")]
    ArenaTooSmall { width: f32, height: f32, floor: f32 },

    #[error("{name} must be a probability in [0, 1], got {value}")]
    Probability { name: &'static str, value: f32 },

    #[error("{0} must be positive")]
    NonPositive(&'static str),

    #[error("{field} minimum exceeds its maximum")]
    InvertedRange { field: &'static str },

    #[error("ball battle needs at least two teams with one ball each")]
    EmptyTeams,
}
