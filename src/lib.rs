//! Blade Bounce - deterministic combat core for arena battle toys
//!
//! Core modules:
//! - `sim`: Deterministic simulation (movement, skills, chaos events, combat, rounds)
//! - `config`: Immutable battle configuration
//! - `scoreboard`: Best-of-N match scoring
//! - `snapshot`: Read-only views for renderers and audio consumers

pub mod config;
pub mod error;
pub mod scoreboard;
pub mod sim;
pub mod snapshot;

pub use config::BattleConfig;
pub use error::ConfigError;
pub use scoreboard::MatchScore;

use glam::Vec2;

/// Simulation constants
pub mod consts {
    /// Simulated frames per second (one tick = one frame)
    pub const FPS: u32 = 60;
    /// Seconds per tick for the ball-battle variant
    pub const SIM_DT: f32 = 1.0 / FPS as f32;

    /// Sword base sits this far outside the body edge
    pub const SWORD_BASE_OFFSET: f32 = 3.0;
    /// Sample points along the blade for direct hits (fraction of base→tip)
    pub const SWORD_SAMPLES: [f32; 3] = [0.4, 0.7, 1.0];
    /// Smoothing factor when the sword tracks the opponent
    pub const SWORD_TRACKING: f32 = 0.25;

    /// Length of the dash trail ring buffer
    pub const TRAIL_LENGTH: usize = 8;
}

/// Convert seconds to whole frames (at least one frame)
#[inline]
pub fn secs_to_frames(secs: f32) -> u32 {
    ((secs * consts::FPS as f32).round() as u32).max(1)
}

/// Normalized angle to [-π, π)
#[inline]
pub fn normalize_angle(mut angle: f32) -> f32 {
    use std::f32::consts::PI;
    while angle >= PI {
        angle -= 2.0 * PI;
    }
    while angle < -PI {
        angle += 2.0 * PI;
    }
    angle
}

/// Shortest signed angular difference from `from` to `to`
#[inline]
pub fn angle_delta(from: f32, to: f32) -> f32 {
    normalize_angle(to - from)
}

/// Unit vector for an angle
#[inline]
pub fn direction(angle: f32) -> Vec2 {
    Vec2::new(angle.cos(), angle.sin())
}

/// Angle of the vector pointing from `from` to `to`
#[inline]
pub fn angle_between(from: Vec2, to: Vec2) -> f32 {
    let d = to - from;
    d.y.atan2(d.x)
}
