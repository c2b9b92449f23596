//! Deterministic simulation module
//!
//! All gameplay logic lives here. This module must be pure and deterministic:
//! - Fixed timestep only
//! - Seeded RNG only (owned by the state)
//! - Stable iteration order (Blue before Red, balls by id)
//! - No rendering or audio: feedback leaves as requests in `FrameOutput`

pub mod arena;
pub mod balls;
pub mod chaos;
pub mod combat;
pub mod events;
pub mod geometry;
pub mod orbs;
pub mod skill;
pub mod state;
pub mod tick;

pub use arena::{ArenaBounds, EscalationTier};
pub use balls::{Ball, BallBattle};
pub use chaos::{ChaosEvent, ChaosManager, ChaosModifiers, ColorOverride};
pub use events::{BattleEvent, EffectKind, EffectRequest, FeedbackSink, FrameOutput, SoundCue};
pub use geometry::{Rect, Segment};
pub use orbs::{OrbField, SkillOrb};
pub use skill::{ActiveSkill, SkillKind};
pub use state::{
    DuelState, Fighter, RoundEndReason, RoundOutcome, RoundPhase, Side, SlowMoKind, SlowMotion,
};
pub use tick::{TickInput, tick};
