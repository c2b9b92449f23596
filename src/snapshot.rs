//! Read-only views for renderers and audio consumers
//!
//! Built once per tick from the simulation state. Nothing here feeds back
//! into the simulation.

use glam::Vec2;
use serde::Serialize;

use crate::sim::balls::{Ball, BallBattle, team_color};
use crate::sim::chaos::{ChaosEvent, ColorOverride};
use crate::sim::events::{Rgb, palette};
use crate::sim::geometry::Rect;
use crate::sim::orbs::SkillOrb;
use crate::sim::skill::SkillKind;
use crate::sim::state::{DuelState, Fighter, RoundPhase, Side};

#[derive(Debug, Clone, Serialize)]
pub struct FighterSnapshot {
    pub side: Side,
    pub pos: Vec2,
    /// Body radius after chaos scaling
    pub radius: f32,
    pub sword_angle: f32,
    pub sword_length: f32,
    pub health: f32,
    pub max_health: f32,
    pub skill: Option<SkillKind>,
    pub combo_step: u8,
    /// Hit flash in progress
    pub flash: bool,
    pub shield: bool,
    pub stunned: bool,
    /// Render color with any chaos override applied
    pub color: Rgb,
    /// Dash trail, oldest first
    pub trail: Vec<Vec2>,
}

impl FighterSnapshot {
    pub fn new(f: &Fighter, color: Option<ColorOverride>) -> Self {
        Self {
            side: f.side,
            pos: f.pos,
            radius: f.body_radius(),
            sword_angle: f.sword_angle,
            sword_length: f.sword_length,
            health: f.health,
            max_health: f.max_health,
            skill: f.skill_kind(),
            combo_step: f.combo_step,
            flash: f.flash_frames > 0,
            shield: f.has_shield,
            stunned: f.stunned,
            color: override_color(f.side, color),
            trail: f
                .skill
                .as_ref()
                .and_then(|s| s.trail())
                .map(|t| t.iter().copied().collect())
                .unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DuelSnapshot {
    pub frame: u64,
    pub round: u32,
    pub phase: RoundPhase,
    /// Bounds the fighters collide with this frame
    pub arena: Rect,
    pub fighters: [FighterSnapshot; 2],
    pub orbs: Vec<SkillOrb>,
    pub chaos: Option<ChaosEvent>,
    /// TronMode trails per side
    pub light_trails: [Vec<Vec2>; 2],
    /// MovingWalls interior wall center x
    pub wall_x: Option<f32>,
    pub slow_motion: bool,
    pub frozen: bool,
    pub wins: [u32; 2],
}

impl DuelSnapshot {
    pub fn new(state: &DuelState, arena: Rect) -> Self {
        let color = state.chaos.modifiers().color;
        Self {
            frame: state.frame,
            round: state.round,
            phase: state.phase,
            arena,
            fighters: state.fighters.each_ref().map(|f| FighterSnapshot::new(f, color)),
            orbs: state.orbs.orbs.clone(),
            chaos: state.chaos.active,
            light_trails: state
                .chaos
                .trails
                .each_ref()
                .map(|t| t.iter().copied().collect()),
            wall_x: state.chaos.wall.map(|w| w.x),
            slow_motion: state.slow_motion.is_some(),
            frozen: state.hit_stop > 0,
            wins: state.score.wins,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BallSnapshot {
    pub id: u32,
    pub team: u8,
    pub pos: Vec2,
    pub radius: f32,
    pub health_fraction: f32,
    pub flash: f32,
    pub color: Rgb,
}

impl From<&Ball> for BallSnapshot {
    fn from(b: &Ball) -> Self {
        Self {
            id: b.id,
            team: b.team,
            pos: b.pos,
            radius: b.radius,
            health_fraction: b.health_fraction(),
            flash: b.hit_flash,
            color: team_color(b.team),
        }
    }
}

/// All living balls of a battle
pub fn ball_snapshots(battle: &BallBattle) -> Vec<BallSnapshot> {
    battle.balls.iter().map(BallSnapshot::from).collect()
}

fn override_color(side: Side, color: Option<ColorOverride>) -> Rgb {
    match color {
        None => side.color(),
        Some(ColorOverride::Black) => palette::BLACK,
        Some(ColorOverride::Neon) => match side {
            Side::Blue => palette::NEON_BLUE,
            Side::Red => palette::NEON_RED,
        },
        Some(ColorOverride::Rainbow { hue }) => {
            // Opposite sides of the wheel so the fighters stay distinct
            let offset = if side == Side::Blue { 0.0 } else { 180.0 };
            hue_to_rgb(hue + offset)
        }
    }
}

/// Fully saturated color for a hue in degrees
fn hue_to_rgb(hue: f32) -> Rgb {
    let h = hue.rem_euclid(360.0) / 60.0;
    let x = 1.0 - (h % 2.0 - 1.0).abs();
    let (r, g, b) = match h as u32 {
        0 => (1.0, x, 0.0),
        1 => (x, 1.0, 0.0),
        2 => (0.0, 1.0, x),
        3 => (0.0, x, 1.0),
        4 => (x, 0.0, 1.0),
        _ => (1.0, 0.0, x),
    };
    let to_u8 = |c: f32| (c * 255.0).round() as u8;
    [to_u8(r), to_u8(g), to_u8(b)]
}
