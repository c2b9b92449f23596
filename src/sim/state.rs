//! Duel state and core fighter types
//!
//! Everything the scheduler needs to replay a duel from its seed lives here.

use std::f32::consts::TAU;

use glam::Vec2;
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};

use super::arena::ArenaBounds;
use super::chaos::ChaosManager;
use super::events::{BattleEvent, FrameOutput, Rgb, palette};
use super::geometry::{Rect, Segment};
use super::orbs::OrbField;
use super::skill::{self, ActiveSkill, SHIELD_PARRY_WINDOW, SkillKind};
use crate::config::{BattleConfig, FighterConfig, PhysicsConfig};
use crate::consts::SWORD_BASE_OFFSET;
use crate::scoreboard::MatchScore;
use crate::{angle_between, angle_delta, direction, normalize_angle};

/// Damage multiplier per combo stage
pub const COMBO_MULTIPLIERS: [f32; 4] = [1.0, 1.1, 1.25, 1.5];
/// Highest combo stage
pub const MAX_COMBO: u8 = 3;
/// Frames of white flash after a hit or parry
pub const FLASH_FRAMES: u32 = 4;

/// The two duelists
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Side {
    Blue,
    Red,
}

impl Side {
    pub const BOTH: [Side; 2] = [Side::Blue, Side::Red];

    #[inline]
    pub fn index(self) -> usize {
        match self {
            Side::Blue => 0,
            Side::Red => 1,
        }
    }

    #[inline]
    pub fn opponent(self) -> Side {
        match self {
            Side::Blue => Side::Red,
            Side::Red => Side::Blue,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Side::Blue => "Blue",
            Side::Red => "Red",
        }
    }

    pub fn color(self) -> Rgb {
        match self {
            Side::Blue => palette::BLUE,
            Side::Red => palette::RED,
        }
    }
}

/// Outcome of a fighter absorbing a hit
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DamageResult {
    /// Invincibility frames swallowed the hit
    Ignored,
    /// Shield consumed inside its parry window
    ShieldParried,
    /// Shield consumed outside its parry window
    ShieldBlocked,
    /// Health lost (after clamping at zero)
    Damaged { amount: f32 },
}

/// A bouncing sword fighter
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Fighter {
    pub side: Side,
    pub pos: Vec2,
    pub vel: Vec2,
    /// Unscaled body radius
    pub radius: f32,
    pub sword_length: f32,
    /// Chaos size multiplier applied to the body
    pub size_scale: f32,
    pub sword_angle: f32,
    pub health: f32,
    pub max_health: f32,

    // Frame counters
    pub invincible_frames: u32,
    pub attack_cooldown: u32,
    pub flash_frames: u32,
    /// Frames before another skill may start
    pub skill_cooldown: u32,

    // Combo
    pub combo_step: u8,
    /// Frames left to land the next combo strike
    pub combo_timer: u32,
    /// Stagger after a mutual sword parry
    pub combo_recovery: u32,

    pub skill: Option<ActiveSkill>,
    pub has_shield: bool,
    pub shield_parry_window: u32,
    /// Failed spin parry: the next hit taken is amplified
    pub spin_parry_recovery: u32,

    /// Held in place during the countdown
    pub locked: bool,
    /// Frozen by the opponent's charging ultimate (derived every tick)
    pub stunned: bool,
}

impl Fighter {
    /// Fresh fighter at its spawn point, locked for the countdown
    pub fn new(side: Side, cfg: &BattleConfig) -> Self {
        let arena = cfg.arena.rect();
        let f = &cfg.fighter;
        let center = arena.center();
        let (x, sword_angle) = match side {
            Side::Blue => (arena.left() + f.spawn_margin, 0.0),
            Side::Red => (arena.right() - f.spawn_margin, std::f32::consts::PI),
        };
        Self {
            side,
            pos: Vec2::new(x, center.y),
            vel: Vec2::ZERO,
            radius: f.radius,
            sword_length: f.sword_length,
            size_scale: 1.0,
            sword_angle,
            health: f.max_health,
            max_health: f.max_health,
            invincible_frames: 0,
            attack_cooldown: 0,
            flash_frames: 0,
            skill_cooldown: 0,
            combo_step: 0,
            combo_timer: 0,
            combo_recovery: 0,
            skill: None,
            has_shield: false,
            shield_parry_window: 0,
            spin_parry_recovery: 0,
            locked: true,
            stunned: false,
        }
    }

    #[inline]
    pub fn body_radius(&self) -> f32 {
        self.radius * self.size_scale
    }

    #[inline]
    pub fn is_alive(&self) -> bool {
        self.health > 0.0
    }

    pub fn skill_kind(&self) -> Option<SkillKind> {
        self.skill.as_ref().map(ActiveSkill::kind)
    }

    /// Movement is skipped entirely this frame
    pub fn is_immobile(&self) -> bool {
        self.locked || self.stunned || self.skill.as_ref().is_some_and(|s| s.locks_position())
    }

    /// Blade from its base just outside the body to the tip
    pub fn sword_segment(&self) -> Segment {
        let dir = direction(self.sword_angle);
        let base = self.pos + dir * (self.body_radius() + SWORD_BASE_OFFSET);
        Segment::new(base, base + dir * self.sword_length)
    }

    /// Swing the sword toward `target` by a fraction of the remaining angle
    pub fn track_sword(&mut self, target: Vec2, rate: f32) {
        let aim = angle_between(self.pos, target);
        self.sword_angle =
            normalize_angle(self.sword_angle + angle_delta(self.sword_angle, aim) * rate);
    }

    /// Able to land a basic sword strike this frame
    pub fn is_attacking(&self) -> bool {
        self.is_alive()
            && !self.locked
            && !self.stunned
            && self.attack_cooldown == 0
            && self.combo_recovery == 0
            && !self.skill.as_ref().is_some_and(|s| s.suppresses_strikes())
    }

    pub fn can_activate(&self) -> bool {
        self.is_alive()
            && self.skill.is_none()
            && self.skill_cooldown == 0
            && !self.locked
            && !self.stunned
    }

    /// Start a skill aimed at `opponent`. Rejected silently (returns false)
    /// when another skill is running, on cooldown, or while locked or stunned.
    pub fn try_activate(
        &mut self,
        kind: SkillKind,
        opponent: &Fighter,
        bounds: &Rect,
        cfg: &FighterConfig,
        out: &mut FrameOutput,
    ) -> bool {
        if !self.can_activate() {
            return false;
        }
        match ActiveSkill::start(kind, self, opponent.pos, bounds) {
            Some(active) => self.skill = Some(active),
            None => {
                self.has_shield = true;
                self.shield_parry_window = SHIELD_PARRY_WINDOW;
                self.skill_cooldown = cfg.skill_cooldown;
            }
        }
        log::debug!("{} activates {}", self.side.name(), kind.name());
        skill::announce(self, kind, out);
        true
    }

    /// End the running skill and start the skill cooldown
    pub fn finish_skill(
        &mut self,
        kind: SkillKind,
        cancelled: bool,
        cooldown: u32,
        out: &mut FrameOutput,
    ) {
        self.skill = None;
        self.skill_cooldown = cooldown;
        out.event(BattleEvent::SkillEnded {
            side: self.side,
            kind,
            cancelled,
        });
    }

    /// Cancel whatever skill is running
    pub fn cancel_skill(&mut self, cooldown: u32, out: &mut FrameOutput) {
        if let Some(kind) = self.skill_kind() {
            self.finish_skill(kind, true, cooldown, out);
        }
    }

    /// Absorb a hit: invincibility swallows it, a shield is consumed,
    /// otherwise health drops (clamped at 0) and knockback applies.
    pub fn take_damage(
        &mut self,
        amount: f32,
        knockback: Vec2,
        invincibility: u32,
    ) -> DamageResult {
        if self.invincible_frames > 0 {
            return DamageResult::Ignored;
        }
        if self.has_shield {
            self.has_shield = false;
            let parried = self.shield_parry_window > 0;
            self.shield_parry_window = 0;
            self.flash_frames = FLASH_FRAMES;
            return if parried {
                DamageResult::ShieldParried
            } else {
                DamageResult::ShieldBlocked
            };
        }

        let before = self.health;
        self.health = (self.health - amount).max(0.0);
        self.vel += knockback;
        self.invincible_frames = invincibility;
        self.flash_frames = FLASH_FRAMES;
        // Vulnerability is spent by the hit it amplified
        self.spin_parry_recovery = 0;
        DamageResult::Damaged {
            amount: before - self.health,
        }
    }

    /// Restore health, never above max
    pub fn heal(&mut self, amount: f32) -> f32 {
        let before = self.health;
        self.health = (self.health + amount).min(self.max_health);
        self.health - before
    }

    /// Damage multiplier for the combo stage this strike lands at
    pub fn combo_multiplier(&self) -> f32 {
        COMBO_MULTIPLIERS[self.combo_step.min(MAX_COMBO) as usize]
    }

    /// A basic strike landed: advance the combo and reopen its window
    pub fn advance_combo(&mut self, window: u32) {
        self.combo_step = (self.combo_step + 1).min(MAX_COMBO);
        self.combo_timer = window;
    }

    pub fn reset_combo(&mut self) {
        self.combo_step = 0;
        self.combo_timer = 0;
    }

    /// One frame of movement (drag, speed clamps, integration, wall bounce)
    /// followed by the frame counters. `dt` scales integration only.
    pub fn advance(&mut self, dt: f32, bounds: &Rect, physics: &PhysicsConfig, rng: &mut Pcg32) {
        if !self.is_immobile() {
            self.vel *= physics.drag;

            let cap = self
                .skill
                .as_ref()
                .map_or(physics.max_speed, |s| s.speed_cap(physics));
            let speed = self.vel.length();
            if speed > cap {
                self.vel *= cap / speed;
            } else if speed < physics.min_speed {
                if speed > f32::EPSILON {
                    self.vel *= physics.min_speed / speed;
                } else {
                    let angle = rng.random_range(0.0..TAU);
                    self.vel = direction(angle) * physics.min_speed;
                }
            }

            self.pos += self.vel * dt;
            self.bounce_off_walls(bounds, physics);
        }
        self.tick_timers();
    }

    /// Clamp inside `bounds`, reflecting and boosting off any wall crossed.
    /// Returns true if a wall was hit.
    pub fn bounce_off_walls(&mut self, bounds: &Rect, physics: &PhysicsConfig) -> bool {
        let r = self.body_radius();
        let e = physics.bounce_energy;
        let boost = physics.wall_boost;
        let mut bounced = false;

        if self.pos.x - r < bounds.left() {
            self.pos.x = bounds.left() + r;
            self.vel.x = self.vel.x.abs() * e + boost;
            bounced = true;
        } else if self.pos.x + r > bounds.right() {
            self.pos.x = bounds.right() - r;
            self.vel.x = -(self.vel.x.abs() * e + boost);
            bounced = true;
        }

        if self.pos.y - r < bounds.top() {
            self.pos.y = bounds.top() + r;
            self.vel.y = self.vel.y.abs() * e + boost;
            bounced = true;
        } else if self.pos.y + r > bounds.bottom() {
            self.pos.y = bounds.bottom() - r;
            self.vel.y = -(self.vel.y.abs() * e + boost);
            bounced = true;
        }

        bounced
    }

    fn tick_timers(&mut self) {
        self.invincible_frames = self.invincible_frames.saturating_sub(1);
        self.attack_cooldown = self.attack_cooldown.saturating_sub(1);
        self.flash_frames = self.flash_frames.saturating_sub(1);
        self.shield_parry_window = self.shield_parry_window.saturating_sub(1);
        self.spin_parry_recovery = self.spin_parry_recovery.saturating_sub(1);
        self.combo_recovery = self.combo_recovery.saturating_sub(1);
        if self.skill.is_none() {
            self.skill_cooldown = self.skill_cooldown.saturating_sub(1);
        }
        if self.combo_timer > 0 {
            self.combo_timer -= 1;
            if self.combo_timer == 0 {
                self.combo_step = 0;
            }
        }
    }
}

/// Why a round ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoundEndReason {
    KnockOut,
    DoubleKnockOut,
    /// Time ran out; closest to the center won
    Timeout,
}

/// Result of one round
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoundOutcome {
    Winner(Side),
    Draw,
}

/// Round lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoundPhase {
    /// "3", "2", "1", "FIGHT" with both fighters locked
    Countdown { frames_left: u32 },
    Active,
    /// Death slow-motion before the reset
    RoundEnding { frames_left: u32 },
    MatchOver,
}

/// Slow-motion trigger kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SlowMoKind {
    Parry,
    Hit,
    CriticalImpact,
    Death,
}

/// The single slow-motion window in force (a new trigger replaces it)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SlowMotion {
    pub kind: SlowMoKind,
    /// Real frames left
    pub frames_left: u32,
    /// Simulated frames per real frame
    pub scale: f32,
}

/// Complete duel state (deterministic, serializable)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DuelState {
    /// Seed for reproducibility
    pub seed: u64,
    pub rng: Pcg32,
    /// Real frames since the duel started
    pub frame: u64,
    /// Current round (1-based)
    pub round: u32,
    /// Simulated frames in the current round's fight
    pub round_frames: u32,
    pub phase: RoundPhase,
    pub fighters: [Fighter; 2],
    pub arena: ArenaBounds,
    pub chaos: ChaosManager,
    pub orbs: OrbField,
    /// Frozen frames remaining
    pub hit_stop: u32,
    pub slow_motion: Option<SlowMotion>,
    /// Fractional simulated time owed under slow motion
    pub slow_accumulator: f32,
    pub score: MatchScore,
    /// This frame's events and feedback requests
    #[serde(skip)]
    pub output: FrameOutput,
}

impl DuelState {
    pub fn new(seed: u64, cfg: &BattleConfig) -> Self {
        let mut rng = Pcg32::seed_from_u64(seed);
        let chaos = ChaosManager::new(&cfg.chaos, &mut rng);
        let orbs = OrbField::new(&cfg.orbs, &mut rng);
        Self {
            seed,
            rng,
            frame: 0,
            round: 1,
            round_frames: 0,
            phase: RoundPhase::Countdown {
                frames_left: countdown_frames(cfg),
            },
            fighters: [Fighter::new(Side::Blue, cfg), Fighter::new(Side::Red, cfg)],
            arena: ArenaBounds::new(&cfg.arena),
            chaos,
            orbs,
            hit_stop: 0,
            slow_motion: None,
            slow_accumulator: 0.0,
            score: MatchScore::new(cfg.round.best_of),
            output: FrameOutput::default(),
        }
    }

    #[inline]
    pub fn fighter(&self, side: Side) -> &Fighter {
        &self.fighters[side.index()]
    }

    #[inline]
    pub fn fighter_mut(&mut self, side: Side) -> &mut Fighter {
        &mut self.fighters[side.index()]
    }

    /// Arena bounds after chaos scaling
    pub fn effective_bounds(&self, cfg: &BattleConfig) -> Rect {
        self.arena
            .effective(self.chaos.modifiers().arena_scale, cfg.arena.min_size)
    }

    /// Queue a freeze, keeping the longer of the pending and new one
    pub fn add_hit_stop(&mut self, frames: u32) {
        self.hit_stop = self.hit_stop.max(frames);
    }

    /// Replace any running slow motion (last trigger wins)
    pub fn trigger_slow_motion(&mut self, kind: SlowMoKind, frames: u32, scale: f32) {
        if frames == 0 {
            return;
        }
        self.slow_motion = Some(SlowMotion {
            kind,
            frames_left: frames,
            scale: scale.clamp(0.0, 1.0),
        });
    }

    /// Clear everything in flight and go back to the countdown
    pub fn reset_round(&mut self, cfg: &BattleConfig) {
        self.fighters = [Fighter::new(Side::Blue, cfg), Fighter::new(Side::Red, cfg)];
        self.arena.reset();
        self.chaos.reset(&cfg.chaos, &mut self.rng);
        self.orbs.reset(&cfg.orbs, &mut self.rng);
        self.hit_stop = 0;
        self.slow_motion = None;
        self.slow_accumulator = 0.0;
        self.round_frames = 0;
        self.round += 1;
        self.phase = RoundPhase::Countdown {
            frames_left: countdown_frames(cfg),
        };
    }
}

/// Split the pair into (`first`, its opponent)
pub fn pair_mut(fighters: &mut [Fighter; 2], first: Side) -> (&mut Fighter, &mut Fighter) {
    let [blue, red] = fighters;
    match first {
        Side::Blue => (blue, red),
        Side::Red => (red, blue),
    }
}

/// Full countdown: three numbered steps and the "FIGHT" banner
pub fn countdown_frames(cfg: &BattleConfig) -> u32 {
    (cfg.round.countdown_step_frames * 3 + cfg.round.fight_banner_frames).max(1)
}
