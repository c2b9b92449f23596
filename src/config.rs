//! Battle configuration
//!
//! Built once before a run starts and handed to the scheduler by reference.
//! Nothing in the simulation mutates it.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::secs_to_frames;
use crate::sim::geometry::Rect;

/// Arena geometry and periodic shrink
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ArenaConfig {
    /// Screen size the arena sits in (square)
    pub screen_size: f32,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    /// Hard floor for width/height, whatever shrinks the arena
    pub min_size: f32,
    /// Periodic shrink interval (seconds)
    pub shrink_interval_secs: f32,
    /// Pixels removed from each side per periodic shrink
    pub shrink_amount: f32,
    /// Periodic shrink stops once either side is at or below this
    pub periodic_shrink_floor: f32,
}

impl Default for ArenaConfig {
    fn default() -> Self {
        Self {
            screen_size: 600.0,
            x: 50.0,
            y: 50.0,
            width: 500.0,
            height: 500.0,
            min_size: 250.0,
            shrink_interval_secs: 10.0,
            shrink_amount: 12.0,
            periodic_shrink_floor: 300.0,
        }
    }
}

impl ArenaConfig {
    pub fn rect(&self) -> Rect {
        Rect::new(self.x, self.y, self.width, self.height)
    }
}

/// DVD-logo bounce physics (per-frame units)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PhysicsConfig {
    /// Velocity multiplier per frame (1.0 = no drag)
    pub drag: f32,
    pub max_speed: f32,
    pub min_speed: f32,
    /// Fraction of perpendicular speed kept on a wall bounce
    pub bounce_energy: f32,
    /// Extra speed toward the center after a wall bounce (0 disables)
    pub wall_boost: f32,
    /// Each velocity component is drawn from ±this when a round unlocks
    pub start_speed: f32,
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        Self {
            drag: 1.0,
            max_speed: 20.0,
            min_speed: 10.0,
            bounce_energy: 1.0,
            wall_boost: 4.0,
            start_speed: 6.0,
        }
    }
}

/// Per-fighter combat tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FighterConfig {
    pub radius: f32,
    pub sword_length: f32,
    pub max_health: f32,
    pub damage_per_hit: f32,
    pub base_knockback: f32,
    /// Extra reach added to the defender radius for blade samples
    pub hit_bonus: f32,
    /// Frames between landed basic strikes
    pub attack_cooldown: u32,
    /// Invincibility granted after taking damage
    pub invincibility_frames: u32,
    /// Blade segments closer than this parry each other
    pub sword_parry_distance: f32,
    /// Distance from the side walls at spawn
    pub spawn_margin: f32,
    /// Frames before another skill may start
    pub skill_cooldown: u32,
    /// Frames a combo stays open after a landed strike
    pub combo_window: u32,
    /// Stagger frames after a mutual sword parry
    pub combo_recovery: u32,
    /// Stagger frames after the attacker's strike is blocked by a shield
    pub block_recovery: u32,
    /// Damage multiplier against a fighter recovering from a failed parry
    pub vulnerability_multiplier: f32,
}

impl Default for FighterConfig {
    fn default() -> Self {
        Self {
            radius: 30.0,
            sword_length: 55.0,
            max_health: 300.0,
            damage_per_hit: 10.0,
            base_knockback: 10.0,
            hit_bonus: 8.0,
            attack_cooldown: 18,
            invincibility_frames: 10,
            sword_parry_distance: 12.0,
            spawn_margin: 100.0,
            skill_cooldown: 30,
            combo_window: 45,
            combo_recovery: 8,
            block_recovery: 15,
            vulnerability_multiplier: 1.3,
        }
    }
}

/// Hit-stop, slow-motion and critical strikes
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    pub hit_stop_frames: u32,
    pub clash_hit_stop_frames: u32,
    pub parry_hit_stop_frames: u32,
    pub parry_slowmo_frames: u32,
    pub parry_slowmo_scale: f32,
    pub hit_slowmo_frames: u32,
    pub hit_slowmo_scale: f32,
    pub crit_chance: f32,
    pub crit_multiplier: f32,
    pub crit_slowmo_frames: u32,
    pub crit_slowmo_scale: f32,
    pub death_slowmo_scale: f32,
    /// Black frames requested when an ultimate releases
    pub screen_black_frames: u32,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            hit_stop_frames: 3,
            clash_hit_stop_frames: 3,
            parry_hit_stop_frames: 4,
            parry_slowmo_frames: 20,
            parry_slowmo_scale: 0.35,
            hit_slowmo_frames: 5,
            hit_slowmo_scale: 0.6,
            crit_chance: 0.10,
            crit_multiplier: 2.0,
            crit_slowmo_frames: 12,
            crit_slowmo_scale: 0.02,
            death_slowmo_scale: 0.20,
            screen_black_frames: 3,
        }
    }
}

/// Round lifecycle
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RoundConfig {
    /// Frames per "3", "2", "1" countdown step
    pub countdown_step_frames: u32,
    /// Frames the "FIGHT" banner shows before fighters unlock
    pub fight_banner_frames: u32,
    /// Round timeout (seconds)
    pub max_secs: f32,
    /// Frames spent in ROUND_ENDING before the reset
    pub reset_frames: u32,
    /// Match length (rounds, odd)
    pub best_of: u32,
}

impl Default for RoundConfig {
    fn default() -> Self {
        Self {
            countdown_step_frames: 45,
            fight_banner_frames: 30,
            max_secs: 45.0,
            reset_frames: 120,
            best_of: 3,
        }
    }
}

impl RoundConfig {
    pub fn max_frames(&self) -> u32 {
        secs_to_frames(self.max_secs)
    }
}

/// Inactivity escalation tiers
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EscalationConfig {
    /// Seconds without interaction before the arena pulse
    pub pulse_after_secs: f32,
    /// Further seconds before the arena starts shrinking
    pub shrink_after_secs: f32,
    /// Pixels per frame removed from each side while shrinking
    pub shrink_speed: f32,
    /// Velocity nudge toward the center on a pulse
    pub pulse_velocity_boost: f32,
    /// Speed multiplier applied after the pulse nudge
    pub pulse_speed_multiplier: f32,
    /// Seconds without interaction before a paused shrink resumes
    pub grace_secs: f32,
}

impl Default for EscalationConfig {
    fn default() -> Self {
        Self {
            pulse_after_secs: 3.0,
            shrink_after_secs: 1.5,
            shrink_speed: 0.3,
            pulse_velocity_boost: 4.0,
            pulse_speed_multiplier: 1.2,
            grace_secs: 2.0,
        }
    }
}

/// Chaos event cadence
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChaosConfig {
    pub min_interval_secs: f32,
    pub max_interval_secs: f32,
    pub duration_secs: f32,
}

impl Default for ChaosConfig {
    fn default() -> Self {
        Self {
            min_interval_secs: 3.0,
            max_interval_secs: 5.0,
            duration_secs: 5.0,
        }
    }
}

/// Skill orb spawning
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OrbConfig {
    pub spawn_min_secs: f32,
    pub spawn_max_secs: f32,
    pub max_orbs: usize,
    pub radius: f32,
    /// Orbs never spawn closer than this to a wall
    pub spawn_margin: f32,
    /// Chance an orb carries the ultimate skill
    pub ultimate_chance: f32,
}

impl Default for OrbConfig {
    fn default() -> Self {
        Self {
            spawn_min_secs: 2.0,
            spawn_max_secs: 4.0,
            max_orbs: 3,
            radius: 15.0,
            spawn_margin: 60.0,
            ultimate_chance: 0.1,
        }
    }
}

/// Ball-battle variant (seconds and pixels per second)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BallConfig {
    pub width: f32,
    pub height: f32,
    /// Ball count per team; team id is the index
    pub team_sizes: Vec<u32>,
    pub radius_range: (f32, f32),
    pub mass_range: (f32, f32),
    pub max_health: f32,
    pub gravity: f32,
    /// Velocity multiplier per second
    pub damping: f32,
    pub wall_elasticity: f32,
    pub ball_elasticity: f32,
    /// Contacts slower than this deal no damage
    pub min_impact_speed: f32,
    pub damage_multiplier: f32,
    pub knockback_force: f32,
    pub crit_chance: f32,
    pub crit_multiplier: f32,
    /// Slow motion starts when this many balls or fewer are alive
    pub slowmo_threshold: usize,
    pub slowmo_secs: f32,
    pub slowmo_factor: f32,
    pub trail_length: usize,
    pub spawn_margin: f32,
}

impl Default for BallConfig {
    fn default() -> Self {
        Self {
            width: 600.0,
            height: 1000.0,
            team_sizes: vec![5, 5],
            radius_range: (15.0, 30.0),
            mass_range: (1.0, 3.0),
            max_health: 100.0,
            gravity: 300.0,
            damping: 0.9,
            wall_elasticity: 0.8,
            ball_elasticity: 0.9,
            min_impact_speed: 50.0,
            damage_multiplier: 0.02,
            knockback_force: 40.0,
            crit_chance: 0.15,
            crit_multiplier: 2.0,
            slowmo_threshold: 2,
            slowmo_secs: 1.5,
            slowmo_factor: 0.3,
            trail_length: 10,
            spawn_margin: 100.0,
        }
    }
}

/// Complete battle configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BattleConfig {
    pub arena: ArenaConfig,
    pub physics: PhysicsConfig,
    pub fighter: FighterConfig,
    pub timing: TimingConfig,
    pub round: RoundConfig,
    pub escalation: EscalationConfig,
    pub chaos: ChaosConfig,
    pub orbs: OrbConfig,
    pub balls: BallConfig,

    // === Feature toggles ===
    /// Combat resolution (hits, parries, clashes, skill strikes)
    pub combat_enabled: bool,
    /// Random chaos events
    pub chaos_enabled: bool,
    /// Skill orb spawning
    pub orbs_enabled: bool,
    /// Inactivity escalation (pulse + shrink)
    pub escalation_enabled: bool,
}

impl Default for BattleConfig {
    fn default() -> Self {
        Self {
            arena: ArenaConfig::default(),
            physics: PhysicsConfig::default(),
            fighter: FighterConfig::default(),
            timing: TimingConfig::default(),
            round: RoundConfig::default(),
            escalation: EscalationConfig::default(),
            chaos: ChaosConfig::default(),
            orbs: OrbConfig::default(),
            balls: BallConfig::default(),
            combat_enabled: true,
            chaos_enabled: true,
            orbs_enabled: true,
            escalation_enabled: true,
        }
    }
}

impl BattleConfig {
    /// Movement only: no combat, chaos, orbs or escalation
    pub fn bounce_only() -> Self {
        Self {
            combat_enabled: false,
            chaos_enabled: false,
            orbs_enabled: false,
            escalation_enabled: false,
            ..Self::default()
        }
    }

    /// Parse and validate a JSON config (missing fields take defaults)
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        if let Err(err) = config.validate() {
            log::warn!("Rejected battle config: {err}");
            return Err(err);
        }
        Ok(config)
    }

    /// Read, parse and validate a JSON config file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_json_str(&json)?;
        log::info!("Loaded battle config from {}", path.display());
        Ok(config)
    }

    /// Reject configurations the simulation cannot honor
    pub fn validate(&self) -> Result<(), ConfigError> {
        let p = &self.physics;
        if p.min_speed > p.max_speed {
            return Err(ConfigError::SpeedRange {
                min: p.min_speed,
                max: p.max_speed,
            });
        }
        if !(p.bounce_energy > 0.0 && p.bounce_energy <= 1.0) {
            return Err(ConfigError::BounceEnergy(p.bounce_energy));
        }
        if p.max_speed <= 0.0 {
            return Err(ConfigError::NonPositive("physics.max_speed"));
        }

        let a = &self.arena;
        if a.min_size <= 0.0 {
            return Err(ConfigError::NonPositive("arena.min_size"));
        }
        if a.width < a.min_size || a.height < a.min_size {
            return Err(ConfigError::ArenaTooSmall {
                width: a.width,
                height: a.height,
                floor: a.min_size,
            });
        }

        let f = &self.fighter;
        if f.radius <= 0.0 {
            return Err(ConfigError::NonPositive("fighter.radius"));
        }
        if f.max_health <= 0.0 {
            return Err(ConfigError::NonPositive("fighter.max_health"));
        }

        if self.round.best_of == 0 {
            return Err(ConfigError::NonPositive("round.best_of"));
        }
        if self.chaos.min_interval_secs > self.chaos.max_interval_secs {
            return Err(ConfigError::InvertedRange {
                field: "chaos interval",
            });
        }
        if self.orbs.spawn_min_secs > self.orbs.spawn_max_secs {
            return Err(ConfigError::InvertedRange {
                field: "orbs spawn interval",
            });
        }

        for (name, value) in [
            ("timing.crit_chance", self.timing.crit_chance),
            ("orbs.ultimate_chance", self.orbs.ultimate_chance),
            ("balls.crit_chance", self.balls.crit_chance),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::Probability { name, value });
            }
        }

        let b = &self.balls;
        if b.team_sizes.iter().filter(|&&n| n > 0).count() < 2 {
            return Err(ConfigError::EmptyTeams);
        }
        for (field, (lo, hi)) in [
            ("balls.radius_range", b.radius_range),
            ("balls.mass_range", b.mass_range),
        ] {
            if lo <= 0.0 {
                return Err(ConfigError::NonPositive(field));
            }
            if lo > hi {
                return Err(ConfigError::InvertedRange { field });
            }
        }

        Ok(())
    }
}
