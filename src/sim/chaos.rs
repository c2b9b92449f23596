//! Chaos events
//!
//! At most one global modifier runs at a time. Every few seconds the manager
//! draws a new event, never the one that just ran.

use std::collections::VecDeque;
use std::f32::consts::TAU;

use glam::Vec2;
use rand::Rng;
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};

use super::events::{BattleEvent, EffectKind, FrameOutput, HitSource, SoundCue, palette};
use super::geometry::Rect;
use super::state::{DamageResult, Fighter, Side};
use crate::config::{BattleConfig, ChaosConfig};
use crate::{consts::FPS, direction, secs_to_frames};

const HYPER_SPEED: f32 = 3.0;
const TINY_SIZE: f32 = 0.5;
const TINY_DAMAGE: f32 = 1.5;
const CRUSHER_RATE: f32 = 0.3;
const CRUSHER_FLOOR: f32 = 0.5;
const BREATH_BASE: f32 = 0.85;
const BREATH_AMPLITUDE: f32 = 0.25;
const DISCO_HUE_STEP: f32 = 6.0;
const TRON_SAMPLE_EVERY: u32 = 3;
const TRON_MAX_POINTS: usize = 100;
const TRON_DAMAGE: f32 = 10.0;
const GLITCH_EVERY: u32 = 30;
const GLITCH_CHANCE: f64 = 0.3;
const GLITCH_DISTANCE: f32 = 50.0;
const ULTRA_KNOCKBACK: f32 = 5.0;
const SAFETY_NUDGE: f32 = 4.0;

/// Closed set of global modifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChaosEvent {
    HyperSpeed,
    TinyTerror,
    DiscoFever,
    TheCrusher,
    Blackout,
    TronMode,
    GlitchTrap,
    BreathingRoom,
    MovingWalls,
    UltraKnockback,
}

impl ChaosEvent {
    pub const ALL: [ChaosEvent; 10] = [
        ChaosEvent::HyperSpeed,
        ChaosEvent::TinyTerror,
        ChaosEvent::DiscoFever,
        ChaosEvent::TheCrusher,
        ChaosEvent::Blackout,
        ChaosEvent::TronMode,
        ChaosEvent::GlitchTrap,
        ChaosEvent::BreathingRoom,
        ChaosEvent::MovingWalls,
        ChaosEvent::UltraKnockback,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ChaosEvent::HyperSpeed => "HYPER SPEED",
            ChaosEvent::TinyTerror => "TINY TERROR",
            ChaosEvent::DiscoFever => "DISCO FEVER",
            ChaosEvent::TheCrusher => "THE CRUSHER",
            ChaosEvent::Blackout => "BLACKOUT",
            ChaosEvent::TronMode => "TRON MODE",
            ChaosEvent::GlitchTrap => "GLITCH TRAP",
            ChaosEvent::BreathingRoom => "BREATHING ROOM",
            ChaosEvent::MovingWalls => "MOVING WALLS",
            ChaosEvent::UltraKnockback => "ULTRA KNOCKBACK",
        }
    }
}

/// Render color forced on the fighters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ColorOverride {
    /// Cycling hue in degrees
    Rainbow { hue: f32 },
    Black,
    Neon,
}

/// Multipliers the rest of the simulation reads each tick
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChaosModifiers {
    /// Integration step multiplier
    pub speed: f32,
    /// Body radius multiplier (sword reach untouched)
    pub size: f32,
    pub damage: f32,
    /// Fraction of damage dealt returned as health
    pub life_steal: f32,
    pub knockback: f32,
    pub arena_scale: f32,
    pub color: Option<ColorOverride>,
}

impl Default for ChaosModifiers {
    fn default() -> Self {
        Self {
            speed: 1.0,
            size: 1.0,
            damage: 1.0,
            life_steal: 0.0,
            knockback: 1.0,
            arena_scale: 1.0,
            color: None,
        }
    }
}

/// Interior wall sweeping between the side walls
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MovingWall {
    pub x: f32,
    /// +1 moving right, -1 moving left
    pub dir: f32,
}

impl MovingWall {
    pub const WIDTH: f32 = 12.0;
    pub const SPEED: f32 = 4.0;
    const PUSH: f32 = 8.0;
    const KICK: f32 = 5.0;

    fn step(&mut self, bounds: &Rect) {
        let half = Self::WIDTH / 2.0;
        self.x += self.dir * Self::SPEED;
        if self.x - half <= bounds.left() {
            self.x = bounds.left() + half;
            self.dir = 1.0;
        } else if self.x + half >= bounds.right() {
            self.x = bounds.right() - half;
            self.dir = -1.0;
        }
    }

    fn push(&self, fighter: &mut Fighter) {
        if (fighter.pos.x - self.x).abs() < fighter.body_radius() + Self::WIDTH / 2.0 {
            fighter.pos.x += self.dir * Self::PUSH;
            fighter.vel.x = self.dir * fighter.vel.x.abs() * 0.5 + self.dir * Self::KICK;
        }
    }
}

/// Global chaos event scheduler
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChaosManager {
    pub active: Option<ChaosEvent>,
    /// Most recent event, excluded from the next draw
    pub last: Option<ChaosEvent>,
    pub frames_left: u32,
    /// Frames until the next event starts
    pub next_in: u32,
    /// Frames since the active event started
    pub elapsed: u32,
    pub crusher_scale: f32,
    pub breath_phase: f32,
    pub hue: f32,
    /// Light trails per side (TronMode)
    pub trails: [VecDeque<Vec2>; 2],
    pub wall: Option<MovingWall>,
}

impl ChaosManager {
    pub fn new(cfg: &ChaosConfig, rng: &mut Pcg32) -> Self {
        Self {
            active: None,
            last: None,
            frames_left: 0,
            next_in: roll_interval(cfg, rng),
            elapsed: 0,
            crusher_scale: 1.0,
            breath_phase: 0.0,
            hue: 0.0,
            trails: Default::default(),
            wall: None,
        }
    }

    /// Drop the running event without announcing it and re-roll the timer
    pub fn reset(&mut self, cfg: &ChaosConfig, rng: &mut Pcg32) {
        let last = self.last;
        *self = Self::new(cfg, rng);
        self.last = last;
    }

    /// Uniform draw excluding the previous event
    pub fn pick(&self, rng: &mut Pcg32) -> ChaosEvent {
        let candidates: Vec<ChaosEvent> = ChaosEvent::ALL
            .into_iter()
            .filter(|&e| Some(e) != self.last)
            .collect();
        candidates[rng.random_range(0..candidates.len())]
    }

    pub fn modifiers(&self) -> ChaosModifiers {
        let neutral = ChaosModifiers::default();
        match self.active {
            None => neutral,
            Some(ChaosEvent::HyperSpeed) => ChaosModifiers {
                speed: HYPER_SPEED,
                ..neutral
            },
            Some(ChaosEvent::TinyTerror) => ChaosModifiers {
                size: TINY_SIZE,
                damage: TINY_DAMAGE,
                ..neutral
            },
            Some(ChaosEvent::DiscoFever) => ChaosModifiers {
                life_steal: 1.0,
                color: Some(ColorOverride::Rainbow { hue: self.hue }),
                ..neutral
            },
            Some(ChaosEvent::TheCrusher) => ChaosModifiers {
                arena_scale: self.crusher_scale,
                ..neutral
            },
            Some(ChaosEvent::Blackout) => ChaosModifiers {
                color: Some(ColorOverride::Black),
                ..neutral
            },
            Some(ChaosEvent::TronMode) => ChaosModifiers {
                color: Some(ColorOverride::Neon),
                ..neutral
            },
            Some(ChaosEvent::BreathingRoom) => ChaosModifiers {
                arena_scale: (BREATH_BASE + BREATH_AMPLITUDE * self.breath_phase.sin()).min(1.0),
                ..neutral
            },
            Some(ChaosEvent::UltraKnockback) => ChaosModifiers {
                knockback: ULTRA_KNOCKBACK,
                ..neutral
            },
            Some(ChaosEvent::GlitchTrap) | Some(ChaosEvent::MovingWalls) => neutral,
        }
    }

    /// Start `event`, replacing anything running
    pub fn start(
        &mut self,
        event: ChaosEvent,
        cfg: &ChaosConfig,
        bounds: &Rect,
        fighters: &mut [Fighter; 2],
        rng: &mut Pcg32,
        out: &mut FrameOutput,
    ) {
        if self.active.is_some() {
            self.end(cfg, rng, out);
        }
        self.active = Some(event);
        self.last = Some(event);
        self.frames_left = secs_to_frames(cfg.duration_secs);
        self.elapsed = 0;
        self.crusher_scale = 1.0;
        self.breath_phase = 0.0;
        self.trails = Default::default();
        self.wall = None;

        match event {
            ChaosEvent::TheCrusher | ChaosEvent::BreathingRoom => {
                let center = bounds.center();
                for f in fighters.iter_mut().filter(|f| !f.is_immobile()) {
                    f.vel += (center - f.pos).normalize_or_zero() * SAFETY_NUDGE;
                }
            }
            ChaosEvent::MovingWalls => {
                let dir = if rng.random_bool(0.5) { 1.0 } else { -1.0 };
                self.wall = Some(MovingWall {
                    x: bounds.center().x,
                    dir,
                });
            }
            _ => {}
        }

        log::info!("Chaos event: {}", event.name());
        out.event(BattleEvent::ChaosStarted { event });
        out.sound(SoundCue::ChaosSting);
    }

    /// End the running event and schedule the next one
    pub fn end(&mut self, cfg: &ChaosConfig, rng: &mut Pcg32, out: &mut FrameOutput) {
        if let Some(event) = self.active.take() {
            log::debug!("Chaos event over: {}", event.name());
            out.event(BattleEvent::ChaosEnded { event });
        }
        self.frames_left = 0;
        self.wall = None;
        self.trails = Default::default();
        self.next_in = roll_interval(cfg, rng);
    }

    /// One frame: run the active event's hooks or count down to the next one.
    /// `bounds` are the effective arena bounds for this frame.
    pub fn update(
        &mut self,
        fighters: &mut [Fighter; 2],
        bounds: &Rect,
        cfg: &BattleConfig,
        rng: &mut Pcg32,
        out: &mut FrameOutput,
    ) {
        let Some(event) = self.active else {
            self.next_in = self.next_in.saturating_sub(1);
            if self.next_in == 0 {
                let event = self.pick(rng);
                self.start(event, &cfg.chaos, bounds, fighters, rng, out);
            }
            return;
        };

        self.elapsed += 1;
        let dt = 1.0 / FPS as f32;
        match event {
            ChaosEvent::TheCrusher => {
                self.crusher_scale = (self.crusher_scale - CRUSHER_RATE * dt).max(CRUSHER_FLOOR);
            }
            ChaosEvent::BreathingRoom => {
                self.breath_phase = (self.breath_phase + dt * TAU) % TAU;
            }
            ChaosEvent::DiscoFever => {
                self.hue = (self.hue + DISCO_HUE_STEP) % 360.0;
            }
            ChaosEvent::TronMode => self.tron(fighters, cfg, out),
            ChaosEvent::GlitchTrap => {
                if self.elapsed % GLITCH_EVERY == 0 {
                    glitch(fighters, bounds, rng, out);
                }
            }
            ChaosEvent::MovingWalls => {
                if let Some(wall) = self.wall.as_mut() {
                    wall.step(bounds);
                    for f in fighters.iter_mut().filter(|f| !f.is_immobile()) {
                        wall.push(f);
                    }
                }
            }
            _ => {}
        }

        self.frames_left = self.frames_left.saturating_sub(1);
        if self.frames_left == 0 {
            self.end(&cfg.chaos, rng, out);
        }
    }

    /// Sample trails and burn anyone touching the opponent's trail
    fn tron(&mut self, fighters: &mut [Fighter; 2], cfg: &BattleConfig, out: &mut FrameOutput) {
        if self.elapsed % TRON_SAMPLE_EVERY == 0 {
            for (trail, f) in self.trails.iter_mut().zip(fighters.iter()) {
                trail.push_back(f.pos);
                if trail.len() > TRON_MAX_POINTS {
                    trail.pop_front();
                }
            }
        }

        for side in Side::BOTH {
            let trail = &self.trails[side.opponent().index()];
            let victim = &mut fighters[side.index()];
            if !victim.is_alive() {
                continue;
            }
            let r = victim.body_radius();
            let Some(&point) = trail.iter().find(|p| p.distance(victim.pos) < r) else {
                continue;
            };
            let result =
                victim.take_damage(TRON_DAMAGE, Vec2::ZERO, cfg.fighter.invincibility_frames);
            if let DamageResult::Damaged { amount } = result {
                out.event(BattleEvent::Hit {
                    attacker: side.opponent(),
                    defender: side,
                    pos: point,
                    damage: amount,
                    critical: false,
                    source: HitSource::Trail,
                });
                out.effect(EffectKind::Sparks, point, palette::NEON_BLUE, 6.0);
            }
        }
    }
}

fn glitch(fighters: &mut [Fighter; 2], bounds: &Rect, rng: &mut Pcg32, out: &mut FrameOutput) {
    for f in fighters.iter_mut() {
        if f.is_immobile() || !rng.random_bool(GLITCH_CHANCE) {
            continue;
        }
        let from = f.pos;
        let angle = rng.random_range(0.0..TAU);
        f.pos = bounds.clamp_circle(from + direction(angle) * GLITCH_DISTANCE, f.body_radius());
        out.event(BattleEvent::GlitchTeleport {
            side: f.side,
            from,
            to: f.pos,
        });
        out.effect(EffectKind::Burst, f.pos, palette::GREEN, 10.0);
    }
}

fn roll_interval(cfg: &ChaosConfig, rng: &mut Pcg32) -> u32 {
    let secs = if cfg.max_interval_secs > cfg.min_interval_secs {
        rng.random_range(cfg.min_interval_secs..cfg.max_interval_secs)
    } else {
        cfg.min_interval_secs
    };
    secs_to_frames(secs)
}
