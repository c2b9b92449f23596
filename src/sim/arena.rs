//! Arena bounds manager
//!
//! Two independent shrink sources act on one rectangle: a periodic shrink on
//! a fixed timer, and inactivity escalation (pulse, then a slow continuous
//! shrink that pauses whenever the fighters interact).

use serde::{Deserialize, Serialize};

use super::events::{BattleEvent, EffectKind, FrameOutput, SoundCue, palette};
use super::geometry::Rect;
use super::state::Fighter;
use crate::config::{ArenaConfig, BattleConfig};
use crate::secs_to_frames;

/// Inactivity escalation tiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EscalationTier {
    Normal,
    /// Fighters were nudged toward the center
    PulseTriggered,
    /// Arena closing in every frame
    Shrinking,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArenaBounds {
    /// Bounds at round start
    pub initial: Rect,
    /// Current bounds before chaos scaling
    pub rect: Rect,
    /// Frames since the last periodic shrink
    pub shrink_timer: u32,
    pub tier: EscalationTier,
    /// Frames since the last interaction
    pub idle_frames: u32,
    /// Frames spent in the current tier
    pub tier_frames: u32,
    /// Continuous shrink on hold until the grace period passes
    pub paused: bool,
}

impl ArenaBounds {
    pub fn new(cfg: &ArenaConfig) -> Self {
        let rect = cfg.rect();
        Self {
            initial: rect,
            rect,
            shrink_timer: 0,
            tier: EscalationTier::Normal,
            idle_frames: 0,
            tier_frames: 0,
            paused: false,
        }
    }

    pub fn reset(&mut self) {
        let initial = self.initial;
        *self = Self {
            initial,
            rect: initial,
            shrink_timer: 0,
            tier: EscalationTier::Normal,
            idle_frames: 0,
            tier_frames: 0,
            paused: false,
        };
    }

    /// Current bounds scaled about the center, floored at `min_size`
    pub fn effective(&self, scale: f32, min_size: f32) -> Rect {
        if scale == 1.0 {
            return self.rect;
        }
        self.rect.scaled(scale, min_size)
    }

    /// A hit, parry, clash or block happened
    pub fn register_interaction(&mut self) {
        self.idle_frames = 0;
        match self.tier {
            EscalationTier::Normal => {}
            EscalationTier::PulseTriggered => self.set_tier(EscalationTier::Normal),
            EscalationTier::Shrinking => self.paused = true,
        }
    }

    fn set_tier(&mut self, tier: EscalationTier) {
        if self.tier != tier {
            log::debug!("Arena escalation: {:?} -> {:?}", self.tier, tier);
        }
        self.tier = tier;
        self.tier_frames = 0;
        self.paused = false;
    }

    /// One frame of periodic shrink and escalation
    pub fn update(
        &mut self,
        fighters: &mut [Fighter; 2],
        cfg: &BattleConfig,
        out: &mut FrameOutput,
    ) {
        self.periodic_shrink(&cfg.arena, out);
        self.escalate(fighters, cfg, out);
    }

    fn periodic_shrink(&mut self, cfg: &ArenaConfig, out: &mut FrameOutput) {
        self.shrink_timer += 1;
        if self.shrink_timer < secs_to_frames(cfg.shrink_interval_secs) {
            return;
        }
        self.shrink_timer = 0;
        let floor = cfg.periodic_shrink_floor;
        if self.rect.width > floor && self.rect.height > floor {
            self.rect = shrink(&self.rect, cfg.shrink_amount, cfg.min_size);
            log::debug!("Arena shrinks to {:.0}x{:.0}", self.rect.width, self.rect.height);
            out.event(BattleEvent::ArenaShrink { bounds: self.rect });
        }
    }

    fn escalate(&mut self, fighters: &mut [Fighter; 2], cfg: &BattleConfig, out: &mut FrameOutput) {
        let esc = &cfg.escalation;
        self.idle_frames += 1;
        self.tier_frames += 1;

        match self.tier {
            EscalationTier::Normal => {
                if self.idle_frames >= secs_to_frames(esc.pulse_after_secs) {
                    self.pulse(fighters, cfg, out);
                    self.set_tier(EscalationTier::PulseTriggered);
                    out.event(BattleEvent::EscalationChanged { tier: self.tier });
                }
            }
            EscalationTier::PulseTriggered => {
                if self.tier_frames >= secs_to_frames(esc.shrink_after_secs) {
                    log::info!("Arena closing in");
                    self.set_tier(EscalationTier::Shrinking);
                    out.event(BattleEvent::EscalationChanged { tier: self.tier });
                }
            }
            EscalationTier::Shrinking => {
                if self.paused {
                    if self.idle_frames >= secs_to_frames(esc.grace_secs) {
                        self.paused = false;
                    }
                    return;
                }
                let floor = cfg.arena.min_size;
                if self.rect.width > floor && self.rect.height > floor {
                    self.rect = shrink(&self.rect, esc.shrink_speed, floor);
                }
            }
        }
    }

    /// Nudge both fighters toward the center and speed them up
    fn pulse(&self, fighters: &mut [Fighter; 2], cfg: &BattleConfig, out: &mut FrameOutput) {
        let center = self.rect.center();
        for f in fighters.iter_mut().filter(|f| !f.is_immobile()) {
            f.vel += (center - f.pos).normalize_or_zero() * cfg.escalation.pulse_velocity_boost;
            f.vel *= cfg.escalation.pulse_speed_multiplier;
        }
        out.event(BattleEvent::ArenaPulse { bounds: self.rect });
        out.effect(EffectKind::ArenaPulse, center, palette::WHITE, self.rect.width);
        out.sound(SoundCue::Pulse);
    }
}

/// Move every side inward by `amount`, keeping the center and the floor
fn shrink(rect: &Rect, amount: f32, floor: f32) -> Rect {
    let c = rect.center();
    let w = (rect.width - amount * 2.0).max(floor);
    let h = (rect.height - amount * 2.0).max(floor);
    Rect::new(c.x - w / 2.0, c.y - h / 2.0, w, h)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::state::Side;
    use glam::Vec2;

    fn setup() -> (ArenaBounds, [Fighter; 2], BattleConfig) {
        let cfg = BattleConfig::default();
        let mut fighters = [Fighter::new(Side::Blue, &cfg), Fighter::new(Side::Red, &cfg)];
        for f in &mut fighters {
            f.locked = false;
        }
        (ArenaBounds::new(&cfg.arena), fighters, cfg)
    }

    #[test]
    fn test_periodic_shrink_every_interval() {
        let (mut arena, mut fighters, mut cfg) = setup();
        cfg.escalation.pulse_after_secs = 1_000.0;
        let mut out = FrameOutput::default();
        for _ in 0..600 {
            arena.update(&mut fighters, &cfg, &mut out);
        }
        assert_eq!(arena.rect.width, 476.0);
        assert_eq!(arena.rect.x, 62.0);
    }

    #[test]
    fn test_periodic_shrink_stops_at_floor() {
        let (mut arena, mut fighters, mut cfg) = setup();
        cfg.escalation.pulse_after_secs = 1_000_000.0;
        let mut out = FrameOutput::default();
        for _ in 0..600 * 30 {
            arena.update(&mut fighters, &cfg, &mut out);
            arena.idle_frames = 0;
        }
        assert!(arena.rect.width <= 300.0);
        assert!(arena.rect.width > 300.0 - 24.0);
    }

    #[test]
    fn test_escalation_pulse_then_shrink() {
        let (mut arena, mut fighters, cfg) = setup();
        let mut out = FrameOutput::default();
        fighters[0].vel = Vec2::new(0.0, 10.0);
        for _ in 0..180 {
            arena.update(&mut fighters, &cfg, &mut out);
        }
        assert_eq!(arena.tier, EscalationTier::PulseTriggered);
        // Pulled toward the center (blue spawns left of it)
        assert!(fighters[0].vel.x > 0.0);
        assert!(out.events.iter().any(|e| matches!(e, BattleEvent::ArenaPulse { .. })));

        for _ in 0..90 {
            arena.update(&mut fighters, &cfg, &mut out);
        }
        assert_eq!(arena.tier, EscalationTier::Shrinking);
        let before = arena.rect.width;
        arena.update(&mut fighters, &cfg, &mut out);
        assert!((before - arena.rect.width - 0.6).abs() < 1e-3);
    }

    #[test]
    fn test_interaction_pauses_shrink_until_grace() {
        let (mut arena, mut fighters, cfg) = setup();
        let mut out = FrameOutput::default();
        arena.tier = EscalationTier::Shrinking;
        arena.register_interaction();
        assert!(arena.paused);
        let width = arena.rect.width;
        for _ in 0..119 {
            arena.update(&mut fighters, &cfg, &mut out);
        }
        assert_eq!(arena.rect.width, width);
        arena.update(&mut fighters, &cfg, &mut out);
        arena.update(&mut fighters, &cfg, &mut out);
        assert!(arena.rect.width < width);
    }

    #[test]
    fn test_interaction_during_pulse_resets_to_normal() {
        let (mut arena, _, _) = setup();
        arena.tier = EscalationTier::PulseTriggered;
        arena.register_interaction();
        assert_eq!(arena.tier, EscalationTier::Normal);
    }

    #[test]
    fn test_continuous_shrink_respects_floor() {
        let (mut arena, mut fighters, cfg) = setup();
        let mut out = FrameOutput::default();
        arena.tier = EscalationTier::Shrinking;
        for _ in 0..10_000 {
            arena.update(&mut fighters, &cfg, &mut out);
        }
        assert_eq!(arena.rect.width, cfg.arena.min_size);
        assert_eq!(arena.rect.height, cfg.arena.min_size);
    }

    #[test]
    fn test_effective_bounds_floor() {
        let (arena, _, cfg) = setup();
        let rect = arena.effective(0.1, cfg.arena.min_size);
        assert_eq!(rect.width, 250.0);
        assert_eq!(arena.effective(1.0, 250.0), arena.rect);
    }
}
