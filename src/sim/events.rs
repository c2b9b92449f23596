//! Per-tick event records and feedback requests
//!
//! The simulation never renders or plays audio. Each tick it records what
//! happened plus the effects and sounds it wants, and consumers read them
//! before the next tick clears them.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use super::arena::EscalationTier;
use super::chaos::ChaosEvent;
use super::geometry::Rect;
use super::skill::SkillKind;
use super::state::{RoundEndReason, RoundOutcome, Side};

/// RGB color
pub type Rgb = [u8; 3];

pub mod palette {
    use super::Rgb;

    pub const WHITE: Rgb = [255, 255, 255];
    pub const BLACK: Rgb = [0, 0, 0];
    pub const BLUE: Rgb = [50, 150, 255];
    pub const RED: Rgb = [255, 80, 80];
    pub const YELLOW: Rgb = [255, 220, 100];
    pub const GREEN: Rgb = [100, 255, 150];
    pub const PURPLE: Rgb = [200, 100, 255];
    pub const CYAN: Rgb = [100, 255, 255];
    pub const ORANGE: Rgb = [255, 180, 80];
    pub const GOLD: Rgb = [255, 215, 0];
    pub const PINK: Rgb = [255, 100, 200];
    pub const NEON_BLUE: Rgb = [0, 240, 255];
    pub const NEON_RED: Rgb = [255, 0, 60];
}

/// What dealt a hit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HitSource {
    Sword,
    Skill(SkillKind),
    /// Opponent's light trail during TronMode
    Trail,
}

/// Something that happened this tick
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum BattleEvent {
    SkillActivated { side: Side, kind: SkillKind },
    SkillEnded { side: Side, kind: SkillKind, cancelled: bool },
    Hit {
        attacker: Side,
        defender: Side,
        pos: Vec2,
        damage: f32,
        critical: bool,
        source: HitSource,
    },
    /// Shield consumed; `parried` when its parry window was still open
    ShieldBlock { defender: Side, pos: Vec2, parried: bool },
    /// Both blades met
    SwordParry { pos: Vec2 },
    /// SpinParry window caught the attacker's blade
    SkillParry { defender: Side, attacker: Side, pos: Vec2 },
    Clash {
        wielder: Side,
        skill_user: Side,
        skill: SkillKind,
        pos: Vec2,
    },
    /// A frame-exact skill damage check fired
    SkillStrike {
        side: Side,
        kind: SkillKind,
        pos: Vec2,
        landed: bool,
    },
    LifeSteal { side: Side, amount: f32 },
    GlitchTeleport { side: Side, from: Vec2, to: Vec2 },
    ArenaPulse { bounds: Rect },
    ArenaShrink { bounds: Rect },
    EscalationChanged { tier: EscalationTier },
    ChaosStarted { event: ChaosEvent },
    ChaosEnded { event: ChaosEvent },
    OrbSpawned { pos: Vec2, kind: SkillKind },
    OrbCollected { side: Side, kind: SkillKind, pos: Vec2 },
    Death { side: Side, pos: Vec2 },
    RoundStarted { round: u32 },
    RoundEnded {
        outcome: RoundOutcome,
        reason: RoundEndReason,
    },
    MatchEnded { winner: Side },
    BallCollision {
        pos: Vec2,
        impact: f32,
        a: u32,
        b: u32,
        critical: bool,
    },
    BallDeath {
        id: u32,
        team: u8,
        pos: Vec2,
        vel: Vec2,
        radius: f32,
    },
}

/// Visual effect kinds the renderer knows how to draw
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EffectKind {
    Burst,
    Sparks,
    Ring,
    Shockwave,
    Trail,
    CrossSlash,
    Explosion,
    DamageNumber,
    ScreenShake,
    ScreenBlack,
    ArenaPulse,
}

/// Fire-and-forget request to spawn a visual effect
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EffectRequest {
    pub kind: EffectKind,
    pub pos: Vec2,
    pub color: Rgb,
    /// Kind-specific size: particle count, radius, damage value, frames
    pub magnitude: f32,
}

/// Sound cues
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SoundCue {
    /// Blade or body hit
    Hit { critical: bool },
    /// Metal on metal (parry, clash)
    Clang,
    /// Shield absorbed a hit
    Block,
    /// Skill started
    Whoosh,
    /// Fighter or ball died
    Explosion,
    /// Arena pulse
    Pulse,
    /// Chaos event started
    ChaosSting,
    /// Countdown tick ("3", "2", "1")
    Countdown,
    /// "FIGHT"
    Fight,
}

/// Consumer of a tick's output (renderer, audio, camera)
pub trait FeedbackSink {
    fn spawn_effect(&mut self, effect: &EffectRequest);
    fn play_sound(&mut self, sound: SoundCue);
    fn on_event(&mut self, _event: &BattleEvent) {}
}

/// Everything one tick produced
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FrameOutput {
    pub events: Vec<BattleEvent>,
    pub effects: Vec<EffectRequest>,
    pub sounds: Vec<SoundCue>,
}

impl FrameOutput {
    pub fn clear(&mut self) {
        self.events.clear();
        self.effects.clear();
        self.sounds.clear();
    }

    pub fn event(&mut self, event: BattleEvent) {
        self.events.push(event);
    }

    pub fn effect(&mut self, kind: EffectKind, pos: Vec2, color: Rgb, magnitude: f32) {
        self.effects.push(EffectRequest {
            kind,
            pos,
            color,
            magnitude,
        });
    }

    pub fn sound(&mut self, sound: SoundCue) {
        self.sounds.push(sound);
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty() && self.effects.is_empty() && self.sounds.is_empty()
    }

    /// Forward this frame's output to a consumer
    pub fn dispatch(&self, sink: &mut impl FeedbackSink) {
        for event in &self.events {
            sink.on_event(event);
        }
        for effect in &self.effects {
            sink.spawn_effect(effect);
        }
        for &sound in &self.sounds {
            sink.play_sound(sound);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recorder {
        effects: usize,
        sounds: Vec<SoundCue>,
        events: usize,
    }

    impl FeedbackSink for Recorder {
        fn spawn_effect(&mut self, _effect: &EffectRequest) {
            self.effects += 1;
        }

        fn play_sound(&mut self, sound: SoundCue) {
            self.sounds.push(sound);
        }

        fn on_event(&mut self, _event: &BattleEvent) {
            self.events += 1;
        }
    }

    #[test]
    fn test_dispatch_forwards_everything() {
        let mut out = FrameOutput::default();
        out.event(BattleEvent::SwordParry { pos: Vec2::ZERO });
        out.effect(EffectKind::Sparks, Vec2::ZERO, palette::WHITE, 8.0);
        out.sound(SoundCue::Clang);

        let mut sink = Recorder::default();
        out.dispatch(&mut sink);
        assert_eq!(sink.events, 1);
        assert_eq!(sink.effects, 1);
        assert_eq!(sink.sounds, vec![SoundCue::Clang]);

        out.clear();
        assert!(out.is_empty());
    }
}
