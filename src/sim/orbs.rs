//! Skill orb pickups
//!
//! Orbs appear at random points inside the arena. Touching one tries to start
//! the skill it carries; the orb stays put if the fighter can't use it yet.

use glam::Vec2;
use rand::Rng;
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};

use super::events::{BattleEvent, EffectKind, FrameOutput};
use super::geometry::Rect;
use super::skill::SkillKind;
use super::state::{Fighter, Side};
use crate::config::{FighterConfig, OrbConfig};
use crate::secs_to_frames;

/// A floating skill pickup
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillOrb {
    pub id: u32,
    pub pos: Vec2,
    pub kind: SkillKind,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrbField {
    /// Live orbs (sorted by id for determinism)
    pub orbs: Vec<SkillOrb>,
    /// Frames until the next spawn
    pub spawn_in: u32,
    next_id: u32,
}

impl OrbField {
    pub fn new(cfg: &OrbConfig, rng: &mut Pcg32) -> Self {
        Self {
            orbs: Vec::new(),
            spawn_in: roll_spawn(cfg, rng),
            next_id: 1,
        }
    }

    pub fn reset(&mut self, cfg: &OrbConfig, rng: &mut Pcg32) {
        self.orbs.clear();
        self.spawn_in = roll_spawn(cfg, rng);
    }

    /// Count down and spawn while below the cap
    pub fn update(
        &mut self,
        cfg: &OrbConfig,
        bounds: &Rect,
        rng: &mut Pcg32,
        out: &mut FrameOutput,
    ) {
        self.spawn_in = self.spawn_in.saturating_sub(1);
        if self.spawn_in > 0 {
            return;
        }
        self.spawn_in = roll_spawn(cfg, rng);
        if self.orbs.len() >= cfg.max_orbs {
            return;
        }

        let kind = if rng.random_bool(cfg.ultimate_chance as f64) {
            SkillKind::FinalFlashDraw
        } else {
            SkillKind::REGULAR[rng.random_range(0..SkillKind::REGULAR.len())]
        };
        let inner = bounds.inset(cfg.spawn_margin);
        let pos = if inner.width > 0.0 && inner.height > 0.0 {
            Vec2::new(
                rng.random_range(inner.left()..=inner.right()),
                rng.random_range(inner.top()..=inner.bottom()),
            )
        } else {
            bounds.center()
        };

        let id = self.next_id;
        self.next_id += 1;
        self.orbs.push(SkillOrb { id, pos, kind });
        out.event(BattleEvent::OrbSpawned { pos, kind });
    }

    /// Let fighters pick up orbs they overlap. An orb is consumed only if the
    /// skill actually starts.
    pub fn collect(
        &mut self,
        fighters: &mut [Fighter; 2],
        bounds: &Rect,
        orb_cfg: &OrbConfig,
        fighter_cfg: &FighterConfig,
        out: &mut FrameOutput,
    ) {
        let mut i = 0;
        while i < self.orbs.len() {
            let orb = &self.orbs[i];
            let mut taken = false;
            for side in Side::BOTH {
                let [blue, red] = &mut *fighters;
                let (user, opponent) = match side {
                    Side::Blue => (blue, &*red),
                    Side::Red => (red, &*blue),
                };
                if user.pos.distance(orb.pos) >= user.body_radius() + orb_cfg.radius {
                    continue;
                }
                if user.try_activate(orb.kind, opponent, bounds, fighter_cfg, out) {
                    out.event(BattleEvent::OrbCollected {
                        side,
                        kind: orb.kind,
                        pos: orb.pos,
                    });
                    out.effect(EffectKind::Burst, orb.pos, orb.kind.color(), 12.0);
                    taken = true;
                    break;
                }
            }
            if taken {
                self.orbs.remove(i);
            } else {
                i += 1;
            }
        }
    }
}

fn roll_spawn(cfg: &OrbConfig, rng: &mut Pcg32) -> u32 {
    let secs = if cfg.spawn_max_secs > cfg.spawn_min_secs {
        rng.random_range(cfg.spawn_min_secs..cfg.spawn_max_secs)
    } else {
        cfg.spawn_min_secs
    };
    secs_to_frames(secs)
}
