//! Skill catalogue and per-skill state machines
//!
//! A fighter carries at most one [`ActiveSkill`]. Each variant owns exactly the
//! scratch data its phases need and advances one frame per [`update_fighter`]
//! call. Frame-exact damage is not applied here: the skill hands a
//! [`SkillStrike`] to the combat resolver for the same tick.

use std::collections::VecDeque;
use std::f32::consts::PI;

use glam::Vec2;
use rand::Rng;
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};

use super::events::{BattleEvent, EffectKind, FrameOutput, Rgb, SoundCue, palette};
use super::geometry::{Rect, Segment};
use super::state::{Fighter, Side};
use crate::config::{BattleConfig, PhysicsConfig};
use crate::consts::{SWORD_TRACKING, TRAIL_LENGTH};
use crate::{angle_between, angle_delta, direction, normalize_angle};

// Dash slash
const DASH_FRAMES: u32 = 15;
const DASH_SPEED: f32 = 28.0;
const DASH_KNOCKBACK: f32 = 1.8;
const DASH_HIT_STOP: u32 = 4;
/// Largest deflection a clash applies, either way
const DASH_DEFLECT: f32 = 0.8;

// Spin parry
const SPIN_FRAMES: u32 = 40;
const SPIN_RATE: f32 = 0.6;
const SPIN_KNOCKBACK: f32 = 1.3;
pub const SPIN_PARRY_WINDOW: u32 = 30;
pub const SPIN_PARRY_RADIUS: f32 = 55.0;
pub const SPIN_PUNISH_KNOCKBACK: f32 = 15.0;
pub const SPIN_PUNISH_COOLDOWN: u32 = 30;
const SPIN_FAILED_RECOVERY: u32 = 20;

// Ground slam
const SLAM_FRAMES: u32 = 35;
const SLAM_RISE_UNTIL: u32 = 12;
const SLAM_FALL_UNTIL: u32 = 22;
pub const SLAM_IMPACT_FRAME: u32 = 23;
const SLAM_RISE_SPEED: f32 = -8.0;
const SLAM_FALL_SPEED: f32 = 12.0;
const SLAM_RADIUS: f32 = 130.0;
const SLAM_DAMAGE: f32 = 1.5;
const SLAM_KNOCKBACK: f32 = 18.0;
const SLAM_HIT_STOP: u32 = 5;

pub const SHIELD_PARRY_WINDOW: u32 = 20;

// Phantom cross
const PHANTOM_FRAMES: u32 = 25;
const PHANTOM_OFFSET: f32 = 50.0;
const PHANTOM_SLASH_FRAME: u32 = 8;
const PHANTOM_STRIKE_FRAME: u32 = 12;
const PHANTOM_RADIUS: f32 = 80.0;
const PHANTOM_DAMAGE: f32 = 1.8;
const PHANTOM_KNOCKBACK: f32 = 15.0;
const PHANTOM_HIT_STOP: u32 = 5;

// Blade cyclone
const CYCLONE_FRAMES: u32 = 60;
const CYCLONE_TRACKING: f32 = 0.15;
const CYCLONE_SPIN: f32 = 0.8;
const CYCLONE_PULL_RADIUS: f32 = 100.0;
const CYCLONE_LIFT: f32 = 0.5;
const CYCLONE_PULL: f32 = 1.5;
const CYCLONE_RELEASE_RADIUS: f32 = 120.0;
const CYCLONE_RELEASE_PUSH: f32 = 12.0;
const CYCLONE_CLASH_PUSH: f32 = 8.0;
const CYCLONE_DAMAGE: f32 = 0.6;
const CYCLONE_KNOCKBACK: f32 = 0.5;
const CYCLONE_HIT_STOP: u32 = 2;
const CYCLONE_HIT_INTERVAL: u32 = 8;

// Final flash draw
const FLASH_FRAMES: u32 = 45;
const FLASH_SHEATH_UNTIL: u32 = 20;
const FLASH_PAUSE_UNTIL: u32 = 28;
pub const FLASH_RELEASE_FRAME: u32 = 30;
const FLASH_MULTIPLIER: f32 = 2.5;
const FLASH_HIT_STOP: u32 = 8;

/// Speed fraction kept while spinning or channeling a cyclone
const SLOWED_SPEED: f32 = 0.3;

/// Every skill a fighter can use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SkillKind {
    DashSlash,
    SpinParry,
    GroundSlam,
    Shield,
    PhantomCross,
    BladeCyclone,
    FinalFlashDraw,
}

impl SkillKind {
    pub const ALL: [SkillKind; 7] = [
        SkillKind::DashSlash,
        SkillKind::SpinParry,
        SkillKind::GroundSlam,
        SkillKind::Shield,
        SkillKind::PhantomCross,
        SkillKind::BladeCyclone,
        SkillKind::FinalFlashDraw,
    ];

    /// Everything except the ultimate
    pub const REGULAR: [SkillKind; 6] = [
        SkillKind::DashSlash,
        SkillKind::SpinParry,
        SkillKind::GroundSlam,
        SkillKind::Shield,
        SkillKind::PhantomCross,
        SkillKind::BladeCyclone,
    ];

    pub fn name(self) -> &'static str {
        match self {
            SkillKind::DashSlash => "Dash Slash",
            SkillKind::SpinParry => "Spin Parry",
            SkillKind::GroundSlam => "Ground Slam",
            SkillKind::Shield => "Shield",
            SkillKind::PhantomCross => "Phantom Cross",
            SkillKind::BladeCyclone => "Blade Cyclone",
            SkillKind::FinalFlashDraw => "Final Flash Draw",
        }
    }

    /// Frames the skill stays active (0 for instant skills)
    pub fn duration(self) -> u32 {
        match self {
            SkillKind::DashSlash => DASH_FRAMES,
            SkillKind::SpinParry => SPIN_FRAMES,
            SkillKind::GroundSlam => SLAM_FRAMES,
            SkillKind::Shield => 0,
            SkillKind::PhantomCross => PHANTOM_FRAMES,
            SkillKind::BladeCyclone => CYCLONE_FRAMES,
            SkillKind::FinalFlashDraw => FLASH_FRAMES,
        }
    }

    /// Whether a basic strike landing on the user triggers a clash
    pub fn is_clashable(self) -> bool {
        matches!(
            self,
            SkillKind::DashSlash
                | SkillKind::GroundSlam
                | SkillKind::PhantomCross
                | SkillKind::BladeCyclone
        )
    }

    pub fn color(self) -> Rgb {
        match self {
            SkillKind::DashSlash => palette::CYAN,
            SkillKind::SpinParry => palette::YELLOW,
            SkillKind::GroundSlam => palette::ORANGE,
            SkillKind::Shield => palette::GREEN,
            SkillKind::PhantomCross => palette::PURPLE,
            SkillKind::BladeCyclone => palette::PINK,
            SkillKind::FinalFlashDraw => palette::GOLD,
        }
    }
}

/// Frame count for an active skill, never zero
#[inline]
fn skill_frames(kind: SkillKind) -> u32 {
    kind.duration().max(1)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashSlash {
    pub timer: u32,
    /// Snapshot angle toward the target at activation
    pub heading: f32,
    /// Recent positions, oldest first
    pub trail: VecDeque<Vec2>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpinParry {
    pub timer: u32,
    /// Closed either by a successful parry or by expiry
    pub window_open: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SlamPhase {
    Rise,
    Fall,
    Impact,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroundSlam {
    pub timer: u32,
    pub phase: SlamPhase,
    /// Set by a clash: half radius, half damage
    pub weakened: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhantomCross {
    pub timer: u32,
    /// Opponent position when the skill started
    pub target: Vec2,
    /// Where the user reappeared; held for the whole skill
    pub anchor: Vec2,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BladeCyclone {
    pub timer: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FlashPhase {
    Sheath,
    Pause,
    Release,
    Recover,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalFlashDraw {
    pub timer: u32,
    pub phase: FlashPhase,
    pub anchor: Vec2,
    /// Angle toward the opponent at activation; the draw cuts along it
    pub aim: f32,
}

/// The one skill a fighter may have running
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ActiveSkill {
    DashSlash(DashSlash),
    SpinParry(SpinParry),
    GroundSlam(GroundSlam),
    PhantomCross(PhantomCross),
    BladeCyclone(BladeCyclone),
    FinalFlashDraw(FinalFlashDraw),
}

/// Where a skill strike can land
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StrikeReach {
    /// Defender center must be closer than `radius` to `center`
    Area { center: Vec2, radius: f32 },
    /// Defender must be touched by the user's blade
    Blade(Segment),
}

impl StrikeReach {
    /// Point the strike is reported at
    pub fn origin(&self) -> Vec2 {
        match self {
            StrikeReach::Area { center, .. } => *center,
            StrikeReach::Blade(blade) => blade.b,
        }
    }
}

/// Frame-exact damage requested by a skill this tick
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SkillStrike {
    pub side: Side,
    pub kind: SkillKind,
    pub reach: StrikeReach,
    pub damage_multiplier: f32,
    pub knockback: f32,
    pub hit_stop: u32,
}

/// How a skill modifies the user's basic sword strikes
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StrikeProfile {
    pub damage: f32,
    pub knockback: f32,
    /// Overrides the configured hit-stop
    pub hit_stop: Option<u32>,
    /// Overrides the configured attack cooldown
    pub cooldown: Option<u32>,
}

impl StrikeProfile {
    pub const BASIC: StrikeProfile = StrikeProfile {
        damage: 1.0,
        knockback: 1.0,
        hit_stop: None,
        cooldown: None,
    };
}

/// What a clash does to the skill that was struck
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ClashResponse {
    /// Rotate the user's velocity by this many radians and end the skill
    Deflect(f32),
    /// Skill continues with a smaller, weaker impact
    Weaken,
    /// Skill ends immediately
    Cancel,
    /// Sword wielder is pushed away from the user
    PushWielder(f32),
}

impl ActiveSkill {
    /// Build the skill state, repositioning the user where the skill demands.
    /// Returns `None` for instant skills.
    pub fn start(kind: SkillKind, user: &mut Fighter, target: Vec2, bounds: &Rect) -> Option<Self> {
        let heading = angle_between(user.pos, target);
        let skill = match kind {
            SkillKind::Shield => return None,
            SkillKind::DashSlash => {
                user.vel = direction(heading) * DASH_SPEED;
                ActiveSkill::DashSlash(DashSlash {
                    timer: 0,
                    heading,
                    trail: VecDeque::with_capacity(TRAIL_LENGTH + 1),
                })
            }
            SkillKind::SpinParry => {
                user.vel *= SLOWED_SPEED;
                ActiveSkill::SpinParry(SpinParry {
                    timer: 0,
                    window_open: true,
                })
            }
            SkillKind::GroundSlam => ActiveSkill::GroundSlam(GroundSlam {
                timer: 0,
                phase: SlamPhase::Rise,
                weakened: false,
            }),
            SkillKind::PhantomCross => {
                let behind = target + direction(heading) * PHANTOM_OFFSET;
                let anchor = bounds.clamp_circle(behind, user.body_radius());
                user.pos = anchor;
                user.vel = Vec2::ZERO;
                user.sword_angle = angle_between(anchor, target);
                ActiveSkill::PhantomCross(PhantomCross {
                    timer: 0,
                    target,
                    anchor,
                })
            }
            SkillKind::BladeCyclone => {
                user.vel *= SLOWED_SPEED;
                ActiveSkill::BladeCyclone(BladeCyclone { timer: 0 })
            }
            SkillKind::FinalFlashDraw => {
                user.vel = Vec2::ZERO;
                ActiveSkill::FinalFlashDraw(FinalFlashDraw {
                    timer: 0,
                    phase: FlashPhase::Sheath,
                    anchor: user.pos,
                    aim: heading,
                })
            }
        };
        Some(skill)
    }

    pub fn kind(&self) -> SkillKind {
        match self {
            ActiveSkill::DashSlash(_) => SkillKind::DashSlash,
            ActiveSkill::SpinParry(_) => SkillKind::SpinParry,
            ActiveSkill::GroundSlam(_) => SkillKind::GroundSlam,
            ActiveSkill::PhantomCross(_) => SkillKind::PhantomCross,
            ActiveSkill::BladeCyclone(_) => SkillKind::BladeCyclone,
            ActiveSkill::FinalFlashDraw(_) => SkillKind::FinalFlashDraw,
        }
    }

    /// User is pinned in place (no drag, bounce or integration)
    pub fn locks_position(&self) -> bool {
        matches!(
            self,
            ActiveSkill::PhantomCross(_) | ActiveSkill::FinalFlashDraw(_)
        )
    }

    /// User's basic sword strikes are off for the whole skill
    pub fn suppresses_strikes(&self) -> bool {
        self.locks_position()
    }

    /// Opponent is frozen while the ultimate charges
    pub fn stuns_opponent(&self) -> bool {
        matches!(
            self,
            ActiveSkill::FinalFlashDraw(FinalFlashDraw {
                phase: FlashPhase::Sheath | FlashPhase::Pause,
                ..
            })
        )
    }

    pub fn parry_window_open(&self) -> bool {
        matches!(
            self,
            ActiveSkill::SpinParry(SpinParry {
                window_open: true,
                ..
            })
        )
    }

    /// Close a spin parry window after it caught a blade
    pub fn consume_parry_window(&mut self) {
        if let ActiveSkill::SpinParry(spin) = self {
            spin.window_open = false;
        }
    }

    /// Speed limit while this skill runs
    pub fn speed_cap(&self, physics: &PhysicsConfig) -> f32 {
        match self {
            ActiveSkill::DashSlash(_) => DASH_SPEED.max(physics.max_speed),
            ActiveSkill::SpinParry(_) | ActiveSkill::BladeCyclone(_) => {
                (physics.max_speed * SLOWED_SPEED).max(physics.min_speed)
            }
            _ => physics.max_speed,
        }
    }

    /// Dash trail positions, oldest first
    pub fn trail(&self) -> Option<&VecDeque<Vec2>> {
        match self {
            ActiveSkill::DashSlash(dash) => Some(&dash.trail),
            _ => None,
        }
    }

    pub fn strike_profile(&self) -> StrikeProfile {
        match self {
            ActiveSkill::DashSlash(_) => StrikeProfile {
                knockback: DASH_KNOCKBACK,
                hit_stop: Some(DASH_HIT_STOP),
                ..StrikeProfile::BASIC
            },
            ActiveSkill::SpinParry(_) => StrikeProfile {
                knockback: SPIN_KNOCKBACK,
                ..StrikeProfile::BASIC
            },
            ActiveSkill::BladeCyclone(_) => StrikeProfile {
                damage: CYCLONE_DAMAGE,
                knockback: CYCLONE_KNOCKBACK,
                hit_stop: Some(CYCLONE_HIT_STOP),
                cooldown: Some(CYCLONE_HIT_INTERVAL),
            },
            _ => StrikeProfile::BASIC,
        }
    }

    /// React to a basic strike landing on the user. `None` when not clashable.
    pub fn on_clash(&mut self, rng: &mut Pcg32) -> Option<ClashResponse> {
        match self {
            ActiveSkill::DashSlash(_) => Some(ClashResponse::Deflect(
                rng.random_range(-DASH_DEFLECT..=DASH_DEFLECT),
            )),
            ActiveSkill::GroundSlam(slam) => {
                slam.weakened = true;
                Some(ClashResponse::Weaken)
            }
            ActiveSkill::PhantomCross(_) => Some(ClashResponse::Cancel),
            ActiveSkill::BladeCyclone(_) => Some(ClashResponse::PushWielder(CYCLONE_CLASH_PUSH)),
            ActiveSkill::SpinParry(_) | ActiveSkill::FinalFlashDraw(_) => None,
        }
    }

    /// Advance one frame. Returns a strike to resolve this tick and whether
    /// the skill has run its course.
    fn step(
        &mut self,
        user: &mut Fighter,
        opponent: &mut Fighter,
        cfg: &BattleConfig,
        out: &mut FrameOutput,
    ) -> (Option<SkillStrike>, bool) {
        let kind = self.kind();
        let frames = skill_frames(kind);
        let mut strike = None;

        let timer = match self {
            ActiveSkill::DashSlash(dash) => {
                dash.timer += 1;
                user.track_sword(opponent.pos, SWORD_TRACKING);
                dash.trail.push_back(user.pos);
                while dash.trail.len() > TRAIL_LENGTH {
                    dash.trail.pop_front();
                }
                user.vel = direction(dash.heading) * DASH_SPEED;
                out.effect(EffectKind::Trail, user.pos, kind.color(), dash.trail.len() as f32);
                dash.timer
            }
            ActiveSkill::SpinParry(spin) => {
                spin.timer += 1;
                user.sword_angle = normalize_angle(user.sword_angle + SPIN_RATE);
                if spin.window_open && spin.timer > SPIN_PARRY_WINDOW {
                    // Window lapsed without catching anything
                    spin.window_open = false;
                    user.spin_parry_recovery = SPIN_FAILED_RECOVERY;
                }
                spin.timer
            }
            ActiveSkill::GroundSlam(slam) => {
                slam.timer += 1;
                user.track_sword(opponent.pos, SWORD_TRACKING);
                if slam.timer < SLAM_RISE_UNTIL {
                    slam.phase = SlamPhase::Rise;
                    user.vel.y = SLAM_RISE_SPEED;
                } else if slam.timer < SLAM_FALL_UNTIL {
                    slam.phase = SlamPhase::Fall;
                    user.vel.y = SLAM_FALL_SPEED;
                } else {
                    slam.phase = SlamPhase::Impact;
                }
                if slam.timer == SLAM_IMPACT_FRAME {
                    let (radius, damage) = if slam.weakened {
                        (SLAM_RADIUS * 0.5, SLAM_DAMAGE * 0.5)
                    } else {
                        (SLAM_RADIUS, SLAM_DAMAGE)
                    };
                    strike = Some(SkillStrike {
                        side: user.side,
                        kind,
                        reach: StrikeReach::Area {
                            center: user.pos,
                            radius,
                        },
                        damage_multiplier: damage,
                        knockback: SLAM_KNOCKBACK,
                        hit_stop: SLAM_HIT_STOP,
                    });
                    out.effect(EffectKind::Shockwave, user.pos, kind.color(), radius);
                    out.effect(EffectKind::ScreenShake, user.pos, kind.color(), 8.0);
                }
                slam.timer
            }
            ActiveSkill::PhantomCross(phantom) => {
                phantom.timer += 1;
                user.pos = phantom.anchor;
                user.vel = Vec2::ZERO;
                user.track_sword(phantom.target, SWORD_TRACKING);
                if phantom.timer == PHANTOM_SLASH_FRAME {
                    out.effect(
                        EffectKind::CrossSlash,
                        phantom.target,
                        kind.color(),
                        PHANTOM_RADIUS,
                    );
                }
                if phantom.timer == PHANTOM_STRIKE_FRAME {
                    strike = Some(SkillStrike {
                        side: user.side,
                        kind,
                        reach: StrikeReach::Area {
                            center: phantom.target,
                            radius: PHANTOM_RADIUS,
                        },
                        damage_multiplier: PHANTOM_DAMAGE,
                        knockback: PHANTOM_KNOCKBACK,
                        hit_stop: PHANTOM_HIT_STOP,
                    });
                }
                phantom.timer
            }
            ActiveSkill::BladeCyclone(cyclone) => {
                cyclone.timer += 1;
                let aim = angle_between(user.pos, opponent.pos);
                user.sword_angle = normalize_angle(
                    user.sword_angle
                        + angle_delta(user.sword_angle, aim) * CYCLONE_TRACKING
                        + CYCLONE_SPIN,
                );
                let dist = user.pos.distance(opponent.pos);
                if dist < CYCLONE_PULL_RADIUS {
                    opponent.vel.y -= CYCLONE_LIFT;
                    opponent.vel += (user.pos - opponent.pos).normalize_or_zero() * CYCLONE_PULL;
                }
                if cyclone.timer >= frames && dist < CYCLONE_RELEASE_RADIUS {
                    opponent.vel +=
                        (opponent.pos - user.pos).normalize_or_zero() * CYCLONE_RELEASE_PUSH;
                    out.effect(EffectKind::Ring, user.pos, kind.color(), CYCLONE_RELEASE_RADIUS);
                }
                cyclone.timer
            }
            ActiveSkill::FinalFlashDraw(flash) => {
                flash.timer += 1;
                user.pos = flash.anchor;
                user.vel = Vec2::ZERO;
                flash.phase = if flash.timer <= FLASH_SHEATH_UNTIL {
                    FlashPhase::Sheath
                } else if flash.timer <= FLASH_PAUSE_UNTIL {
                    FlashPhase::Pause
                } else if flash.timer <= FLASH_RELEASE_FRAME {
                    FlashPhase::Release
                } else {
                    FlashPhase::Recover
                };
                match flash.phase {
                    FlashPhase::Sheath | FlashPhase::Pause => {
                        user.sword_angle = normalize_angle(flash.aim + PI);
                    }
                    FlashPhase::Release | FlashPhase::Recover => user.sword_angle = flash.aim,
                }
                if flash.timer == FLASH_RELEASE_FRAME {
                    let blade = user.sword_segment();
                    strike = Some(SkillStrike {
                        side: user.side,
                        kind,
                        reach: StrikeReach::Blade(blade),
                        damage_multiplier: FLASH_MULTIPLIER,
                        knockback: cfg.fighter.base_knockback * FLASH_MULTIPLIER,
                        hit_stop: FLASH_HIT_STOP,
                    });
                    out.effect(
                        EffectKind::ScreenBlack,
                        user.pos,
                        palette::BLACK,
                        cfg.timing.screen_black_frames as f32,
                    );
                    out.effect(EffectKind::CrossSlash, blade.b, kind.color(), user.sword_length);
                }
                flash.timer
            }
        };

        (strike, timer >= frames)
    }
}

/// Run one frame of a fighter's skill (or plain sword tracking when idle).
pub fn update_fighter(
    user: &mut Fighter,
    opponent: &mut Fighter,
    cfg: &BattleConfig,
    out: &mut FrameOutput,
) -> Option<SkillStrike> {
    let Some(mut skill) = user.skill.take() else {
        user.track_sword(opponent.pos, SWORD_TRACKING);
        return None;
    };

    let (strike, finished) = skill.step(user, opponent, cfg, out);
    if finished {
        user.finish_skill(skill.kind(), false, cfg.fighter.skill_cooldown, out);
    } else {
        user.skill = Some(skill);
    }
    strike
}

/// Deflect a dash after a clash
pub fn deflect(user: &mut Fighter, angle: f32) {
    let v = user.vel;
    let (sin, cos) = angle.sin_cos();
    user.vel = Vec2::new(v.x * cos - v.y * sin, v.x * sin + v.y * cos);
}

pub(crate) fn announce(user: &Fighter, kind: SkillKind, out: &mut FrameOutput) {
    out.event(BattleEvent::SkillActivated {
        side: user.side,
        kind,
    });
    out.sound(SoundCue::Whoosh);
    out.effect(EffectKind::Ring, user.pos, kind.color(), user.body_radius() * 2.0);
}
