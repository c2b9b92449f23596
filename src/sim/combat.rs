//! Combat resolver for the duel
//!
//! Runs once per simulated frame after movement. Checks are strictly ordered:
//! 1. sword-vs-sword parry
//! 2. basic strike clashing with an active skill
//! 3. spin parry window
//! 4. direct blade hits (each direction independently)
//! 5. frame-exact skill strikes queued by the skill machines
//!
//! The first three end resolution for the frame when they fire.

use glam::Vec2;
use rand::Rng;

use super::chaos::ChaosModifiers;
use super::events::{BattleEvent, EffectKind, FrameOutput, HitSource, SoundCue, palette};
use super::skill::{
    self, ClashResponse, SPIN_PARRY_RADIUS, SPIN_PUNISH_COOLDOWN, SPIN_PUNISH_KNOCKBACK,
    SkillStrike, StrikeProfile, StrikeReach,
};
use super::geometry::Segment;
use super::state::{DamageResult, DuelState, FLASH_FRAMES, Fighter, Side, SlowMoKind, pair_mut};
use crate::config::BattleConfig;
use crate::consts::SWORD_SAMPLES;
use crate::direction;

/// Extra punisher knockback per attacker combo stage
const PUNISH_PER_COMBO: f32 = 0.25;

/// Resolve all combat for this frame. Returns true if the fighters
/// interacted (used to pause arena escalation).
pub fn resolve(state: &mut DuelState, cfg: &BattleConfig, strikes: &[SkillStrike]) -> bool {
    if sword_parry(state, cfg) || clash(state, cfg) || spin_parry(state, cfg) {
        return true;
    }

    // Both blades are judged on the frame's starting state so mutual
    // lethal hits land together
    let armed = state.fighters.each_ref().map(Fighter::is_attacking);
    let mut interacted = false;
    for side in Side::BOTH {
        interacted |= armed[side.index()] && direct_hit(state, cfg, side);
    }
    for strike in strikes {
        interacted |= skill_strike(state, cfg, strike);
    }
    interacted
}

fn sword_parry(state: &mut DuelState, cfg: &BattleConfig) -> bool {
    let [blue, red] = &mut state.fighters;
    if !(blue.is_attacking() && red.is_attacking()) {
        return false;
    }
    let a = blue.sword_segment();
    let b = red.sword_segment();
    if a.distance_to_segment(&b) >= cfg.fighter.sword_parry_distance {
        return false;
    }

    for f in [blue, red] {
        f.reset_combo();
        f.combo_recovery = cfg.fighter.combo_recovery;
        f.flash_frames = FLASH_FRAMES;
    }
    let pos = (a.b + b.b) * 0.5;
    let out = &mut state.output;
    out.event(BattleEvent::SwordParry { pos });
    out.effect(EffectKind::Sparks, pos, palette::YELLOW, 16.0);
    out.sound(SoundCue::Clang);

    state.add_hit_stop(cfg.timing.parry_hit_stop_frames);
    state.trigger_slow_motion(
        SlowMoKind::Parry,
        cfg.timing.parry_slowmo_frames,
        cfg.timing.parry_slowmo_scale,
    );
    true
}

fn clash(state: &mut DuelState, cfg: &BattleConfig) -> bool {
    for wielder_side in Side::BOTH {
        let (wielder, user) = pair_mut(&mut state.fighters, wielder_side);
        if !wielder.is_attacking() {
            continue;
        }
        let Some(kind) = user.skill_kind().filter(|k| k.is_clashable()) else {
            continue;
        };
        let blade = wielder.sword_segment();
        if blade.distance_to_point(user.pos) >= user.body_radius() + cfg.fighter.hit_bonus {
            continue;
        }
        let Some(response) = user.skill.as_mut().and_then(|s| s.on_clash(&mut state.rng)) else {
            continue;
        };

        let out = &mut state.output;
        match response {
            ClashResponse::Deflect(angle) => {
                skill::deflect(user, angle);
                user.cancel_skill(cfg.fighter.skill_cooldown, out);
            }
            ClashResponse::Weaken => {}
            ClashResponse::Cancel => user.cancel_skill(cfg.fighter.skill_cooldown, out),
            ClashResponse::PushWielder(push) => {
                wielder.vel += (wielder.pos - user.pos).normalize_or(Vec2::X) * push;
            }
        }
        wielder.attack_cooldown = cfg.fighter.attack_cooldown;

        let pos = blade.closest_point(user.pos);
        out.event(BattleEvent::Clash {
            wielder: wielder_side,
            skill_user: wielder_side.opponent(),
            skill: kind,
            pos,
        });
        out.effect(EffectKind::Sparks, pos, kind.color(), 12.0);
        out.sound(SoundCue::Clang);
        state.add_hit_stop(cfg.timing.clash_hit_stop_frames);
        return true;
    }
    false
}

fn spin_parry(state: &mut DuelState, cfg: &BattleConfig) -> bool {
    for defender_side in Side::BOTH {
        let (defender, attacker) = pair_mut(&mut state.fighters, defender_side);
        let window_open = defender.skill.as_ref().is_some_and(|s| s.parry_window_open());
        if !window_open || !attacker.is_attacking() {
            continue;
        }
        let tip = attacker.sword_segment().b;
        if tip.distance(defender.pos) >= SPIN_PARRY_RADIUS {
            continue;
        }

        if let Some(skill) = defender.skill.as_mut() {
            skill.consume_parry_window();
        }
        let tier = 1.0 + PUNISH_PER_COMBO * attacker.combo_step as f32;
        let away = (attacker.pos - defender.pos).normalize_or(Vec2::X);
        attacker.vel += away * SPIN_PUNISH_KNOCKBACK * tier;
        attacker.attack_cooldown = SPIN_PUNISH_COOLDOWN;
        attacker.reset_combo();
        attacker.flash_frames = FLASH_FRAMES;

        let out = &mut state.output;
        out.event(BattleEvent::SkillParry {
            defender: defender_side,
            attacker: defender_side.opponent(),
            pos: tip,
        });
        out.effect(EffectKind::Ring, tip, palette::YELLOW, SPIN_PARRY_RADIUS);
        out.sound(SoundCue::Clang);

        state.add_hit_stop(cfg.timing.parry_hit_stop_frames);
        state.trigger_slow_motion(
            SlowMoKind::Parry,
            cfg.timing.parry_slowmo_frames,
            cfg.timing.parry_slowmo_scale,
        );
        return true;
    }
    false
}

fn direct_hit(state: &mut DuelState, cfg: &BattleConfig, attacker_side: Side) -> bool {
    let mods = state.chaos.modifiers();
    let (attacker, defender) = pair_mut(&mut state.fighters, attacker_side);
    if !defender.is_alive() || defender.invincible_frames > 0 {
        return false;
    }

    let Some(pos) = blade_contact(&attacker.sword_segment(), defender, cfg) else {
        return false;
    };

    let t = &cfg.timing;
    let profile = attacker
        .skill
        .as_ref()
        .map_or(StrikeProfile::BASIC, |s| s.strike_profile());
    let critical = state.rng.random_bool(t.crit_chance as f64);
    let crit = if critical { t.crit_multiplier } else { 1.0 };
    let combo = attacker.combo_multiplier();
    let damage = cfg.fighter.damage_per_hit
        * combo
        * profile.damage
        * mods.damage
        * vulnerability(defender, cfg)
        * crit;
    let knockback = cfg.fighter.base_knockback * combo * profile.knockback * mods.knockback * crit;
    let dir = (defender.pos - attacker.pos).normalize_or(direction(attacker.sword_angle));

    let result = defender.take_damage(damage, dir * knockback, cfg.fighter.invincibility_frames);
    let out = &mut state.output;
    let (hit_stop, slow) = match result {
        DamageResult::Ignored => return false,
        DamageResult::ShieldParried | DamageResult::ShieldBlocked => {
            let parried = result == DamageResult::ShieldParried;
            attacker.attack_cooldown = cfg.fighter.block_recovery;
            if parried {
                attacker.reset_combo();
                attacker.flash_frames = FLASH_FRAMES;
            }
            shield_feedback(attacker_side.opponent(), pos, parried, out);
            if parried {
                (
                    t.parry_hit_stop_frames,
                    Some((SlowMoKind::Parry, t.parry_slowmo_frames, t.parry_slowmo_scale)),
                )
            } else {
                (t.hit_stop_frames, None)
            }
        }
        DamageResult::Damaged { amount } => {
            attacker.attack_cooldown = profile.cooldown.unwrap_or(cfg.fighter.attack_cooldown);
            attacker.advance_combo(cfg.fighter.combo_window);
            landed(attacker, attacker_side, pos, amount, critical, HitSource::Sword, &mods, out);
            let slow = if critical {
                (SlowMoKind::CriticalImpact, t.crit_slowmo_frames, t.crit_slowmo_scale)
            } else {
                (SlowMoKind::Hit, t.hit_slowmo_frames, t.hit_slowmo_scale)
            };
            (profile.hit_stop.unwrap_or(t.hit_stop_frames), Some(slow))
        }
    };

    state.add_hit_stop(hit_stop);
    if let Some((kind, frames, scale)) = slow {
        state.trigger_slow_motion(kind, frames, scale);
    }
    true
}

fn skill_strike(state: &mut DuelState, cfg: &BattleConfig, strike: &SkillStrike) -> bool {
    let mods = state.chaos.modifiers();
    let (user, defender) = pair_mut(&mut state.fighters, strike.side);
    let out = &mut state.output;

    let in_reach = defender.is_alive()
        && match strike.reach {
            StrikeReach::Area { center, radius } => defender.pos.distance(center) < radius,
            StrikeReach::Blade(blade) => blade_contact(&blade, defender, cfg).is_some(),
        };
    let origin = strike.reach.origin();
    out.event(BattleEvent::SkillStrike {
        side: strike.side,
        kind: strike.kind,
        pos: origin,
        landed: in_reach,
    });
    if !in_reach {
        return false;
    }

    let damage = cfg.fighter.damage_per_hit
        * strike.damage_multiplier
        * mods.damage
        * vulnerability(defender, cfg);
    let center = match strike.reach {
        StrikeReach::Area { center, .. } => center,
        StrikeReach::Blade(_) => user.pos,
    };
    let fallback = (defender.pos - user.pos).normalize_or(Vec2::X);
    let dir = (defender.pos - center).normalize_or(fallback);
    let knockback = dir * strike.knockback * mods.knockback;

    let defender_side = strike.side.opponent();
    match defender.take_damage(damage, knockback, cfg.fighter.invincibility_frames) {
        DamageResult::Ignored => return false,
        DamageResult::ShieldParried => shield_feedback(defender_side, defender.pos, true, out),
        DamageResult::ShieldBlocked => shield_feedback(defender_side, defender.pos, false, out),
        DamageResult::Damaged { amount } => {
            let pos = defender.pos;
            let source = HitSource::Skill(strike.kind);
            landed(user, strike.side, pos, amount, false, source, &mods, out);
            state.trigger_slow_motion(
                SlowMoKind::Hit,
                cfg.timing.hit_slowmo_frames,
                cfg.timing.hit_slowmo_scale,
            );
        }
    }
    state.add_hit_stop(strike.hit_stop);
    true
}

/// First blade sample point touching the defender's body
fn blade_contact(blade: &Segment, defender: &Fighter, cfg: &BattleConfig) -> Option<Vec2> {
    let reach = defender.body_radius() + cfg.fighter.hit_bonus;
    SWORD_SAMPLES
        .iter()
        .map(|&t| blade.lerp(t))
        .find(|p| p.distance(defender.pos) < reach)
}

/// Damage multiplier for a defender still recovering from a failed spin parry
fn vulnerability(defender: &Fighter, cfg: &BattleConfig) -> f32 {
    if defender.spin_parry_recovery > 0 {
        cfg.fighter.vulnerability_multiplier
    } else {
        1.0
    }
}

fn shield_feedback(defender: Side, pos: Vec2, parried: bool, out: &mut FrameOutput) {
    out.event(BattleEvent::ShieldBlock {
        defender,
        pos,
        parried,
    });
    if parried {
        out.effect(EffectKind::Ring, pos, palette::GREEN, 40.0);
        out.sound(SoundCue::Clang);
    } else {
        out.effect(EffectKind::Sparks, pos, palette::GREEN, 8.0);
        out.sound(SoundCue::Block);
    }
}

/// Record a landed hit and apply life-steal
#[allow(clippy::too_many_arguments)]
fn landed(
    attacker: &mut Fighter,
    attacker_side: Side,
    pos: Vec2,
    amount: f32,
    critical: bool,
    source: HitSource,
    mods: &ChaosModifiers,
    out: &mut FrameOutput,
) {
    out.event(BattleEvent::Hit {
        attacker: attacker_side,
        defender: attacker_side.opponent(),
        pos,
        damage: amount,
        critical,
        source,
    });
    let color = if critical { palette::GOLD } else { palette::WHITE };
    out.effect(EffectKind::Sparks, pos, color, if critical { 24.0 } else { 10.0 });
    out.effect(EffectKind::DamageNumber, pos, color, amount);
    if critical {
        out.effect(EffectKind::ScreenShake, pos, color, 10.0);
    }
    out.sound(SoundCue::Hit { critical });

    if mods.life_steal > 0.0 && amount > 0.0 {
        let healed = attacker.heal(amount * mods.life_steal);
        if healed > 0.0 {
            out.event(BattleEvent::LifeSteal {
                side: attacker_side,
                amount: healed,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::chaos::ChaosEvent;
    use crate::sim::skill::{ActiveSkill, SkillKind};
    use crate::sim::state::RoundPhase;
    use std::f32::consts::{FRAC_PI_2, PI};

    /// Active duel with blue at `blue_x` and red at `red_x`, both at y = 300
    fn duel(cfg: &BattleConfig, blue_x: f32, red_x: f32) -> DuelState {
        let mut state = DuelState::new(11, cfg);
        state.phase = RoundPhase::Active;
        for f in &mut state.fighters {
            f.locked = false;
        }
        state.fighters[0].pos = Vec2::new(blue_x, 300.0);
        state.fighters[0].sword_angle = 0.0;
        state.fighters[1].pos = Vec2::new(red_x, 300.0);
        state.fighters[1].sword_angle = FRAC_PI_2;
        state
    }

    fn no_crits() -> BattleConfig {
        let mut cfg = BattleConfig::default();
        cfg.timing.crit_chance = 0.0;
        cfg
    }

    #[test]
    fn test_parry_beats_simultaneous_hit() {
        let cfg = no_crits();
        let mut state = duel(&cfg, 250.0, 350.0);
        state.fighters[1].sword_angle = PI;
        assert!(resolve(&mut state, &cfg, &[]));
        assert_eq!(state.fighters[0].health, cfg.fighter.max_health);
        assert_eq!(state.fighters[1].health, cfg.fighter.max_health);
        assert!(state
            .output
            .events
            .iter()
            .any(|e| matches!(e, BattleEvent::SwordParry { .. })));
        assert_eq!(state.fighters[0].combo_recovery, cfg.fighter.combo_recovery);
        assert_eq!(state.hit_stop, cfg.timing.parry_hit_stop_frames);
        assert_eq!(state.slow_motion.unwrap().kind, SlowMoKind::Parry);
    }

    #[test]
    fn test_direct_hit_applies_damage_and_combo() {
        let cfg = no_crits();
        let mut state = duel(&cfg, 250.0, 330.0);
        assert!(resolve(&mut state, &cfg, &[]));
        let red = &state.fighters[1];
        assert_eq!(red.health, cfg.fighter.max_health - cfg.fighter.damage_per_hit);
        assert!(red.vel.x > 0.0);
        assert_eq!(red.invincible_frames, cfg.fighter.invincibility_frames);
        let blue = &state.fighters[0];
        assert_eq!(blue.combo_step, 1);
        assert_eq!(blue.attack_cooldown, cfg.fighter.attack_cooldown);
        assert_eq!(state.slow_motion.unwrap().kind, SlowMoKind::Hit);
    }

    #[test]
    fn test_combo_stage_scales_damage() {
        let cfg = no_crits();
        let mut state = duel(&cfg, 250.0, 330.0);
        state.fighters[0].combo_step = 3;
        resolve(&mut state, &cfg, &[]);
        let expected = cfg.fighter.max_health - cfg.fighter.damage_per_hit * 1.5;
        assert!((state.fighters[1].health - expected).abs() < 1e-3);
    }

    #[test]
    fn test_critical_hit() {
        let mut cfg = BattleConfig::default();
        cfg.timing.crit_chance = 1.0;
        let mut state = duel(&cfg, 250.0, 330.0);
        resolve(&mut state, &cfg, &[]);
        assert_eq!(state.fighters[1].health, cfg.fighter.max_health - 20.0);
        assert!(state.output.events.iter().any(|e| matches!(
            e,
            BattleEvent::Hit {
                critical: true,
                ..
            }
        )));
        assert_eq!(state.slow_motion.unwrap().kind, SlowMoKind::CriticalImpact);
    }

    #[test]
    fn test_shield_parry_then_full_damage_next_tick() {
        let cfg = no_crits();
        let mut state = duel(&cfg, 250.0, 330.0);
        state.fighters[1].has_shield = true;
        state.fighters[1].shield_parry_window = 10;
        resolve(&mut state, &cfg, &[]);
        assert_eq!(state.fighters[1].health, cfg.fighter.max_health);
        assert!(!state.fighters[1].has_shield);
        assert_eq!(state.fighters[0].attack_cooldown, cfg.fighter.block_recovery);
        assert!(state.output.events.iter().any(|e| matches!(
            e,
            BattleEvent::ShieldBlock {
                parried: true,
                defender: Side::Red,
                ..
            }
        )));

        state.output.clear();
        state.fighters[0].attack_cooldown = 0;
        resolve(&mut state, &cfg, &[]);
        assert_eq!(state.fighters[1].health, cfg.fighter.max_health - cfg.fighter.damage_per_hit);
    }

    #[test]
    fn test_shield_outside_window_is_plain_block() {
        let cfg = no_crits();
        let mut state = duel(&cfg, 250.0, 330.0);
        state.fighters[1].has_shield = true;
        resolve(&mut state, &cfg, &[]);
        assert!(state.output.events.iter().any(|e| matches!(
            e,
            BattleEvent::ShieldBlock {
                parried: false,
                ..
            }
        )));
        assert_eq!(state.output.sounds, vec![SoundCue::Block]);
    }

    #[test]
    fn test_vulnerability_amplifies_and_is_spent() {
        let cfg = no_crits();
        let mut state = duel(&cfg, 250.0, 330.0);
        state.fighters[1].spin_parry_recovery = 5;
        resolve(&mut state, &cfg, &[]);
        let expected = cfg.fighter.max_health - cfg.fighter.damage_per_hit * 1.3;
        assert!((state.fighters[1].health - expected).abs() < 1e-3);
        assert_eq!(state.fighters[1].spin_parry_recovery, 0);
    }

    #[test]
    fn test_life_steal_heals_attacker() {
        let cfg = no_crits();
        let mut state = duel(&cfg, 250.0, 330.0);
        state.chaos.active = Some(ChaosEvent::DiscoFever);
        state.fighters[0].health = 100.0;
        resolve(&mut state, &cfg, &[]);
        assert_eq!(state.fighters[0].health, 110.0);
        assert!(state
            .output
            .events
            .iter()
            .any(|e| matches!(e, BattleEvent::LifeSteal { side: Side::Blue, .. })));
    }

    #[test]
    fn test_spin_parry_punishes_attacker() {
        let cfg = no_crits();
        let mut state = duel(&cfg, 250.0, 370.0);
        state.fighters[1].skill = Some(ActiveSkill::SpinParry(crate::sim::skill::SpinParry {
            timer: 3,
            window_open: true,
        }));
        state.fighters[0].combo_step = 2;
        assert!(resolve(&mut state, &cfg, &[]));
        let blue = &state.fighters[0];
        assert!(blue.vel.x < -20.0);
        assert_eq!(blue.attack_cooldown, SPIN_PUNISH_COOLDOWN);
        assert_eq!(blue.combo_step, 0);
        assert_eq!(state.fighters[1].health, cfg.fighter.max_health);
        assert!(!state.fighters[1].skill.as_ref().unwrap().parry_window_open());
    }

    #[test]
    fn test_clash_cancels_dash() {
        let cfg = no_crits();
        let mut state = duel(&cfg, 250.0, 330.0);
        let bounds = cfg.arena.rect();
        let blue = state.fighters[0].clone();
        let mut out = FrameOutput::default();
        let red = &mut state.fighters[1];
        assert!(red.try_activate(SkillKind::DashSlash, &blue, &bounds, &cfg.fighter, &mut out));
        state.fighters[1].sword_angle = FRAC_PI_2;
        assert!(resolve(&mut state, &cfg, &[]));
        assert!(state.fighters[1].skill.is_none());
        assert_eq!(state.fighters[1].health, cfg.fighter.max_health);
        assert_eq!(state.fighters[0].attack_cooldown, cfg.fighter.attack_cooldown);
        assert_eq!(state.hit_stop, cfg.timing.clash_hit_stop_frames);
        assert!(state.output.events.iter().any(|e| matches!(
            e,
            BattleEvent::Clash {
                skill: SkillKind::DashSlash,
                ..
            }
        )));
    }

    #[test]
    fn test_final_flash_cannot_be_clashed() {
        let cfg = no_crits();
        let mut state = duel(&cfg, 250.0, 330.0);
        let blue = state.fighters[0].clone();
        let bounds = cfg.arena.rect();
        let mut out = FrameOutput::default();
        let red = &mut state.fighters[1];
        red.try_activate(SkillKind::FinalFlashDraw, &blue, &bounds, &cfg.fighter, &mut out);
        resolve(&mut state, &cfg, &[]);
        assert!(state.fighters[1].skill.is_some());
        assert!(state.fighters[1].health < cfg.fighter.max_health);
    }

    #[test]
    fn test_skill_strike_in_and_out_of_range() {
        let cfg = no_crits();
        let mut state = duel(&cfg, 100.0, 200.0);
        state.fighters[1].sword_angle = PI / 2.0;
        state.fighters[0].sword_angle = -PI / 2.0;
        let strike = SkillStrike {
            side: Side::Blue,
            kind: SkillKind::GroundSlam,
            reach: StrikeReach::Area {
                center: Vec2::new(100.0, 300.0),
                radius: 130.0,
            },
            damage_multiplier: 1.5,
            knockback: 18.0,
            hit_stop: 5,
        };
        resolve(&mut state, &cfg, &[strike]);
        assert_eq!(state.fighters[1].health, cfg.fighter.max_health - 15.0);
        assert!(state.output.events.iter().any(|e| matches!(
            e,
            BattleEvent::SkillStrike { landed: true, .. }
        )));

        state.output.clear();
        state.fighters[1].invincible_frames = 0;
        state.fighters[1].pos = Vec2::new(400.0, 300.0);
        resolve(&mut state, &cfg, &[strike]);
        assert_eq!(state.fighters[1].health, cfg.fighter.max_health - 15.0);
        assert!(state.output.events.iter().any(|e| matches!(
            e,
            BattleEvent::SkillStrike { landed: false, .. }
        )));
    }

    #[test]
    fn test_blade_strike_needs_the_blade_to_connect() {
        let cfg = no_crits();
        let mut state = duel(&cfg, 100.0, 200.0);
        state.fighters[0].attack_cooldown = 5;
        state.fighters[1].sword_angle = PI / 2.0;
        state.fighters[1].vel = Vec2::ZERO;
        let strike = SkillStrike {
            side: Side::Blue,
            kind: SkillKind::FinalFlashDraw,
            reach: StrikeReach::Blade(Segment::new(
                Vec2::new(133.0, 300.0),
                Vec2::new(188.0, 300.0),
            )),
            damage_multiplier: 2.5,
            knockback: 25.0,
            hit_stop: 8,
        };
        resolve(&mut state, &cfg, &[strike]);
        assert_eq!(state.fighters[1].health, cfg.fighter.max_health - 25.0);
        assert!(state.fighters[1].vel.x > 0.0);

        // Tip is 52 px from the body center; reach is radius 30 + bonus 8
        state.output.clear();
        state.fighters[1].invincible_frames = 0;
        state.fighters[1].pos = Vec2::new(240.0, 300.0);
        resolve(&mut state, &cfg, &[strike]);
        assert_eq!(state.fighters[1].health, cfg.fighter.max_health - 25.0);
        assert!(state.output.events.iter().any(|e| matches!(
            e,
            BattleEvent::SkillStrike { landed: false, .. }
        )));
    }
}
