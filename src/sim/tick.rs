//! Fixed timestep duel tick
//!
//! One call advances one real frame. Inside an active round a hit-stop
//! freezes everything, a slow-motion window paces simulated frames through
//! an accumulator, and otherwise every call is one simulated frame.

use glam::Vec2;
use rand::Rng;

use super::combat;
use super::events::{BattleEvent, EffectKind, SoundCue, palette};
use super::skill::{self, SkillKind};
use super::state::{
    DuelState, RoundEndReason, RoundOutcome, RoundPhase, Side, SlowMoKind, countdown_frames,
    pair_mut,
};
use crate::config::BattleConfig;

/// Input commands for a single tick (deterministic)
#[derive(Debug, Clone, Default)]
pub struct TickInput {
    /// Skill requested by each side (indexed by [`Side::index`])
    pub skills: [Option<SkillKind>; 2],
}

impl TickInput {
    pub fn activate(side: Side, kind: SkillKind) -> Self {
        let mut input = Self::default();
        input.skills[side.index()] = Some(kind);
        input
    }
}

/// Advance the duel by one frame
pub fn tick(state: &mut DuelState, cfg: &BattleConfig, input: &TickInput) {
    state.output.clear();
    state.frame += 1;

    match state.phase {
        RoundPhase::MatchOver => {}
        RoundPhase::Countdown { frames_left } => countdown(state, cfg, frames_left),
        RoundPhase::Active => {
            if state.hit_stop > 0 {
                state.hit_stop -= 1;
                return;
            }
            if pace_slow_motion(state) {
                step_world(state, cfg, input);
            }
        }
        RoundPhase::RoundEnding { frames_left } => ending(state, cfg, frames_left),
    }
}

fn countdown(state: &mut DuelState, cfg: &BattleConfig, frames_left: u32) {
    let step = cfg.round.countdown_step_frames.max(1);
    let elapsed = countdown_frames(cfg).saturating_sub(frames_left);
    if elapsed < step * 3 && elapsed % step == 0 {
        state.output.sound(SoundCue::Countdown);
    } else if elapsed == step * 3 {
        state.output.sound(SoundCue::Fight);
    }

    let frames_left = frames_left.saturating_sub(1);
    if frames_left > 0 {
        state.phase = RoundPhase::Countdown { frames_left };
        return;
    }

    let speed = cfg.physics.start_speed.abs();
    for f in &mut state.fighters {
        f.locked = false;
        f.vel = Vec2::new(
            state.rng.random_range(-speed..=speed),
            state.rng.random_range(-speed..=speed),
        );
    }
    state.phase = RoundPhase::Active;
    log::info!("Round {} start", state.round);
    state.output.event(BattleEvent::RoundStarted { round: state.round });
}

/// Consume one real frame of slow motion. Returns true when a simulated
/// frame is due.
fn pace_slow_motion(state: &mut DuelState) -> bool {
    let Some(slow) = state.slow_motion.as_mut() else {
        state.slow_accumulator = 0.0;
        return true;
    };
    slow.frames_left = slow.frames_left.saturating_sub(1);
    state.slow_accumulator += slow.scale;
    if slow.frames_left == 0 {
        state.slow_motion = None;
    }
    if state.slow_accumulator >= 1.0 {
        state.slow_accumulator -= 1.0;
        true
    } else {
        false
    }
}

/// One simulated frame: skills, movement, chaos, orbs, combat, arena
fn step_world(state: &mut DuelState, cfg: &BattleConfig, input: &TickInput) {
    state.round_frames += 1;
    let mods = state.chaos.modifiers();
    let bounds = state.effective_bounds(cfg);

    for f in &mut state.fighters {
        f.size_scale = mods.size;
    }

    for side in Side::BOTH {
        if let Some(kind) = input.skills[side.index()] {
            let (user, opponent) = pair_mut(&mut state.fighters, side);
            user.try_activate(kind, opponent, &bounds, &cfg.fighter, &mut state.output);
        }
    }

    let mut strikes = Vec::new();
    for side in Side::BOTH {
        let (user, opponent) = pair_mut(&mut state.fighters, side);
        strikes.extend(skill::update_fighter(user, opponent, cfg, &mut state.output));
    }

    // Stun always mirrors the opponent's current skill phase
    for side in Side::BOTH {
        let (f, opponent) = pair_mut(&mut state.fighters, side);
        f.stunned = opponent.skill.as_ref().is_some_and(|s| s.stuns_opponent());
    }

    for f in &mut state.fighters {
        f.advance(mods.speed, &bounds, &cfg.physics, &mut state.rng);
    }

    if cfg.chaos_enabled {
        state
            .chaos
            .update(&mut state.fighters, &bounds, cfg, &mut state.rng, &mut state.output);
    }

    if cfg.orbs_enabled {
        state
            .orbs
            .update(&cfg.orbs, &bounds, &mut state.rng, &mut state.output);
        state.orbs.collect(
            &mut state.fighters,
            &bounds,
            &cfg.orbs,
            &cfg.fighter,
            &mut state.output,
        );
    }

    let interacted = cfg.combat_enabled && combat::resolve(state, cfg, &strikes);

    if cfg.escalation_enabled {
        if interacted {
            state.arena.register_interaction();
        }
        state
            .arena
            .update(&mut state.fighters, cfg, &mut state.output);
    }

    check_round_end(state, cfg);
}

fn check_round_end(state: &mut DuelState, cfg: &BattleConfig) {
    let blue_dead = !state.fighter(Side::Blue).is_alive();
    let red_dead = !state.fighter(Side::Red).is_alive();
    let (outcome, reason) = match (blue_dead, red_dead) {
        (true, true) => (RoundOutcome::Draw, RoundEndReason::DoubleKnockOut),
        (true, false) => (RoundOutcome::Winner(Side::Red), RoundEndReason::KnockOut),
        (false, true) => (RoundOutcome::Winner(Side::Blue), RoundEndReason::KnockOut),
        (false, false) if state.round_frames >= cfg.round.max_frames() => {
            (RoundOutcome::Winner(timeout_winner(state)), RoundEndReason::Timeout)
        }
        (false, false) => return,
    };
    end_round(state, cfg, outcome, reason);
}

/// Closest to the arena center wins; an exact tie goes to Blue
pub fn timeout_winner(state: &DuelState) -> Side {
    let center = state.arena.rect.center();
    let blue = state.fighter(Side::Blue).pos.distance(center);
    let red = state.fighter(Side::Red).pos.distance(center);
    if red < blue { Side::Red } else { Side::Blue }
}

fn end_round(
    state: &mut DuelState,
    cfg: &BattleConfig,
    outcome: RoundOutcome,
    reason: RoundEndReason,
) {
    // Nothing may outlive the round: skills, position locks, stuns
    for f in &mut state.fighters {
        f.cancel_skill(0, &mut state.output);
        f.stunned = false;
        if !f.is_alive() {
            state.output.event(BattleEvent::Death {
                side: f.side,
                pos: f.pos,
            });
            state
                .output
                .effect(EffectKind::Explosion, f.pos, f.side.color(), f.body_radius() * 3.0);
            state.output.sound(SoundCue::Explosion);
        }
    }
    if state.chaos.active.is_some() {
        state.chaos.end(&cfg.chaos, &mut state.rng, &mut state.output);
    }
    state.hit_stop = 0;
    state.trigger_slow_motion(
        SlowMoKind::Death,
        cfg.round.reset_frames,
        cfg.timing.death_slowmo_scale,
    );

    match outcome {
        RoundOutcome::Winner(side) => {
            log::info!("Round {} to {} ({:?})", state.round, side.name(), reason)
        }
        RoundOutcome::Draw => log::info!("Round {} drawn ({:?})", state.round, reason),
    }
    state
        .score
        .record(state.round, outcome, reason, state.round_frames);
    state.output.event(BattleEvent::RoundEnded { outcome, reason });
    state
        .output
        .effect(EffectKind::ScreenShake, state.arena.rect.center(), palette::WHITE, 12.0);
    state.phase = RoundPhase::RoundEnding {
        frames_left: cfg.round.reset_frames.max(1),
    };
}

fn ending(state: &mut DuelState, cfg: &BattleConfig, frames_left: u32) {
    if pace_slow_motion(state) {
        let bounds = state.effective_bounds(cfg);
        for f in state.fighters.iter_mut().filter(|f| f.is_alive()) {
            f.advance(1.0, &bounds, &cfg.physics, &mut state.rng);
        }
    }

    let frames_left = frames_left.saturating_sub(1);
    if frames_left > 0 {
        state.phase = RoundPhase::RoundEnding { frames_left };
        return;
    }

    if let Some(winner) = state.score.winner() {
        log::info!(
            "Match over: {} wins {}-{}",
            winner.name(),
            state.score.wins[winner.index()],
            state.score.wins[winner.opponent().index()]
        );
        state.output.event(BattleEvent::MatchEnded { winner });
        state.phase = RoundPhase::MatchOver;
    } else {
        state.reset_round(cfg);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::events::HitSource;
    use crate::sim::state::Fighter;

    fn quiet_config() -> BattleConfig {
        let mut cfg = BattleConfig::default();
        cfg.chaos_enabled = false;
        cfg.orbs_enabled = false;
        cfg.escalation_enabled = false;
        cfg.timing.crit_chance = 0.0;
        cfg
    }

    fn run_countdown(state: &mut DuelState, cfg: &BattleConfig) {
        let input = TickInput::default();
        while !matches!(state.phase, RoundPhase::Active) {
            tick(state, cfg, &input);
        }
    }

    /// Active round with both fighters parked (no minimum speed)
    fn parked(cfg: &mut BattleConfig) -> DuelState {
        cfg.physics.min_speed = 0.0;
        let mut state = DuelState::new(21, cfg);
        run_countdown(&mut state, cfg);
        for f in &mut state.fighters {
            f.vel = Vec2::ZERO;
        }
        state
    }

    #[test]
    fn test_countdown_unlocks_with_start_velocity() {
        let cfg = quiet_config();
        let mut state = DuelState::new(5, &cfg);
        let input = TickInput::default();
        let mut countdown_cues = 0;
        let mut fight_cues = 0;
        for _ in 0..countdown_frames(&cfg) {
            assert!(state.fighters.iter().all(|f| f.locked));
            tick(&mut state, &cfg, &input);
            let sounds = &state.output.sounds;
            countdown_cues += sounds.iter().filter(|s| **s == SoundCue::Countdown).count();
            fight_cues += sounds.iter().filter(|s| **s == SoundCue::Fight).count();
        }
        assert_eq!(state.phase, RoundPhase::Active);
        assert_eq!(countdown_cues, 3);
        assert_eq!(fight_cues, 1);
        for f in &state.fighters {
            assert!(!f.locked);
            assert!(f.vel.x.abs() <= cfg.physics.start_speed);
            assert!(f.vel.y.abs() <= cfg.physics.start_speed);
        }
        assert!(state
            .output
            .events
            .contains(&BattleEvent::RoundStarted { round: 1 }));
    }

    #[test]
    fn test_hit_stop_freezes_world() {
        let cfg = quiet_config();
        let mut state = DuelState::new(5, &cfg);
        run_countdown(&mut state, &cfg);
        state.hit_stop = 3;
        let before: Vec<Vec2> = state.fighters.iter().map(|f| f.pos).collect();
        let frames = state.round_frames;
        for _ in 0..3 {
            tick(&mut state, &cfg, &TickInput::default());
        }
        let after: Vec<Vec2> = state.fighters.iter().map(|f| f.pos).collect();
        assert_eq!(before, after);
        assert_eq!(state.round_frames, frames);
        tick(&mut state, &cfg, &TickInput::default());
        assert_eq!(state.round_frames, frames + 1);
    }

    #[test]
    fn test_slow_motion_paces_with_accumulator() {
        let cfg = quiet_config();
        let mut state = DuelState::new(5, &cfg);
        run_countdown(&mut state, &cfg);
        let frames = state.round_frames;
        state.trigger_slow_motion(SlowMoKind::Parry, 10, 0.5);
        for _ in 0..10 {
            tick(&mut state, &cfg, &TickInput::default());
        }
        assert_eq!(state.round_frames, frames + 5);
        assert!(state.slow_motion.is_none());
        tick(&mut state, &cfg, &TickInput::default());
        assert_eq!(state.round_frames, frames + 6);
    }

    #[test]
    fn test_same_seed_same_duel() {
        let cfg = BattleConfig::default();
        let mut a = DuelState::new(777, &cfg);
        let mut b = DuelState::new(777, &cfg);
        for i in 0..4000u32 {
            let input = if i % 97 == 0 {
                TickInput::activate(Side::Blue, SkillKind::ALL[(i / 97) as usize % 7])
            } else {
                TickInput::default()
            };
            tick(&mut a, &cfg, &input);
            tick(&mut b, &cfg, &input);
            assert_eq!(a.output.events, b.output.events);
        }
        let ja = serde_json::to_string(&a).unwrap();
        let jb = serde_json::to_string(&b).unwrap();
        assert_eq!(ja, jb);
    }

    #[test]
    fn test_bounce_only_keeps_health_and_speed() {
        let mut cfg = BattleConfig::bounce_only();
        cfg.fighter.max_health = 200.0;
        let mut state = DuelState::new(2024, &cfg);
        // 5000 px apart; the first unlocked frame clamps them into the arena
        state.fighters[0].pos = Vec2::new(-2500.0, 300.0);
        state.fighters[1].pos = Vec2::new(2500.0, 300.0);
        let input = TickInput::default();
        let mut active_samples = 0;
        for _ in 0..10_000 {
            tick(&mut state, &cfg, &input);
            for f in &state.fighters {
                assert_eq!(f.health, 200.0);
                // The unlock frame only rolls the start velocity
                if state.phase == RoundPhase::Active && state.round_frames > 0 {
                    assert!(f.vel.length() >= cfg.physics.min_speed - 1e-3);
                    active_samples += 1;
                }
            }
        }
        assert!(active_samples > 1000);
    }

    #[test]
    fn test_simultaneous_lethal_hits_draw() {
        let mut cfg = quiet_config();
        cfg.fighter.sword_parry_distance = 0.0;
        let mut state = parked(&mut cfg);
        state.fighters[0].pos = Vec2::new(250.0, 300.0);
        state.fighters[0].sword_angle = 0.0;
        state.fighters[1].pos = Vec2::new(330.0, 300.0);
        state.fighters[1].sword_angle = std::f32::consts::PI;
        for f in &mut state.fighters {
            f.health = 5.0;
        }
        tick(&mut state, &cfg, &TickInput::default());
        assert!(state.fighters.iter().all(|f| f.health == 0.0));
        assert!(state.output.events.contains(&BattleEvent::RoundEnded {
            outcome: RoundOutcome::Draw,
            reason: RoundEndReason::DoubleKnockOut,
        }));
        assert_eq!(state.score.draws, 1);
        assert!(matches!(state.phase, RoundPhase::RoundEnding { .. }));
        assert_eq!(state.slow_motion.unwrap().kind, SlowMoKind::Death);
    }

    #[test]
    fn test_timeout_closest_to_center_wins() {
        let cfg = quiet_config();
        let mut state = DuelState::new(8, &cfg);
        let center = state.arena.rect.center();
        state.fighters[0].pos = center + Vec2::new(-100.0, 0.0);
        state.fighters[1].pos = center + Vec2::new(40.0, 0.0);
        assert_eq!(timeout_winner(&state), Side::Red);
        state.fighters[1].pos = center + Vec2::new(100.0, 0.0);
        assert_eq!(timeout_winner(&state), Side::Blue);
    }

    #[test]
    fn test_round_times_out() {
        let mut cfg = quiet_config();
        cfg.combat_enabled = false;
        cfg.round.max_secs = 1.0;
        let mut state = DuelState::new(8, &cfg);
        run_countdown(&mut state, &cfg);
        for _ in 0..60 {
            tick(&mut state, &cfg, &TickInput::default());
        }
        assert!(matches!(state.phase, RoundPhase::RoundEnding { .. }));
        assert_eq!(state.score.rounds.len(), 1);
        assert_eq!(state.score.rounds[0].reason, RoundEndReason::Timeout);
    }

    #[test]
    fn test_match_over_after_two_wins() {
        let mut cfg = quiet_config();
        cfg.combat_enabled = false;
        let mut state = DuelState::new(9, &cfg);
        let input = TickInput::default();
        for round in 1..=2 {
            run_countdown(&mut state, &cfg);
            assert_eq!(state.round, round);
            state.fighters[1].health = 0.0;
            tick(&mut state, &cfg, &input);
            assert!(matches!(state.phase, RoundPhase::RoundEnding { .. }));
            let mut ended = false;
            for _ in 0..cfg.round.reset_frames {
                tick(&mut state, &cfg, &input);
                ended |= state
                    .output
                    .events
                    .contains(&BattleEvent::MatchEnded { winner: Side::Blue });
            }
            assert_eq!(ended, round == 2);
        }
        assert_eq!(state.phase, RoundPhase::MatchOver);
        assert_eq!(state.score.wins, [2, 0]);
        let frame = state.frame;
        tick(&mut state, &cfg, &input);
        assert_eq!(state.frame, frame + 1);
        assert_eq!(state.phase, RoundPhase::MatchOver);
    }

    #[test]
    fn test_slam_area_check_fires_on_one_frame() {
        let mut cfg = quiet_config();
        let mut state = parked(&mut cfg);
        state.fighters[0].pos = Vec2::new(100.0, 300.0);
        state.fighters[1].pos = Vec2::new(500.0, 300.0);

        let mut strike_frames = Vec::new();
        let mut input = TickInput::activate(Side::Blue, SkillKind::GroundSlam);
        for frame in 1..=SkillKind::GroundSlam.duration() + 5 {
            tick(&mut state, &cfg, &input);
            input = TickInput::default();
            let strikes = state
                .output
                .events
                .iter()
                .filter(|e| {
                    matches!(
                        e,
                        BattleEvent::SkillStrike {
                            kind: SkillKind::GroundSlam,
                            ..
                        }
                    )
                })
                .count();
            if strikes > 0 {
                strike_frames.push((frame, strikes));
            }
        }
        assert_eq!(strike_frames, vec![(skill::SLAM_IMPACT_FRAME, 1)]);
    }

    #[test]
    fn test_activation_while_active_is_noop() {
        let mut cfg = quiet_config();
        let mut state = parked(&mut cfg);
        state.fighters[0].pos = Vec2::new(100.0, 300.0);
        state.fighters[1].pos = Vec2::new(500.0, 300.0);
        tick(&mut state, &cfg, &TickInput::activate(Side::Blue, SkillKind::BladeCyclone));
        assert_eq!(state.fighter(Side::Blue).skill_kind(), Some(SkillKind::BladeCyclone));
        for kind in SkillKind::ALL {
            tick(&mut state, &cfg, &TickInput::activate(Side::Blue, kind));
            assert_eq!(state.fighter(Side::Blue).skill_kind(), Some(SkillKind::BladeCyclone));
            assert!(!state
                .output
                .events
                .iter()
                .any(|e| matches!(e, BattleEvent::SkillActivated { .. })));
        }
    }

    #[test]
    fn test_ultimate_stuns_opponent_during_charge() {
        let mut cfg = quiet_config();
        let mut state = parked(&mut cfg);
        state.fighters[0].pos = Vec2::new(150.0, 300.0);
        state.fighters[1].pos = Vec2::new(450.0, 300.0);
        tick(&mut state, &cfg, &TickInput::activate(Side::Blue, SkillKind::FinalFlashDraw));
        assert!(state.fighter(Side::Red).stunned);
        assert!(!state.fighter(Side::Red).can_activate());
        for _ in 0..40 {
            tick(&mut state, &cfg, &TickInput::default());
        }
        assert!(!state.fighter(Side::Red).stunned);
    }

    /// Final flash hits dealt to red while blue draws from `gap` px away
    fn final_flash_hits(gap: f32) -> (usize, f32) {
        let mut cfg = quiet_config();
        let mut state = parked(&mut cfg);
        state.fighters[0].pos = Vec2::new(150.0, 300.0);
        state.fighters[1].pos = Vec2::new(150.0 + gap, 300.0);
        let mut input = TickInput::activate(Side::Blue, SkillKind::FinalFlashDraw);
        let mut hits = 0;
        for _ in 0..120 {
            tick(&mut state, &cfg, &input);
            input = TickInput::default();
            hits += state
                .output
                .events
                .iter()
                .filter(|e| {
                    matches!(
                        e,
                        BattleEvent::Hit {
                            source: HitSource::Skill(SkillKind::FinalFlashDraw),
                            ..
                        }
                    )
                })
                .count();
        }
        (hits, state.fighter(Side::Red).health)
    }

    #[test]
    fn test_final_flash_cuts_only_within_blade_reach() {
        let cfg = quiet_config();
        let blue = Fighter::new(Side::Blue, &cfg);
        // Tip distance from blue's center plus red's hit radius
        let reach = blue.body_radius()
            + crate::consts::SWORD_BASE_OFFSET
            + blue.sword_length
            + cfg.fighter.radius
            + cfg.fighter.hit_bonus;

        let (hits, _) = final_flash_hits(reach - 20.0);
        assert_eq!(hits, 1);

        let (hits, health) = final_flash_hits(reach + 5.0);
        assert_eq!(hits, 0);
        assert_eq!(health, cfg.fighter.max_health);

        let (hits, health) = final_flash_hits(250.0);
        assert_eq!(hits, 0);
        assert_eq!(health, cfg.fighter.max_health);
    }

    #[test]
    fn test_health_only_rises_through_life_steal() {
        let cfg = BattleConfig::default();
        let mut state = DuelState::new(4242, &cfg);
        let mut prev = (state.round, state.fighters.each_ref().map(|f| f.health));
        let mut checked = 0;
        for i in 0..6000u32 {
            let input = if i % 53 == 0 {
                let kind = SkillKind::ALL[(i / 53) as usize % SkillKind::ALL.len()];
                let side = if i % 2 == 0 { Side::Blue } else { Side::Red };
                TickInput::activate(side, kind)
            } else {
                TickInput::default()
            };
            tick(&mut state, &cfg, &input);
            let health = state.fighters.each_ref().map(|f| f.health);
            if state.round == prev.0 {
                for side in Side::BOTH {
                    let idx = side.index();
                    assert!(health[idx] >= 0.0);
                    let stole = state.output.events.iter().any(|e| {
                        matches!(e, BattleEvent::LifeSteal { side: s, .. } if *s == side)
                    });
                    if !stole {
                        assert!(
                            health[idx] <= prev.1[idx],
                            "{} healed without life-steal at frame {}",
                            side.name(),
                            state.frame
                        );
                    }
                }
                checked += 1;
            }
            prev = (state.round, health);
        }
        assert!(checked > 5000);
    }

    #[test]
    fn test_death_mid_skill_releases_everything() {
        let mut cfg = quiet_config();
        cfg.combat_enabled = false;
        let mut state = parked(&mut cfg);
        tick(&mut state, &cfg, &TickInput::activate(Side::Blue, SkillKind::FinalFlashDraw));
        assert!(state.fighter(Side::Red).stunned);
        state.fighter_mut(Side::Blue).health = 0.0;
        tick(&mut state, &cfg, &TickInput::default());
        let blue: &Fighter = state.fighter(Side::Blue);
        assert!(blue.skill.is_none());
        assert!(!blue.is_immobile());
        assert!(!state.fighter(Side::Red).stunned);
        assert!(state.output.events.contains(&BattleEvent::SkillEnded {
            side: Side::Blue,
            kind: SkillKind::FinalFlashDraw,
            cancelled: true,
        }));
        assert!(state.output.events.contains(&BattleEvent::RoundEnded {
            outcome: RoundOutcome::Winner(Side::Red),
            reason: RoundEndReason::KnockOut,
        }));
    }
}
