//! Ball-battle variant
//!
//! Teams of physics balls under gravity. Opposing balls that collide hard
//! enough hurt each other in proportion to impact speed and the other ball's
//! mass. Units are pixels and seconds, unlike the frame-based duel.

use std::collections::VecDeque;

use glam::Vec2;
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};

use super::events::{BattleEvent, EffectKind, FrameOutput, Rgb, SoundCue, palette};
use super::geometry::circle_overlap;
use crate::config::BallConfig;

/// Display colors by team id (wraps for larger team counts)
pub const TEAM_COLORS: [Rgb; 6] = [
    palette::RED,
    palette::BLUE,
    palette::GREEN,
    palette::YELLOW,
    palette::PURPLE,
    palette::CYAN,
];

/// Initial velocity spread (px/s)
const SPAWN_SPEED: Vec2 = Vec2::new(200.0, 100.0);
/// Hit flash decay per second
const FLASH_DECAY: f32 = 5.0;

pub fn team_color(team: u8) -> Rgb {
    TEAM_COLORS[team as usize % TEAM_COLORS.len()]
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ball {
    pub id: u32,
    pub team: u8,
    pub pos: Vec2,
    pub vel: Vec2,
    pub radius: f32,
    pub mass: f32,
    pub health: f32,
    pub max_health: f32,
    /// 1.0 right after a hit, decays to 0
    pub hit_flash: f32,
    pub trail: VecDeque<Vec2>,
}

impl Ball {
    #[inline]
    pub fn is_alive(&self) -> bool {
        self.health > 0.0
    }

    pub fn health_fraction(&self) -> f32 {
        self.health / self.max_health
    }

    /// Returns true if this hit killed the ball
    fn take_damage(&mut self, amount: f32) -> bool {
        if !self.is_alive() {
            return false;
        }
        self.health = (self.health - amount).max(0.0);
        self.hit_flash = 1.0;
        !self.is_alive()
    }

    fn apply_impulse(&mut self, impulse: Vec2) {
        self.vel += impulse / self.mass;
    }
}

/// N-per-team ball battle
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BallBattle {
    pub seed: u64,
    pub rng: Pcg32,
    /// Simulated seconds (slow motion included)
    pub time: f32,
    /// Living balls
    pub balls: Vec<Ball>,
    /// Seconds of slow motion left
    pub slowmo_left: f32,
    /// Slow motion fires once per battle
    pub slowmo_fired: bool,
    #[serde(skip)]
    pub output: FrameOutput,
}

impl BallBattle {
    /// Spawn every team on its own vertical lane in the upper part of the arena
    pub fn new(seed: u64, cfg: &BallConfig) -> Self {
        let mut rng = Pcg32::seed_from_u64(seed);
        let teams = cfg.team_sizes.len().max(1);
        let margin = cfg.spawn_margin.min(cfg.width / 4.0).min(cfg.height / 4.0);
        let lane = (cfg.width - margin * 2.0) / teams as f32;
        let (y_lo, y_hi) = (margin, (cfg.height * 0.4).max(margin));

        let mut balls = Vec::new();
        let mut next_id = 1;
        for (team, &count) in cfg.team_sizes.iter().enumerate() {
            let x_lo = margin + lane * team as f32 + lane * 0.15;
            let x_hi = margin + lane * (team + 1) as f32 - lane * 0.15;
            for _ in 0..count {
                let radius = sample(&mut rng, cfg.radius_range);
                let mass = sample(&mut rng, cfg.mass_range);
                let pos = Vec2::new(sample(&mut rng, (x_lo, x_hi)), sample(&mut rng, (y_lo, y_hi)));
                let vel = Vec2::new(
                    rng.random_range(-SPAWN_SPEED.x..=SPAWN_SPEED.x),
                    rng.random_range(-SPAWN_SPEED.y..=SPAWN_SPEED.y),
                );
                balls.push(Ball {
                    id: next_id,
                    team: team as u8,
                    pos,
                    vel,
                    radius,
                    mass,
                    health: cfg.max_health,
                    max_health: cfg.max_health,
                    hit_flash: 0.0,
                    trail: VecDeque::with_capacity(cfg.trail_length),
                });
                next_id += 1;
            }
        }
        log::info!("Ball battle: {} balls in {} teams", balls.len(), teams);

        Self {
            seed,
            rng,
            time: 0.0,
            balls,
            slowmo_left: 0.0,
            slowmo_fired: false,
            output: FrameOutput::default(),
        }
    }

    /// Advance by `dt` seconds. Returns the simulated step actually taken
    /// (shorter while slow motion runs).
    pub fn step(&mut self, cfg: &BallConfig, dt: f32) -> f32 {
        self.output.clear();

        if !self.slowmo_fired && self.balls.len() <= cfg.slowmo_threshold {
            self.slowmo_fired = true;
            self.slowmo_left = cfg.slowmo_secs;
            log::debug!("Ball battle slow motion at {} alive", self.balls.len());
        }
        let dt = if self.slowmo_left > 0.0 {
            self.slowmo_left -= dt;
            dt * cfg.slowmo_factor
        } else {
            dt
        };

        self.integrate(cfg, dt);
        self.resolve_contacts(cfg);
        self.bounce_walls(cfg);

        for ball in &mut self.balls {
            if ball.trail.len() >= cfg.trail_length {
                ball.trail.pop_front();
            }
            if cfg.trail_length > 0 {
                ball.trail.push_back(ball.pos);
            }
            ball.hit_flash = (ball.hit_flash - dt * FLASH_DECAY).max(0.0);
        }
        self.balls.retain(Ball::is_alive);
        self.time += dt;
        dt
    }

    fn integrate(&mut self, cfg: &BallConfig, dt: f32) {
        let damping = cfg.damping.powf(dt);
        for b in &mut self.balls {
            b.vel.y += cfg.gravity * dt;
            b.vel *= damping;
            b.pos += b.vel * dt;
        }
    }

    /// Runs after contacts so separation never leaves a ball outside
    fn bounce_walls(&mut self, cfg: &BallConfig) {
        let e = cfg.wall_elasticity;
        for b in &mut self.balls {
            if b.pos.x - b.radius < 0.0 {
                b.pos.x = b.radius;
                b.vel.x = b.vel.x.abs() * e;
            } else if b.pos.x + b.radius > cfg.width {
                b.pos.x = cfg.width - b.radius;
                b.vel.x = -b.vel.x.abs() * e;
            }
            if b.pos.y - b.radius < 0.0 {
                b.pos.y = b.radius;
                b.vel.y = b.vel.y.abs() * e;
            } else if b.pos.y + b.radius > cfg.height {
                b.pos.y = cfg.height - b.radius;
                b.vel.y = -b.vel.y.abs() * e;
            }
        }
    }

    /// Elastic contacts between every overlapping pair, plus the damage rule
    /// for opposing teams
    fn resolve_contacts(&mut self, cfg: &BallConfig) {
        let n = self.balls.len();
        for i in 0..n {
            for j in (i + 1)..n {
                let (head, tail) = self.balls.split_at_mut(j);
                let (a, b) = (&mut head[i], &mut tail[0]);
                let Some((normal, overlap)) = circle_overlap(a.pos, a.radius, b.pos, b.radius)
                else {
                    continue;
                };
                let inv = 1.0 / a.mass + 1.0 / b.mass;

                // Push apart by inverse mass share
                a.pos -= normal * overlap * (1.0 / a.mass) / inv;
                b.pos += normal * overlap * (1.0 / b.mass) / inv;

                let relative = a.vel - b.vel;
                let closing = relative.dot(normal);
                if closing <= 0.0 {
                    continue;
                }
                let j_mag = (1.0 + cfg.ball_elasticity) * closing / inv;
                a.apply_impulse(-normal * j_mag);
                b.apply_impulse(normal * j_mag);

                if a.team == b.team || !a.is_alive() || !b.is_alive() {
                    continue;
                }
                let impact = relative.length();
                if impact < cfg.min_impact_speed {
                    continue;
                }

                let crit_a = self.rng.random_bool(cfg.crit_chance as f64);
                let crit_b = self.rng.random_bool(cfg.crit_chance as f64);
                let crit = |c: bool| if c { cfg.crit_multiplier } else { 1.0 };
                let damage_a = impact * b.mass * cfg.damage_multiplier * crit(crit_a);
                let damage_b = impact * a.mass * cfg.damage_multiplier * crit(crit_b);
                let a_died = a.take_damage(damage_a);
                let b_died = b.take_damage(damage_b);

                a.apply_impulse(-normal * cfg.knockback_force * b.mass);
                b.apply_impulse(normal * cfg.knockback_force * a.mass);

                let pos = a.pos + normal * a.radius;
                let critical = crit_a || crit_b;
                let out = &mut self.output;
                out.event(BattleEvent::BallCollision {
                    pos,
                    impact,
                    a: a.id,
                    b: b.id,
                    critical,
                });
                let color = if critical { palette::GOLD } else { palette::WHITE };
                out.effect(EffectKind::Sparks, pos, color, impact / 20.0);
                out.sound(SoundCue::Hit { critical });

                for (ball, died) in [(&*a, a_died), (&*b, b_died)] {
                    if died {
                        out.event(BattleEvent::BallDeath {
                            id: ball.id,
                            team: ball.team,
                            pos: ball.pos,
                            vel: ball.vel,
                            radius: ball.radius,
                        });
                        let color = team_color(ball.team);
                        out.effect(EffectKind::Explosion, ball.pos, color, ball.radius * 3.0);
                        out.sound(SoundCue::Explosion);
                    }
                }
            }
        }
    }

    /// Living balls per team id
    pub fn alive_by_team(&self, teams: usize) -> Vec<u32> {
        let mut counts = vec![0; teams];
        for b in &self.balls {
            if let Some(c) = counts.get_mut(b.team as usize) {
                *c += 1;
            }
        }
        counts
    }

    /// Over once at most one team has survivors
    pub fn is_over(&self) -> bool {
        let mut teams = self.balls.iter().map(|b| b.team);
        match teams.next() {
            Some(first) => teams.all(|t| t == first),
            None => true,
        }
    }

    /// Surviving team once the battle is over (None while running or if
    /// everyone died)
    pub fn winner(&self) -> Option<u8> {
        if !self.is_over() {
            return None;
        }
        self.balls.first().map(|b| b.team)
    }

    /// Mean position of the living balls (arena center when empty)
    pub fn center_of_action(&self, cfg: &BallConfig) -> Vec2 {
        if self.balls.is_empty() {
            return Vec2::new(cfg.width / 2.0, cfg.height / 2.0);
        }
        self.balls.iter().map(|b| b.pos).sum::<Vec2>() / self.balls.len() as f32
    }

    /// Farthest ball edge from the center of action
    pub fn spread(&self, cfg: &BallConfig) -> f32 {
        if self.balls.len() < 2 {
            return cfg.width / 2.0;
        }
        let center = self.center_of_action(cfg);
        self.balls
            .iter()
            .map(|b| b.pos.distance(center) + b.radius)
            .fold(0.0, f32::max)
    }
}

fn sample(rng: &mut Pcg32, (lo, hi): (f32, f32)) -> f32 {
    if hi > lo { rng.random_range(lo..=hi) } else { lo }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ball(id: u32, team: u8, pos: Vec2, vel: Vec2) -> Ball {
        Ball {
            id,
            team,
            pos,
            vel,
            radius: 20.0,
            mass: 2.0,
            health: 100.0,
            max_health: 100.0,
            hit_flash: 0.0,
            trail: VecDeque::new(),
        }
    }

    fn battle_with(balls: Vec<Ball>) -> BallBattle {
        let cfg = BallConfig::default();
        let mut battle = BallBattle::new(3, &cfg);
        battle.balls = balls;
        battle.slowmo_fired = true;
        battle
    }

    fn weightless() -> BallConfig {
        BallConfig {
            gravity: 0.0,
            damping: 1.0,
            crit_chance: 0.0,
            ..BallConfig::default()
        }
    }

    #[test]
    fn test_spawns_teams_on_separate_lanes() {
        let cfg = BallConfig::default();
        let battle = BallBattle::new(11, &cfg);
        assert_eq!(battle.balls.len(), 10);
        assert_eq!(battle.alive_by_team(2), vec![5, 5]);
        let max_red = battle
            .balls
            .iter()
            .filter(|b| b.team == 0)
            .map(|b| b.pos.x)
            .fold(f32::MIN, f32::max);
        let min_blue = battle
            .balls
            .iter()
            .filter(|b| b.team == 1)
            .map(|b| b.pos.x)
            .fold(f32::MAX, f32::min);
        assert!(max_red < min_blue);
        for b in &battle.balls {
            assert!(b.radius >= 15.0 && b.radius <= 30.0);
            assert!(b.mass >= 1.0 && b.mass <= 3.0);
        }
    }

    #[test]
    fn test_opposing_impact_damages_both() {
        let cfg = weightless();
        let mut battle = battle_with(vec![
            ball(1, 0, Vec2::new(280.0, 500.0), Vec2::new(200.0, 0.0)),
            ball(2, 1, Vec2::new(318.0, 500.0), Vec2::new(-200.0, 0.0)),
        ]);
        battle.step(&cfg, 1.0 / 60.0);
        // impact 400 * other mass 2 * 0.02
        for b in &battle.balls {
            assert!((b.health - 84.0).abs() < 1e-3);
        }
        assert!(battle.balls[0].vel.x < 0.0);
        assert!(battle.balls[1].vel.x > 0.0);
        assert!(matches!(
            battle.output.events.as_slice(),
            [BattleEvent::BallCollision { a: 1, b: 2, critical: false, .. }]
        ));
    }

    #[test]
    fn test_same_team_and_gentle_contacts_are_harmless() {
        let cfg = weightless();
        let mut battle = battle_with(vec![
            ball(1, 0, Vec2::new(280.0, 500.0), Vec2::new(200.0, 0.0)),
            ball(2, 0, Vec2::new(318.0, 500.0), Vec2::new(-200.0, 0.0)),
            ball(3, 0, Vec2::new(100.0, 200.0), Vec2::new(10.0, 0.0)),
            ball(4, 1, Vec2::new(138.0, 200.0), Vec2::new(-10.0, 0.0)),
        ]);
        battle.step(&cfg, 1.0 / 60.0);
        assert!(battle.balls.iter().all(|b| b.health == 100.0));
        assert!(battle.output.events.is_empty());
    }

    #[test]
    fn test_lethal_impact_removes_ball_and_reports_death() {
        let cfg = weightless();
        let mut weak = ball(2, 1, Vec2::new(318.0, 500.0), Vec2::new(-200.0, 0.0));
        weak.health = 1.0;
        let mut battle = battle_with(vec![
            ball(1, 0, Vec2::new(280.0, 500.0), Vec2::new(200.0, 0.0)),
            weak,
        ]);
        battle.step(&cfg, 1.0 / 60.0);
        assert_eq!(battle.balls.len(), 1);
        assert!(battle
            .output
            .events
            .iter()
            .any(|e| matches!(e, BattleEvent::BallDeath { id: 2, team: 1, .. })));
        assert!(battle.is_over());
        assert_eq!(battle.winner(), Some(0));
    }

    #[test]
    fn test_ball_killed_this_step_deals_and_takes_no_more_damage() {
        let cfg = weightless();
        let mut doomed = ball(1, 0, Vec2::new(300.0, 500.0), Vec2::new(200.0, 0.0));
        doomed.health = 1.0;
        let mut battle = battle_with(vec![
            doomed,
            ball(2, 1, Vec2::new(338.0, 500.0), Vec2::new(-200.0, 0.0)),
            // Catches up with the first ball right after it dies
            ball(3, 1, Vec2::new(262.0, 500.0), Vec2::new(200.0, 0.0)),
        ]);
        battle.step(&cfg, 1.0 / 60.0);
        let collisions: Vec<_> = battle
            .output
            .events
            .iter()
            .filter(|e| matches!(e, BattleEvent::BallCollision { .. }))
            .collect();
        assert!(matches!(
            collisions.as_slice(),
            [BattleEvent::BallCollision { a: 1, b: 2, .. }]
        ));
        let trailing = battle.balls.iter().find(|b| b.id == 3).unwrap();
        assert_eq!(trailing.health, 100.0);
        assert!(battle.balls.iter().all(|b| b.id != 1));
    }

    #[test]
    fn test_walls_keep_balls_inside() {
        let cfg = BallConfig::default();
        let mut battle = BallBattle::new(5, &cfg);
        for _ in 0..600 {
            battle.step(&cfg, 1.0 / 60.0);
            for b in &battle.balls {
                assert!(b.pos.x >= b.radius - 1e-3 && b.pos.x <= cfg.width - b.radius + 1e-3);
                assert!(b.pos.y >= b.radius - 1e-3 && b.pos.y <= cfg.height - b.radius + 1e-3);
                assert!(b.trail.len() <= cfg.trail_length);
            }
        }
    }

    #[test]
    fn test_slow_motion_when_few_remain() {
        let cfg = weightless();
        let mut battle = battle_with(vec![
            ball(1, 0, Vec2::new(100.0, 100.0), Vec2::ZERO),
            ball(2, 1, Vec2::new(400.0, 800.0), Vec2::ZERO),
        ]);
        battle.slowmo_fired = false;
        let dt = battle.step(&cfg, 0.1);
        assert!((dt - 0.1 * cfg.slowmo_factor).abs() < 1e-6);
        assert!(battle.slowmo_fired);
        for _ in 0..15 {
            battle.step(&cfg, 0.1);
        }
        assert_eq!(battle.step(&cfg, 0.1), 0.1);
    }

    #[test]
    fn test_camera_helpers() {
        let cfg = BallConfig::default();
        let battle = battle_with(vec![
            ball(1, 0, Vec2::new(100.0, 100.0), Vec2::ZERO),
            ball(2, 1, Vec2::new(300.0, 100.0), Vec2::ZERO),
        ]);
        assert_eq!(battle.center_of_action(&cfg), Vec2::new(200.0, 100.0));
        assert_eq!(battle.spread(&cfg), 120.0);
        let empty = battle_with(Vec::new());
        assert_eq!(empty.center_of_action(&cfg), Vec2::new(300.0, 500.0));
        assert!(empty.is_over());
        assert_eq!(empty.winner(), None);
    }

    #[test]
    fn test_same_seed_same_battle() {
        let cfg = BallConfig::default();
        let mut a = BallBattle::new(99, &cfg);
        let mut b = BallBattle::new(99, &cfg);
        for _ in 0..900 {
            a.step(&cfg, 1.0 / 60.0);
            b.step(&cfg, 1.0 / 60.0);
        }
        assert_eq!(
            serde_json::to_string(&a).unwrap(),
            serde_json::to_string(&b).unwrap()
        );
    }
}
