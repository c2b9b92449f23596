//! Blade Bounce headless runner
//!
//! Runs a seeded duel or ball battle without any renderer, logging round and
//! match results. Optionally streams one JSON snapshot per frame to stdout.

#[cfg(not(target_arch = "wasm32"))]
use std::path::PathBuf;

#[cfg(not(target_arch = "wasm32"))]
use clap::{Parser, Subcommand};

#[cfg(not(target_arch = "wasm32"))]
#[derive(Parser)]
#[command(
    name = "blade-bounce",
    version = env!("CARGO_PKG_VERSION"),
    about = env!("CARGO_PKG_DESCRIPTION"),
    long_about = None,
)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[cfg(not(target_arch = "wasm32"))]
#[derive(Subcommand)]
enum Command {
    /// Two sword fighters, best-of-N rounds
    Duel {
        #[arg(long, default_value_t = 1)]
        seed: u64,
        /// Real frames to run (stops early when the match ends)
        #[arg(long, default_value_t = 60 * 60 * 3)]
        ticks: u64,
        /// JSON config file; missing fields take defaults
        #[arg(long)]
        config: Option<PathBuf>,
        /// Each side requests a random skill every N frames (0 = never)
        #[arg(long, default_value_t = 90)]
        skill_every: u64,
        /// Print one JSON snapshot line per frame
        #[arg(long)]
        snapshots: bool,
    },
    /// Teams of physics balls
    Balls {
        #[arg(long, default_value_t = 1)]
        seed: u64,
        /// Real seconds to run (stops early when one team remains)
        #[arg(long, default_value_t = 60.0)]
        seconds: f32,
        #[arg(long)]
        config: Option<PathBuf>,
        #[arg(long)]
        snapshots: bool,
    },
}

#[cfg(not(target_arch = "wasm32"))]
mod runner {
    use std::collections::BTreeMap;
    use std::path::Path;

    use anyhow::{Context, Result};
    use rand::{Rng, SeedableRng};
    use rand_pcg::Pcg32;

    use blade_bounce::BattleConfig;
    use blade_bounce::consts::SIM_DT;
    use blade_bounce::sim::events::{BattleEvent, EffectRequest, FeedbackSink, SoundCue};
    use blade_bounce::sim::{BallBattle, DuelState, RoundPhase, SkillKind, TickInput, tick};
    use blade_bounce::snapshot::{DuelSnapshot, ball_snapshots};

    /// Counts what a renderer and mixer would have been asked to do
    #[derive(Default)]
    struct Tally {
        effects: BTreeMap<String, u64>,
        sounds: u64,
        hits: u64,
        crits: u64,
    }

    impl FeedbackSink for Tally {
        fn spawn_effect(&mut self, effect: &EffectRequest) {
            *self.effects.entry(format!("{:?}", effect.kind)).or_default() += 1;
        }

        fn play_sound(&mut self, _cue: SoundCue) {
            self.sounds += 1;
        }

        fn on_event(&mut self, event: &BattleEvent) {
            if let BattleEvent::Hit { critical, .. } | BattleEvent::BallCollision { critical, .. } =
                event
            {
                self.hits += 1;
                if *critical {
                    self.crits += 1;
                }
            }
        }
    }

    impl Tally {
        fn report(&self) {
            log::info!(
                "{} hits ({} critical), {} sound cues",
                self.hits,
                self.crits,
                self.sounds
            );
            for (kind, count) in &self.effects {
                log::debug!("  {kind}: {count}");
            }
        }
    }

    fn load_config(path: Option<&Path>) -> Result<BattleConfig> {
        match path {
            Some(path) => BattleConfig::load(path)
                .with_context(|| format!("invalid battle config {}", path.display())),
            None => Ok(BattleConfig::default()),
        }
    }

    pub fn duel(
        seed: u64,
        ticks: u64,
        config: Option<&Path>,
        skill_every: u64,
        snapshots: bool,
    ) -> Result<()> {
        let cfg = load_config(config)?;
        let mut state = DuelState::new(seed, &cfg);
        // Separate stream so scripted inputs never perturb the duel's own RNG
        let mut script = Pcg32::seed_from_u64(seed.wrapping_add(1));
        let mut tally = Tally::default();
        log::info!("Duel seed {seed}, best of {}", cfg.round.best_of);

        for frame in 1..=ticks {
            let mut input = TickInput::default();
            if skill_every > 0 && frame % skill_every == 0 {
                for slot in &mut input.skills {
                    *slot = Some(SkillKind::ALL[script.random_range(0..SkillKind::ALL.len())]);
                }
            }
            tick(&mut state, &cfg, &input);
            state.output.dispatch(&mut tally);

            if snapshots {
                let snap = DuelSnapshot::new(&state, state.effective_bounds(&cfg));
                println!("{}", serde_json::to_string(&snap)?);
            }
            if state.phase == RoundPhase::MatchOver {
                break;
            }
        }

        for record in &state.score.rounds {
            log::info!(
                "Round {}: {:?} by {:?} after {} frames",
                record.round,
                record.outcome,
                record.reason,
                record.frames
            );
        }
        match state.score.winner() {
            Some(side) => log::info!("{} wins the match", side.name()),
            None => log::info!("Match unfinished after {} frames", state.frame),
        }
        tally.report();
        Ok(())
    }

    pub fn balls(seed: u64, seconds: f32, config: Option<&Path>, snapshots: bool) -> Result<()> {
        let cfg = load_config(config)?;
        let mut battle = BallBattle::new(seed, &cfg.balls);
        let mut tally = Tally::default();
        let frames = (seconds / SIM_DT).ceil() as u64;

        for _ in 0..frames {
            battle.step(&cfg.balls, SIM_DT);
            battle.output.dispatch(&mut tally);
            if snapshots {
                println!("{}", serde_json::to_string(&ball_snapshots(&battle))?);
            }
            if battle.is_over() {
                break;
            }
        }

        let teams = cfg.balls.team_sizes.len();
        log::info!(
            "Alive per team after {:.1}s: {:?}",
            battle.time,
            battle.alive_by_team(teams)
        );
        match battle.winner() {
            Some(team) => log::info!("Team {team} wins"),
            None if battle.is_over() => log::info!("No survivors"),
            None => log::info!("Battle unfinished"),
        }
        tally.report();
        Ok(())
    }
}

#[cfg(not(target_arch = "wasm32"))]
fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();
    match args.command {
        Command::Duel {
            seed,
            ticks,
            config,
            skill_every,
            snapshots,
        } => runner::duel(seed, ticks, config.as_deref(), skill_every, snapshots),
        Command::Balls {
            seed,
            seconds,
            config,
            snapshots,
        } => runner::balls(seed, seconds, config.as_deref(), snapshots),
    }
}

#[cfg(target_arch = "wasm32")]
fn main() {
    // The library is the product on wasm; there is no runner
}
