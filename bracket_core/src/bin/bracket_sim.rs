use std::{path::PathBuf, process::ExitCode, sync::Arc};

use bevy::prelude::*;
use clap::Parser;
use rand::{rngs::SmallRng, Rng, SeedableRng};
use tracing::{error, info, warn};

use bracket_core::{
    build_bracket_app, load_bracket_config_from_env, run_tick, Activity, ActivityFlags, Agent,
    AgentBundle, AgentId, BracketConfig, BracketMetrics, BracketTables, CharacterClass,
    Controller, Faction, Level, PendingResetQueue, PerFaction, ResetHooks, SocialFacts,
};

#[derive(Parser, Debug)]
#[command(author, version, about = "Offline driver for the level bracket balancer", long_about = None)]
struct Args {
    /// Bots spawned per faction
    #[arg(long, default_value_t = 500)]
    bots: u32,

    /// Human characters spawned per faction
    #[arg(long, default_value_t = 20)]
    humans: u32,

    /// Simulated wall time to run (seconds)
    #[arg(long, default_value_t = 1800)]
    seconds: u64,

    /// Host tick length (milliseconds)
    #[arg(long, default_value_t = 1000)]
    tick_ms: u32,

    /// Seed for the synthetic population and activity churn
    #[arg(long, default_value_t = 1)]
    seed: u64,

    /// Bracket config file (defaults to BRACKET_CONFIG_PATH or the builtin)
    #[arg(long)]
    config: Option<PathBuf>,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let config = match &args.config {
        Some(path) => match BracketConfig::from_file(path) {
            Ok(config) => Arc::new(config),
            Err(err) => {
                warn!(
                    target: "level_brackets::sim",
                    path = %path.display(),
                    error = %err,
                    "sim.config_unreadable; using builtin"
                );
                BracketConfig::builtin()
            }
        },
        None => load_bracket_config_from_env().0,
    };

    let mut app = match build_bracket_app(config, SocialFacts::default(), ResetHooks::default()) {
        Ok(app) => app,
        Err(err) if err.is_fatal() => {
            error!(target: "level_brackets::sim", error = %err, "sim.config_fatal");
            return ExitCode::FAILURE;
        }
        Err(err) => {
            warn!(
                target: "level_brackets::sim",
                error = %err,
                "sim.config_rejected; using builtin"
            );
            match build_bracket_app(
                BracketConfig::builtin(),
                SocialFacts::default(),
                ResetHooks::default(),
            ) {
                Ok(app) => app,
                Err(err) => {
                    error!(target: "level_brackets::sim", error = %err, "sim.builtin_rejected");
                    return ExitCode::FAILURE;
                }
            }
        }
    };

    let mut rng = SmallRng::seed_from_u64(args.seed);
    spawn_population(&mut app, &args, &mut rng);

    let tick_ms = args.tick_ms.max(1);
    let ticks = args.seconds.saturating_mul(1000) / u64::from(tick_ms);
    info!(
        target: "level_brackets::sim",
        bots = args.bots,
        humans = args.humans,
        ticks,
        tick_ms,
        "sim.started"
    );

    for _ in 0..ticks {
        churn_activity(&mut app, &mut rng);
        run_tick(&mut app, tick_ms);
    }

    report(&mut app);
    ExitCode::SUCCESS
}

fn spawn_population(app: &mut App, args: &Args, rng: &mut SmallRng) {
    let mut next_id = 1u64;
    for faction in Faction::ALL {
        let spawns = (0..args.bots)
            .map(|_| Controller::RandomBot)
            .chain((0..args.humans).map(|_| Controller::Human));
        for controller in spawns {
            let class = CharacterClass::ALL[rng.gen_range(0..CharacterClass::ALL.len())];
            let level = match class.hard_floor() {
                Some(floor) => rng.gen_range(floor..=80),
                None => rng.gen_range(1..=80),
            };
            let agent = Agent {
                id: AgentId(next_id),
                name: format!("{faction}{next_id}"),
                class,
                faction,
                controller,
                guild: None,
            };
            next_id += 1;
            app.world.spawn(AgentBundle::new(agent, level));
        }
    }
}

/// Flip a small share of characters in and out of combat so some moves defer.
fn churn_activity(app: &mut App, rng: &mut SmallRng) {
    let mut query = app.world.query::<&mut Activity>();
    for mut activity in query.iter_mut(&mut app.world) {
        if rng.gen_bool(0.02) {
            activity.flags.toggle(ActivityFlags::IN_COMBAT);
        }
    }
}

fn report(app: &mut App) {
    let tables = app.world.resource::<BracketTables>().clone();
    let mut counts: PerFaction<Vec<u32>> =
        PerFaction::from_fn(|faction| vec![0; tables.table(faction).len()]);

    let mut query = app.world.query::<(&Agent, &Level)>();
    for (agent, level) in query.iter(&app.world) {
        if !agent.controller.is_managed() {
            continue;
        }
        if let Some(index) = tables.table(agent.faction).resolve(level.value) {
            counts[agent.faction][index] += 1;
        }
    }

    for faction in Faction::ALL {
        let table = tables.table(faction);
        for (index, bracket) in table.brackets().iter().enumerate() {
            info!(
                target: "level_brackets::sim",
                %faction,
                range = index + 1,
                lower = bracket.lower,
                upper = bracket.upper,
                desired_pct = bracket.desired_percent,
                bots = counts[faction][index],
                "sim.distribution"
            );
        }
    }

    let metrics = app.world.resource::<BracketMetrics>();
    info!(
        target: "level_brackets::sim",
        cycles = metrics.cycles,
        immediate = metrics.immediate_resets,
        drained = metrics.drained_resets,
        deferred = metrics.deferred_flags,
        discarded = metrics.discarded_entries,
        pending = app.world.resource::<PendingResetQueue>().len(),
        "sim.finished"
    );
}
