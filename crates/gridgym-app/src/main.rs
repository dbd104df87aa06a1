use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use gridgym_app::{Session, TerminalView, load_q_tables, load_world_config, save_q_tables};
use gridgym_brain::{
    EnvConfig, GridEnv, LumberjackRewards, QLearningConfig, TrainingConfig, ValueDimension, train,
};
use gridgym_core::{Scenario, Topology, WorldConfig};
use gridgym_render::TextRenderer;
use std::{collections::BTreeMap, path::PathBuf};
use tracing::info;

#[derive(Debug, Parser)]
#[command(name = "gridgym", version, about = "Minimal grid worlds for reinforcement learning")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Watch a scenario play out, optionally driven by trained q-tables.
    Play(PlayArgs),
    /// Train one tabular Q-learner per agent.
    Train(TrainArgs),
    /// Print the built-in scenarios and their default maps.
    Scenarios,
}

#[derive(Debug, Args)]
struct WorldArgs {
    /// goal, lumberjack, zzt or sacred_water.
    scenario: Scenario,
    /// Map file in the bordered text format; the scenario's own map otherwise.
    #[arg(long)]
    map: Option<PathBuf>,
    /// JSON world configuration.
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long)]
    seed: Option<u64>,
    /// Block movement at the edges instead of wrapping around.
    #[arg(long)]
    bounded: bool,
    /// Scatter the map's entities over random cells every episode.
    #[arg(long)]
    random: bool,
    /// Reward dimension for lumberjack worlds.
    #[arg(long, value_enum, default_value_t = DimensionArg::Selfishness)]
    dimension: DimensionArg,
}

#[derive(Debug, Args)]
struct PlayArgs {
    #[command(flatten)]
    world: WorldArgs,
    #[arg(long, default_value_t = 200)]
    steps: u32,
    #[arg(long, default_value_t = 8.0)]
    fps: f32,
    /// Draw off-screen and print the final frame.
    #[arg(long)]
    headless: bool,
    /// q-tables written by `gridgym train`.
    #[arg(long)]
    policy: Option<PathBuf>,
}

#[derive(Debug, Args)]
struct TrainArgs {
    #[command(flatten)]
    world: WorldArgs,
    #[arg(long, default_value_t = 1_000)]
    episodes: u32,
    #[arg(long, default_value_t = 500)]
    max_steps: u32,
    #[arg(long, default_value_t = 0.05)]
    learning_rate: f32,
    #[arg(long, default_value_t = 0.95)]
    discount: f32,
    #[arg(long, default_value_t = 1.0)]
    initial_epsilon: f32,
    #[arg(long, default_value_t = 0.1)]
    final_epsilon: f32,
    /// Where to write the learned q-tables as JSON.
    #[arg(long)]
    output: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum DimensionArg {
    Selfishness,
    Altruism,
    Environmentalism,
}

impl From<DimensionArg> for ValueDimension {
    fn from(value: DimensionArg) -> Self {
        match value {
            DimensionArg::Selfishness => Self::Selfishness,
            DimensionArg::Altruism => Self::Altruism,
            DimensionArg::Environmentalism => Self::Environmentalism,
        }
    }
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    match cli.command {
        Command::Play(args) => play(args),
        Command::Train(args) => run_training(args),
        Command::Scenarios => {
            for scenario in Scenario::ALL {
                println!("{scenario}: {}", scenario.title());
                print!("{}", scenario.default_map().trim_start_matches('\n'));
            }
            Ok(())
        }
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .try_init();
}

fn build_env(args: &WorldArgs, max_steps: u32) -> Result<GridEnv> {
    let mut world = match &args.config {
        Some(path) => load_world_config(path)?,
        None => WorldConfig::default(),
    };
    if args.seed.is_some() {
        world.rng_seed = args.seed;
    }
    if args.bounded {
        world.topology = Topology::Bounded;
    }
    let map = args
        .map
        .as_ref()
        .map(|path| {
            std::fs::read_to_string(path)
                .with_context(|| format!("failed to read map {}", path.display()))
        })
        .transpose()?;
    let env = GridEnv::new(EnvConfig {
        scenario: args.scenario,
        map,
        world,
        max_steps: Some(max_steps),
        random_layout: args.random,
    })
    .with_context(|| format!("failed to build the {} environment", args.scenario))?;
    Ok(if args.scenario == Scenario::Lumberjack {
        env.with_rewards(Box::new(LumberjackRewards::new(args.dimension.into())))
    } else {
        env
    })
}

fn play(args: PlayArgs) -> Result<()> {
    let env = build_env(&args.world, args.steps)?;
    let tables = match &args.policy {
        Some(path) => load_q_tables(path)?,
        None => BTreeMap::new(),
    };
    let trained_agents = tables.len();
    let mut session = Session::new(env, tables)?;
    info!(
        scenario = args.world.scenario.name(),
        trained_agents,
        brains = ?session.brain_kinds(),
        "starting play session"
    );
    let view = TerminalView::new(
        TextRenderer::for_scenario(args.world.scenario),
        args.fps,
        args.steps,
        args.headless,
    );
    view.run(&mut session)
}

fn run_training(args: TrainArgs) -> Result<()> {
    let mut env = build_env(&args.world, args.max_steps)?;
    let config = TrainingConfig {
        episodes: args.episodes,
        max_steps: args.max_steps,
        q: QLearningConfig {
            learning_rate: args.learning_rate,
            discount_factor: args.discount,
            initial_epsilon: args.initial_epsilon,
            epsilon_decay: args.initial_epsilon / (args.episodes.max(2) as f32 / 2.0),
            final_epsilon: args.final_epsilon,
        },
    };
    let outcome = train(&mut env, &config).context("training failed")?;

    let window = (args.episodes as usize / 10).max(1);
    for uid in env.agent_uids() {
        let states = outcome
            .trainers
            .get(&uid)
            .map_or(0, |trainer| trainer.states_seen());
        let mean = outcome.recent_mean_return(uid, window).unwrap_or(0.0);
        println!("agent {uid}: {states} states, mean return {mean:.2} over last {window} episodes");
    }
    if let Some(path) = &args.output {
        save_q_tables(path, &outcome.q_tables())?;
        println!("q-tables written to {}", path.display());
    }
    Ok(())
}
