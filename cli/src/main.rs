//! Theory-of-Mind Simulator CLI
//!
//! Runs the bundled scenarios and prints what each agent did, what it earned
//! and how beliefs moved.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tom_simulator_core_rs::scenarios::{model_inference, prisoners_dilemma};
use tom_simulator_core_rs::{StepOptions, StepRecord, World, WorldConfig};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

mod config;

/// Command line arguments
#[derive(Parser, Debug)]
#[command(name = "tom-sim")]
#[command(about = "Recursive theory-of-mind multiagent simulator")]
struct Args {
    /// World configuration file (TOML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Random seed (overrides the configuration file)
    #[arg(long, global = true)]
    seed: Option<u64>,

    /// Print each step record as a JSON line
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Iterated prisoner's dilemma, for one horizon or a sweep over 0..=4
    Dilemma {
        /// Planning horizon (sweeps every horizon when omitted)
        #[arg(long)]
        horizon: Option<u32>,

        /// Steps per game
        #[arg(long, default_value_t = prisoners_dilemma::NUM_STEPS)]
        steps: usize,
    },

    /// Inference of another agent's reward model from its moves
    Inference {
        /// Number of steps
        #[arg(long, default_value_t = model_inference::MAX_STEPS)]
        steps: usize,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let args = Args::parse();
    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    let loaded = args.config.as_ref().map(config::load).transpose()?;

    match args.command {
        Command::Dilemma { horizon, steps } => {
            let config = resolve_config(loaded, args.seed, None);
            run_dilemma(config, horizon, steps, args.json)
        }
        Command::Inference { steps } => {
            let config = resolve_config(loaded, args.seed, Some(model_inference::SEED));
            run_inference(config, steps, args.json)
        }
    }
}

/// Explicit seed, then configuration file, then the scenario's own seed
fn resolve_config(
    loaded: Option<WorldConfig>,
    seed: Option<u64>,
    scenario_seed: Option<u64>,
) -> WorldConfig {
    let from_file = loaded.is_some();
    let mut config = loaded.unwrap_or_default();
    match (seed, scenario_seed) {
        (Some(seed), _) => config.rng_seed = seed,
        (None, Some(seed)) if !from_file => config.rng_seed = seed,
        _ => {}
    }
    config
}

fn print_json(record: &StepRecord) -> Result<(), serde_json::Error> {
    println!("{}", serde_json::to_string(record)?);
    Ok(())
}

fn run_dilemma(
    config: WorldConfig,
    horizon: Option<u32>,
    steps: usize,
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let horizons: Vec<u32> = match horizon {
        Some(h) => vec![h],
        None => (0..=prisoners_dilemma::MAX_HORIZON).collect(),
    };

    let mut world = prisoners_dilemma::build(config, horizons[0])?;
    for h in horizons {
        prisoners_dilemma::restart(&mut world, h)?;
        info!(horizon = h, "starting game");
        println!("====================================");
        println!("Horizon {}", h);

        for t in 0..steps {
            let record = world.step(&StepOptions::default())?;
            if json {
                print_json(&record)?;
                continue;
            }

            println!("---------------------");
            println!("Step {}", t);
            for agent in prisoners_dilemma::AGENTS {
                let decision = prisoners_dilemma::decision_of(&world, agent)?;
                let reward = world.reward(agent, None, world.state())?;
                println!("{}: {} (reward {})", agent, decision, reward);
            }
        }
    }
    Ok(())
}

fn run_inference(
    config: WorldConfig,
    steps: usize,
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    use model_inference::{location_key, ACTOR, CANDIDATE_MODELS, LEARNER};

    let mut world = model_inference::build(config)?;
    print_belief(&world, "Initial")?;

    for i in 0..steps {
        let record = world.step(&model_inference::step_options())?;
        if json {
            print_json(&record)?;
            continue;
        }

        println!("====================================");
        println!("Step: {}", i);
        println!(
            "Current {} loc: {}",
            ACTOR,
            world.get_feature(&location_key(ACTOR))?
        );
        print_belief(&world, "Updated")?;
    }

    let belief = world
        .get_mental_model(LEARNER, ACTOR)?
        .ok_or("belief about actor2 was lost")?;
    let best = CANDIDATE_MODELS
        .iter()
        .max_by(|a, b| {
            belief
                .prob(&a.to_string())
                .total_cmp(&belief.prob(&b.to_string()))
        })
        .copied()
        .unwrap_or_default();
    info!(model = best, "most likely model of {}", ACTOR);
    Ok(())
}

fn print_belief(world: &World, label: &str) -> Result<(), Box<dyn std::error::Error>> {
    use model_inference::{ACTOR, LEARNER};

    println!("{} belief about {}'s model:", label, ACTOR);
    if let Some(belief) = world.get_mental_model(LEARNER, ACTOR)? {
        for (model, p) in belief.iter() {
            println!("  {:.4}\t{}", p, model);
        }
    }
    Ok(())
}
