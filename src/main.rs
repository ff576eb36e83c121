use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use log::info;
use vending_tycoon::simulation::{GameController, SimConfig};

#[derive(Parser)]
#[command(name = "vending_tycoon")]
#[command(about = "Headless vending machine tycoon simulation")]
struct Cli {
    /// Number of simulation ticks to run
    #[arg(long, default_value = "1000")]
    ticks: u32,

    /// Time delta per tick in seconds
    #[arg(long, default_value = "0.1")]
    delta: f32,

    /// Seed for the random generator
    #[arg(long, default_value = "42")]
    seed: u64,

    /// TOML file overriding the built-in game tunables
    #[arg(long)]
    config: Option<PathBuf>,

    /// Write a save file here when the run finishes
    #[arg(long)]
    save: Option<PathBuf>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => SimConfig::load(path)?,
        None => SimConfig::default(),
    };

    run_headless(config, &cli)
}

/// Run the demo city with the autopilot playing
fn run_headless(config: SimConfig, cli: &Cli) -> Result<()> {
    info!(
        "Running vending tycoon: {} ticks, delta {}s, seed {}",
        cli.ticks, cli.delta, cli.seed
    );

    let mut game = GameController::demo(config, cli.seed).context("building demo city")?;

    info!("Initial state:");
    game.print_summary();
    println!("{}", game.draw_map());

    // Let the autopilot act once per simulated second
    let ticks_per_second = (1.0 / cli.delta).ceil().max(1.0) as u32;
    game.start_simulation();

    for tick in 0..cli.ticks {
        if tick % ticks_per_second == 0 {
            game.autopilot();
        }
        if let Some(report) = game.tick(cli.delta) {
            for machine in &report.breakdowns {
                info!("Tick {}: machine {:?} needs repair", tick, machine);
            }
        }
    }
    game.stop_simulation();

    info!("=== SIMULATION COMPLETE ===");
    game.print_summary();
    println!("{}", game.draw_map());

    if let Some(path) = &cli.save {
        let bytes = game.save()?;
        std::fs::write(path, bytes)
            .with_context(|| format!("writing save to {}", path.display()))?;
        info!("Saved game to {}", path.display());
    }

    Ok(())
}
