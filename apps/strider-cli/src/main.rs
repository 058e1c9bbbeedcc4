use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod scenario;
mod sim;

use scenario::Scenario;
use sim::{Simulation, Summary};

/// Built-in scenario used by `demo`.
pub(crate) const DEMO_SCENARIO: &str = include_str!("../scenarios/demo.yaml");

#[derive(Parser)]
#[command(name = "strider-cli", about = "CLI tool for strider character scenarios")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print version and default character settings
    Info,
    /// Run a scenario file and print where everything ended up
    Simulate {
        /// Path to a YAML scenario
        scenario: PathBuf,
        /// Override the scenario's tick count
        #[arg(short, long)]
        ticks: Option<u64>,
        /// Emit the summary as JSON
        #[arg(long)]
        json: bool,
    },
    /// Run the built-in demo scenario
    Demo {
        /// Number of ticks to simulate
        #[arg(short, long)]
        ticks: Option<u64>,
        /// Emit the summary as JSON
        #[arg(long)]
        json: bool,
    },
    /// Parse and validate a scenario file without running it
    Check {
        /// Path to a YAML scenario
        scenario: PathBuf,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    match cli.command {
        Commands::Info => {
            let config = strider_character::CharacterConfig::default();
            println!("strider-cli v{}", env!("CARGO_PKG_VERSION"));
            println!(
                "default character: radius={}, height={}, mass={}",
                config.shape.radius, config.shape.height, config.mass
            );
            println!(
                "limits: max_step_height={}, max_slope_angle={} deg",
                config.max_step_height, config.max_slope_angle
            );
        }
        Commands::Simulate {
            scenario,
            ticks,
            json,
        } => {
            let loaded = Scenario::load(&scenario)?;
            run(&loaded, ticks, json)?;
        }
        Commands::Demo { ticks, json } => {
            let demo = Scenario::from_yaml_str(DEMO_SCENARIO)?;
            run(&demo, ticks, json)?;
        }
        Commands::Check { scenario } => {
            let loaded = Scenario::load(&scenario)?;
            println!(
                "{}: OK ({} statics, {} props, {} characters, {} ticks)",
                scenario.display(),
                loaded.statics.len(),
                loaded.props.len(),
                loaded.characters.len(),
                loaded.ticks
            );
        }
    }

    Ok(())
}

fn run(scenario: &Scenario, ticks: Option<u64>, json: bool) -> anyhow::Result<()> {
    let ticks = ticks.unwrap_or(scenario.ticks);
    let mut sim = Simulation::new(scenario)?;
    let summary = sim.run(ticks)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print_summary(&summary);
    }
    Ok(())
}

fn print_summary(summary: &Summary) {
    println!("Simulated {} ticks", summary.ticks);
    for c in &summary.characters {
        let p = c.position;
        println!(
            "  {}: pos=({:.3}, {:.3}, {:.3}) speed={:.3} grounded={} colliding={}",
            c.name,
            p.x,
            p.y,
            p.z,
            c.velocity.length(),
            c.grounded,
            c.colliding
        );
    }
    for prop in &summary.props {
        let p = prop.position;
        println!(
            "  prop {}: pos=({:.3}, {:.3}, {:.3}) speed={:.3}",
            prop.name,
            p.x,
            p.y,
            p.z,
            prop.velocity.length()
        );
    }
    println!(
        "Contacts: {} started, {} stopped",
        summary.contacts_started, summary.contacts_stopped
    );
}
