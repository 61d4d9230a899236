use std::path::PathBuf;

use clap::{Parser, Subcommand};
use foundation::ids::MarkerId;
use globe::{GlobeConfig, Marker, MarkerAnimation, MarkerAnimationScheduler, StyleRegistry};
use serde_json::json;
use tools::{Scenario, simulate};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "Headless globe interaction simulator")]
struct Args {
    /// JSON engine config (overridden by a config embedded in the scenario)
    #[arg(long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run a scenario and print one JSON snapshot per line
    Run {
        /// Scenario file
        scenario: PathBuf,

        /// Pretty-print the snapshots as a single JSON array
        #[arg(long)]
        pretty: bool,
    },

    /// List the supported map styles
    Styles,

    /// Print marker animation phases for a set of marker sizes
    Phases {
        /// pulse, ping or none
        #[arg(long, default_value = "pulse")]
        mode: String,

        /// Cycle length in milliseconds
        #[arg(long, default_value_t = 1500.0)]
        duration: f64,

        /// Marker sizes
        #[arg(required = true)]
        sizes: Vec<f64>,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = real_main() {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

fn real_main() -> Result<(), String> {
    let args = Args::parse();
    match args.command {
        Command::Run { scenario, pretty } => cmd_run(args.config, scenario, pretty),
        Command::Styles => cmd_styles(),
        Command::Phases {
            mode,
            duration,
            sizes,
        } => cmd_phases(&mode, duration, &sizes),
    }
}

fn load_config(path: Option<PathBuf>) -> Result<GlobeConfig, String> {
    let mut config = match path {
        Some(p) => GlobeConfig::from_path(&p).map_err(|e| format!("load {p:?}: {e}"))?,
        None => GlobeConfig::default(),
    };
    config.apply_env();
    config.validate().map_err(|e| format!("config: {e}"))?;
    Ok(config)
}

fn cmd_run(config: Option<PathBuf>, path: PathBuf, pretty: bool) -> Result<(), String> {
    let scenario = Scenario::from_path(&path).map_err(|e| format!("load {path:?}: {e}"))?;
    let config = match &scenario.config {
        Some(embedded) => embedded.clone(),
        None => load_config(config)?,
    };
    info!(
        scenario = %path.display(),
        style = %config.style,
        duration_ms = scenario.duration_ms,
        "running scenario"
    );

    let snapshots = simulate(&scenario, &config).map_err(|e| e.to_string())?;
    if pretty {
        let payload =
            serde_json::to_string_pretty(&snapshots).map_err(|e| format!("json: {e}"))?;
        println!("{payload}");
    } else {
        for snap in &snapshots {
            let line = serde_json::to_string(snap).map_err(|e| format!("json: {e}"))?;
            println!("{line}");
        }
    }
    info!(snapshots = snapshots.len(), "scenario finished");
    Ok(())
}

fn cmd_styles() -> Result<(), String> {
    let registry = StyleRegistry::builtin();
    for name in registry.names() {
        let rotatable = registry.lookup(name).is_some_and(|s| s.rotatable);
        println!("{name}{}", if rotatable { " (rotatable)" } else { "" });
    }
    Ok(())
}

fn cmd_phases(mode: &str, duration: f64, sizes: &[f64]) -> Result<(), String> {
    let mode: MarkerAnimation = mode.parse()?;
    let mut scheduler = MarkerAnimationScheduler::default();
    scheduler.set_mode(mode);
    if scheduler.set_duration(duration) != duration.floor() {
        return Err(format!("duration must exceed 100ms, got {duration}"));
    }

    let markers: Vec<Marker> = sizes
        .iter()
        .enumerate()
        .map(|(i, &size)| Marker::new(MarkerId::new(i as u64), 0.0, 0.0).with_size(size))
        .collect();
    scheduler.load(&markers);

    let plan: Vec<_> = scheduler
        .plan()
        .into_iter()
        .zip(sizes)
        .map(|((_, phases), size)| {
            json!({
                "size": size,
                "phases": phases
                    .iter()
                    .map(|p| json!({ "width": p.target_width, "ms": p.duration_ms }))
                    .collect::<Vec<_>>(),
            })
        })
        .collect();
    let payload = serde_json::to_string_pretty(&plan).map_err(|e| format!("json: {e}"))?;
    println!("{payload}");
    Ok(())
}
