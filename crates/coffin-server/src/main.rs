//! Halloween coffin controller
//!
//! Main entry point: parses the command line, loads and validates the
//! configuration, builds the rig and dispatches to the [`Controller`].

mod controller;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use coffin_config::CoffinConfig;
use coffin_drivers::{simulated, DriverSet};
use coffin_script::{abort_pair, find, AbortHandle, ScenePicker};
use controller::Controller;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Configuration failure or any other startup error
const EXIT_CONFIG: u8 = 1;
/// Unsafe rig or failed diagnostic
const EXIT_UNSAFE: u8 = 2;

#[derive(Parser, Debug)]
#[command(name = "halloween-coffin")]
#[command(about = "Proximity-triggered Halloween coffin controller")]
#[command(version)]
struct Cli {
    /// Configuration document
    #[arg(short, long, default_value = "configs.yaml")]
    config: PathBuf,

    /// Replace every driver with a logging-only simulation
    #[arg(long)]
    dry_run: bool,

    /// Distance reported by the simulated sensors (with --dry-run)
    #[arg(long, default_value = "300")]
    sim_distance: f64,

    /// Log filter, e.g. `info` or `coffin_script=debug` (overrides RUST_LOG)
    #[arg(long)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Detect guests and play scenes until interrupted
    Monitor,
    /// Run one scene by name
    Run {
        scene: String,
    },
    /// Run one randomly selected scene
    Random,
    /// List the available scenes
    List,
    /// Exercise every driver once and report
    Diagnose,
    /// Detection loop only, no scenes
    Maintenance,
    /// Load and validate the configuration, then exit
    Validate,
}

fn init_logging(level: Option<&str>) {
    let filter = match level {
        Some(level) => EnvFilter::new(level),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.log_level.as_deref());

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::from(EXIT_CONFIG)
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let config = CoffinConfig::load(&cli.config)
        .with_context(|| format!("Invalid configuration {}", cli.config.display()))?;

    match cli.command {
        Command::Validate => {
            println!(
                "{}: {} scenes, random mode {}",
                cli.config.display(),
                config.catalog.len(),
                if config.settings.random_scene_mode { "on" } else { "off" }
            );
            return Ok(ExitCode::SUCCESS);
        }
        Command::List => {
            list_scenes(&config);
            return Ok(ExitCode::SUCCESS);
        }
        _ => {}
    }

    check_scenes(&config, &cli.command)?;

    let drivers = build_rig(&config, cli.dry_run, cli.sim_distance).await?;
    let (abort, _) = abort_pair();
    let controller = Controller::new(config, drivers, abort.clone());
    spawn_interrupt_handler(abort);

    match cli.command {
        Command::Monitor => controller.monitor().await?,
        Command::Maintenance => controller.maintenance().await,
        Command::Run { scene } => {
            let result = controller.run_scene(&scene).await?;
            info!(scene = %result.scene, success = result.is_success(), "Done");
        }
        Command::Random => {
            let result = controller.run_random().await?;
            info!(scene = %result.scene, success = result.is_success(), "Done");
        }
        Command::Diagnose => {
            let report = controller.diagnose().await;
            for check in &report.checks {
                println!("{}", check);
            }
            if report.has_failures() {
                return Ok(ExitCode::from(EXIT_UNSAFE));
            }
        }
        Command::Validate | Command::List => {}
    }

    if controller.is_unsafe() {
        return Ok(ExitCode::from(EXIT_UNSAFE));
    }
    info!("Shut down cleanly");
    Ok(ExitCode::SUCCESS)
}

/// Scene-level checks for the chosen command, done before any hardware opens
fn check_scenes(config: &CoffinConfig, command: &Command) -> Result<()> {
    match command {
        Command::Monitor | Command::Random => {
            ScenePicker::from_settings(&config.settings, &config.catalog)
                .context("Invalid scene settings")?;
        }
        Command::Run { scene } => {
            find(&config.catalog, scene)?;
        }
        _ => {}
    }
    Ok(())
}

async fn build_rig(config: &CoffinConfig, dry_run: bool, sim_distance: f64) -> Result<DriverSet> {
    if dry_run {
        warn!(distance = sim_distance, "Dry run: hardware is simulated");
        return Ok(simulated::rig(sim_distance));
    }
    coffin_drivers::connect(&config.hardware)
        .await
        .context("Could not open hardware")
}

/// Ctrl-C aborts the running scene and stops the detection loop
fn spawn_interrupt_handler(abort: AbortHandle) {
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Interrupt received, restoring idle and shutting down");
                abort.abort();
            }
            Err(e) => error!(error = %e, "Could not listen for Ctrl-C"),
        }
    });
}

fn list_scenes(config: &CoffinConfig) {
    println!("Available scenes:");
    for scene in config.catalog.iter() {
        let section = if scene.alternative { " (alternative)" } else { "" };
        println!(
            "  {:<24} {}{} - {} steps, ~{:.0}s",
            scene.key,
            scene.name,
            section,
            scene.steps.len(),
            scene.expected_duration().as_secs_f64()
        );
        if let Some(description) = &scene.description {
            println!("  {:<24} {}", "", description);
        }
    }

    match &config.settings.random_scene_list {
        Some(list) if !list.is_empty() => println!("Random pool: {}", list.join(", ")),
        _ => println!("Random pool: all scenes"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_commands() {
        let cli = Cli::try_parse_from(["halloween-coffin", "--dry-run", "run", "scare"]).unwrap();
        assert!(cli.dry_run);
        assert!(matches!(cli.command, Command::Run { ref scene } if scene == "scare"));
        assert_eq!(cli.config, PathBuf::from("configs.yaml"));

        let cli = Cli::try_parse_from(["halloween-coffin", "-c", "rig.yaml", "diagnose"]).unwrap();
        assert!(matches!(cli.command, Command::Diagnose));
        assert_eq!(cli.config, PathBuf::from("rig.yaml"));

        assert!(Cli::try_parse_from(["halloween-coffin"]).is_err());
    }

    #[test]
    fn test_scene_checks_run_per_command() {
        let config = CoffinConfig::from_yaml_str("detection: {distance_threshold_near: 50}\n").unwrap();

        assert!(check_scenes(&config, &Command::Maintenance).is_ok());
        assert!(check_scenes(&config, &Command::Diagnose).is_ok());
        assert!(check_scenes(&config, &Command::Monitor).is_err());
        assert!(check_scenes(&config, &Command::Random).is_err());
        assert!(check_scenes(
            &config,
            &Command::Run {
                scene: "ghost".to_string()
            }
        )
        .is_err());
    }
}
