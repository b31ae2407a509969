//! Robotline CLI - runs a production line definition to completion.
//!
//! Loads a line definition (or the built-in body shop), advances it for the
//! configured number of ticks, logs progress and part outcomes through
//! `tracing`, and prints the final statistics report.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use robotline_core::event::{Event, EventKind};
use robotline_core::query::LineStats;
use robotline_data::{ConfigError, LineDefinition, load_line_definition};

/// Robotline simulation harness
#[derive(Parser, Debug)]
#[command(name = "robotline")]
#[command(about = "Discrete-time production line simulator", long_about = None)]
#[command(version)]
struct Cli {
    /// Line definition file (RON, TOML or JSON), or a directory holding
    /// `line.{ron,toml,json}`. Defaults to the built-in body shop.
    #[arg(short, long, env = "ROBOTLINE_CONFIG")]
    config: Option<PathBuf>,

    /// Override the number of advances
    #[arg(short, long)]
    ticks: Option<u64>,

    /// Override the root seed for quality gates
    #[arg(short, long, env = "ROBOTLINE_SEED")]
    seed: Option<u64>,

    /// Default log filter when RUST_LOG is unset
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Emit logs as JSON lines
    #[arg(long)]
    json: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    tracing_subscriber::registry()
        .with(filter)
        .with(cli.json.then(|| fmt::layer().json()))
        .with((!cli.json).then(|| fmt::layer().without_time()))
        .init();

    match run(&cli) {
        Ok(stats) => {
            println!("{stats}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(error = %e, "run failed");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<LineStats, ConfigError> {
    let mut definition = match &cli.config {
        Some(path) => load_line_definition(path)?,
        None => LineDefinition::default(),
    };
    if let Some(ticks) = cli.ticks {
        definition.run.ticks = ticks;
    }
    if let Some(seed) = cli.seed {
        definition.run.seed = seed;
    }

    let mut line = definition.build()?;
    line.event_bus.on(
        EventKind::PartFinished,
        Box::new(|e: &Event| tracing::info!(part = %e.part(), time = e.time(), "part finished")),
    );
    line.event_bus.on(
        EventKind::InspectionFailed,
        Box::new(|e: &Event| tracing::info!(part = %e.part(), time = e.time(), "part scrapped")),
    );

    let spec = &definition.run;
    tracing::info!(
        ticks = spec.ticks,
        dt = spec.dt,
        seed = spec.seed,
        intake = ?spec.intake,
        "simulation started"
    );

    for step in 1..=spec.ticks {
        line.advance(spec.dt)?;
        if spec.report_every > 0 && step % spec.report_every == 0 {
            tracing::info!(
                time = line.elapsed(),
                finished = line.finished_count(),
                in_progress = line.in_progress(),
                awaiting_intake = line.input_backlog_len(),
                "progress"
            );
        }
    }

    let stats = line.snapshot_statistics();
    tracing::info!(
        time = stats.elapsed,
        finished = stats.finished,
        scrapped = stats.total_scrapped(),
        "simulation complete"
    );
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_defaults() {
        let cli = Cli::parse_from(["robotline"]);
        assert!(cli.config.is_none());
        assert_eq!(cli.log_level, "info");
        assert!(!cli.json);
    }

    #[test]
    fn cli_overrides() {
        let cli = Cli::parse_from(["robotline", "--ticks", "100", "--seed", "9", "--json"]);
        assert_eq!(cli.ticks, Some(100));
        assert_eq!(cli.seed, Some(9));
        assert!(cli.json);
    }

    #[test]
    fn default_run_reports_every_part() {
        let cli = Cli::parse_from(["robotline", "--ticks", "80"]);
        let stats = run(&cli).unwrap();
        assert_eq!(stats.elapsed, 80);
        assert_eq!(stats.finished as u64 + stats.total_scrapped(), 5);
    }

    #[test]
    fn missing_config_fails() {
        let cli = Cli::parse_from(["robotline", "--config", "/nonexistent/line.toml"]);
        assert!(matches!(run(&cli), Err(ConfigError::Io(_))));
    }
}
