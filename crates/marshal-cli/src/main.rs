//! `marshal` - inspect event snapshots and simulate offline replay

mod commands;
mod config;
mod simulate;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use commands::SnapshotEngine;
use config::{LogConfig, LogFormat, MarshalConfig};
use marshal_scope::MarshalId;
use simulate::{run_simulator, SimulatorConfig};
use std::path::PathBuf;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

fn snapshot_command(name: &'static str, about: &'static str) -> Command {
    Command::new(name)
        .about(about)
        .arg(
            Arg::new("snapshot")
                .required(true)
                .value_parser(value_parser!(PathBuf))
                .help("Event snapshot JSON file"),
        )
        .arg(
            Arg::new("marshal")
                .long("marshal")
                .short('m')
                .required(true)
                .help("Marshal id to view as"),
        )
}

fn cli() -> Command {
    Command::new("marshal")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Checklist scope resolution and offline sync tools for event marshals")
        .subcommand_required(true)
        .arg(
            Arg::new("config")
                .long("config")
                .short('c')
                .global(true)
                .value_parser(value_parser!(PathBuf))
                .help("TOML configuration file"),
        )
        .arg(
            Arg::new("json")
                .long("json")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Output as JSON"),
        )
        .subcommand(
            Command::new("validate")
                .about("Report invalid scope configurations and items in a snapshot")
                .arg(
                    Arg::new("snapshot")
                        .required(true)
                        .value_parser(value_parser!(PathBuf))
                        .help("Event snapshot JSON file"),
                ),
        )
        .subcommand(
            snapshot_command("tasks", "Show a marshal's task list").arg(
                Arg::new("at")
                    .long("at")
                    .help("Evaluate at this RFC 3339 instant instead of now"),
            ),
        )
        .subcommand(snapshot_command("notes", "Show the notes a marshal can see"))
        .subcommand(snapshot_command("contacts", "Show the contacts a marshal can see"))
        .subcommand(
            Command::new("simulate")
                .about("Replay random offline actions through a flaky link")
                .arg(
                    Arg::new("operations")
                        .long("ops")
                        .default_value("1000")
                        .value_parser(value_parser!(usize))
                        .help("Number of actions to queue"),
                )
                .arg(
                    Arg::new("seed")
                        .long("seed")
                        .default_value("42")
                        .value_parser(value_parser!(u64))
                        .help("Random seed for reproducibility"),
                )
                .arg(
                    Arg::new("failure-rate")
                        .long("failure-rate")
                        .default_value("0.2")
                        .value_parser(value_parser!(f64))
                        .help("Chance a send fails before delivery"),
                )
                .arg(
                    Arg::new("lost-ack-rate")
                        .long("lost-ack-rate")
                        .default_value("0.1")
                        .value_parser(value_parser!(f64))
                        .help("Chance a delivered send loses its acknowledgement"),
                ),
        )
}

fn init_tracing(log: &LogConfig) {
    let filter = EnvFilter::try_from_env("MARSHAL_LOG").unwrap_or_else(|_| EnvFilter::new(&log.level));
    let registry = tracing_subscriber::registry().with(filter);

    match log.format {
        LogFormat::Json => registry
            .with(fmt::layer().json().with_ansi(false).with_writer(std::io::stderr))
            .init(),
        LogFormat::Compact => registry.with(fmt::layer().compact().with_writer(std::io::stderr)).init(),
    }
}

fn required<'a>(args: &'a ArgMatches, name: &str) -> Result<&'a String> {
    args.get_one::<String>(name)
        .with_context(|| format!("missing --{name}"))
}

fn snapshot_path(args: &ArgMatches) -> Result<&PathBuf> {
    args.get_one::<PathBuf>("snapshot").context("missing snapshot path")
}

fn parse_instant(text: &str) -> Result<DateTime<Utc>> {
    let at = DateTime::parse_from_rfc3339(text).with_context(|| format!("invalid instant: {text}"))?;
    Ok(at.with_timezone(&Utc))
}

async fn run(matches: &ArgMatches, config: MarshalConfig) -> Result<bool> {
    let json = matches.get_flag("json");

    match matches.subcommand() {
        Some(("validate", args)) => commands::validate(snapshot_path(args)?, json),
        Some(("tasks", args)) => {
            let snapshot = SnapshotEngine::load(snapshot_path(args)?, config.engine)?;
            let marshal = MarshalId::new(required(args, "marshal")?.as_str());
            let at = args.get_one::<String>("at").map(String::as_str).map(parse_instant).transpose()?;
            commands::tasks(&snapshot, &marshal, at, json).await?;
            Ok(true)
        }
        Some(("notes", args)) => {
            let snapshot = SnapshotEngine::load(snapshot_path(args)?, config.engine)?;
            let marshal = MarshalId::new(required(args, "marshal")?.as_str());
            commands::notes(&snapshot, &marshal, json).await?;
            Ok(true)
        }
        Some(("contacts", args)) => {
            let snapshot = SnapshotEngine::load(snapshot_path(args)?, config.engine)?;
            let marshal = MarshalId::new(required(args, "marshal")?.as_str());
            commands::contacts(&snapshot, &marshal, json).await?;
            Ok(true)
        }
        Some(("simulate", args)) => {
            let simulator = SimulatorConfig {
                seed: args.get_one::<u64>("seed").copied().unwrap_or(42),
                operations: args.get_one::<usize>("operations").copied().unwrap_or(1_000),
                failure_rate: args.get_one::<f64>("failure-rate").copied().unwrap_or(0.2),
                lost_ack_rate: args.get_one::<f64>("lost-ack-rate").copied().unwrap_or(0.1),
                ..SimulatorConfig::default()
            };
            let report = run_simulator(simulator, config.engine, config.sync).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!("{}", report.generate_text());
            }
            Ok(report.passed())
        }
        _ => Ok(true),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let matches = cli().get_matches();
    let config = MarshalConfig::load(matches.get_one::<PathBuf>("config").map(PathBuf::as_path))?;
    init_tracing(&config.log);

    if !run(&matches, config).await? {
        std::process::exit(1);
    }
    Ok(())
}
