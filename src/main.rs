// SPDX-License-Identifier: GPL-3.0-only

#[macro_use]
extern crate tracing;

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use hikari::controller::parse_mode;
use hikari::{Config, DisplayEngine, DisplayId, Outcome};

#[derive(Parser, Debug)]
#[command(name = "hikari", version, about = "Display power, brightness and resolution control")]
struct Cli {
    /// Configuration file, defaults to the user config directory
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Action,
}

#[derive(Subcommand, Debug)]
enum Action {
    /// List displays
    List {
        #[arg(long)]
        json: bool,
    },
    /// List the distinct modes of a display, best first
    Modes {
        display: DisplayId,
        #[arg(long)]
        json: bool,
    },
    /// Show the active mode of a display
    CurrentMode { display: DisplayId },
    /// Turn a display on or off
    Power {
        display: DisplayId,
        #[arg(value_parser = ["on", "off"])]
        state: String,
    },
    /// Set hardware brightness, 0.0-1.0
    Brightness { display: DisplayId, level: f32 },
    /// Switch a display to WIDTHxHEIGHT@RATE
    Mode { display: DisplayId, mode: String },
    /// Keep running, apply commands from stdin and follow display changes
    Daemon,
}

type LogFilter = tracing_subscriber::reload::Handle<EnvFilter, tracing_subscriber::Registry>;

/// Install the subscriber before anything can log
///
/// `RUST_LOG` wins when set. Otherwise the built-in default is used until
/// the configured filter is known, see [`apply_log_filter`].
fn setup_logs() -> LogFilter {
    use tracing_subscriber::{fmt, layer::SubscriberExt, reload, util::SubscriberInitExt};

    let fmt_layer = fmt::layer().with_target(false).with_writer(std::io::stderr);
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(Config::default().log_filter))
        .unwrap_or_else(|_| EnvFilter::new(format!("warn,{}=info", env!("CARGO_CRATE_NAME"))));
    let (filter_layer, handle) = reload::Layer::new(filter);

    tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt_layer)
        .init();
    handle
}

/// Parse a configured filter directive string
fn config_filter(directives: &str) -> Option<EnvFilter> {
    match EnvFilter::try_new(directives) {
        Ok(filter) => Some(filter),
        Err(e) => {
            warn!(directives, "Ignoring invalid log filter: {e}");
            None
        }
    }
}

/// Switch to the configured filter unless `RUST_LOG` overrides it
fn apply_log_filter(handle: &LogFilter, directives: &str) {
    if std::env::var_os(EnvFilter::DEFAULT_ENV).is_some() {
        return;
    }
    let Some(filter) = config_filter(directives) else {
        return;
    };
    if let Err(e) = handle.reload(filter) {
        warn!("Failed to apply log filter: {e}");
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let log_filter = setup_logs();
    let config = Config::load(cli.config.as_deref());
    apply_log_filter(&log_filter, &config.log_filter);
    debug!(?config, "Starting");

    run(&config, cli.command)
}

/// Engine with a fresh registry snapshot
fn open(config: &Config) -> anyhow::Result<DisplayEngine> {
    let mut engine = hikari::platform::open_engine(config).context("cannot open displays")?;
    engine.refresh();
    Ok(engine)
}

fn run(config: &Config, action: Action) -> anyhow::Result<()> {
    match action {
        Action::Daemon => return hikari::platform::run_daemon(config),
        Action::List { json } => {
            let engine = open(config)?;
            let records = engine.displays();
            if json {
                println!("{}", serde_json::to_string_pretty(records)?);
            } else {
                for record in records {
                    println!(
                        "{:>10}  {:<8} {:<6} {}",
                        record.id,
                        if record.is_builtin { "built-in" } else { "external" },
                        if record.is_active { "active" } else { "off" },
                        record.name
                    );
                }
            }
        }
        Action::Modes { display, json } => {
            let modes = open(config)?.get_modes(display);
            if json {
                println!("{}", serde_json::to_string_pretty(&modes)?);
            } else {
                for mode in modes {
                    println!("{mode}");
                }
            }
        }
        Action::CurrentMode { display } => match open(config)?.current_mode(display) {
            Some(mode) => println!("{mode}"),
            None => anyhow::bail!("display {display} reports no current mode"),
        },
        Action::Power { display, state } => {
            let outcome = open(config)?.set_power(display, state == "on");
            report("power", outcome)?;
        }
        Action::Brightness { display, level } => {
            let mut engine = open(config)?;
            let outcome = if engine.is_builtin(display) {
                engine.set_brightness(display, level)
            } else {
                engine.set_external_brightness(display, level)
            };
            report("brightness", outcome)?;
        }
        Action::Mode { display, mode } => {
            let (width, height, refresh) = parse_mode(&mode)
                .with_context(|| format!("'{mode}' does not look like 1920x1080@60"))?;
            let mut engine = open(config)?;
            let target = engine
                .find_mode(display, width, height, refresh)
                .with_context(|| format!("display {display} does not offer {mode}"))?;
            let outcome = engine.set_mode(display, &target);
            report("mode", outcome)?;
        }
    }
    Ok(())
}

fn report(operation: &str, outcome: Outcome) -> anyhow::Result<()> {
    match outcome {
        Outcome::Applied => {
            println!("{operation}: {outcome}");
            Ok(())
        }
        _ => anyhow::bail!("{operation}: {outcome}"),
    }
}
