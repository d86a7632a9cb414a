//! Plaza headless runner.
//!
//! Loads `config.ron` (CLI overrides win), initialises logging, compiles the
//! realm template (a file via `--template`, else the built-in starter realm),
//! and plays a scripted presence session against logging transports.
//!
//! Run with: `cargo run -p plaza-app -- --template realm.json`

mod script;
mod transports;

use std::process::ExitCode;
use std::rc::Rc;

use clap::Parser;
use plaza_config::{CliArgs, Config, default_config_dir};
use plaza_world::{RealmTemplate, World, WorldError, starter_template};
use tracing::{error, info};

fn load_world(config: &Config) -> Result<World, WorldError> {
    let template = match &config.world.template_path {
        Some(path) => {
            info!(path = %path.display(), "loading realm template");
            RealmTemplate::from_path(path)?
        }
        None => {
            info!("using built-in starter realm");
            starter_template()
        }
    };
    let world = World::from_template(&template)?;
    for err in world.load_errors() {
        error!(%err, "realm configuration error");
    }
    Ok(world)
}

fn main() -> ExitCode {
    let args = CliArgs::parse();

    // Resolve config directory
    let config_dir = args.config.clone().unwrap_or_else(default_config_dir);

    // Load or create config, then apply CLI overrides
    let mut config = Config::load_or_create(&config_dir).unwrap_or_else(|e| {
        eprintln!("Failed to load config: {e}, using defaults");
        Config::default()
    });
    config.apply_cli_overrides(&args);

    let log_dir = config_dir.join("logs");
    plaza_log::init_logging(Some(&log_dir), cfg!(debug_assertions), Some(&config));

    info!(
        threshold = config.proximity.threshold_cells,
        liveness_secs = config.presence.liveness_timeout_secs,
        send_rate_hz = config.network.move_send_rate_hz,
        "plaza starting"
    );

    let world = match load_world(&config) {
        Ok(world) => Rc::new(world),
        Err(err) => {
            error!(%err, "failed to load realm");
            return ExitCode::FAILURE;
        }
    };
    info!(rooms = world.rooms().len(), spawn = ?world.spawn(), "realm ready");

    match script::run(world, &config) {
        Ok(summary) => {
            info!(
                events = summary.events,
                ticks = summary.ticks,
                peers = summary.peers,
                "session finished"
            );
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!(%err, "session aborted");
            ExitCode::FAILURE
        }
    }
}
