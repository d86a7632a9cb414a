//! Command-line argument parsing for Plaza.

use std::path::PathBuf;

use clap::Parser;

use crate::Config;

/// Plaza command-line arguments.
///
/// CLI values override settings loaded from `config.ron`.
#[derive(Parser, Debug, Default)]
#[command(name = "plaza", about = "Plaza spatial presence engine")]
pub struct CliArgs {
    /// Realm template JSON to load instead of the built-in starter realm.
    #[arg(long)]
    pub template: Option<PathBuf>,

    /// Proximity threshold in cells.
    #[arg(long)]
    pub proximity_threshold: Option<f32>,

    /// Remote player liveness timeout in seconds.
    #[arg(long)]
    pub liveness_timeout: Option<u32>,

    /// Maximum local move messages per second.
    #[arg(long)]
    pub send_rate: Option<u32>,

    /// Log level (error, warn, info, debug, trace).
    #[arg(long)]
    pub log_level: Option<String>,

    /// Path to config directory (overrides default location).
    #[arg(long)]
    pub config: Option<PathBuf>,
}

impl Config {
    /// Apply CLI overrides to a loaded config.
    pub fn apply_cli_overrides(&mut self, args: &CliArgs) {
        if let Some(ref path) = args.template {
            self.world.template_path = Some(path.clone());
        }
        if let Some(threshold) = args.proximity_threshold {
            self.proximity.threshold_cells = threshold;
        }
        if let Some(secs) = args.liveness_timeout {
            self.presence.liveness_timeout_secs = secs;
        }
        if let Some(rate) = args.send_rate {
            self.network.move_send_rate_hz = rate;
        }
        if let Some(ref level) = args.log_level {
            self.debug.log_level = level.clone();
        }
    }
}
