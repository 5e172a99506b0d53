use std::path::PathBuf;

use clap::{Parser, Subcommand};
use rainalert_core::LanguagePreference;

/// Daily rain alerts for subscribed farmers.
///
/// Connection settings come from the environment (or `.env`); see
/// `RAINALERT_PROFILE` for profile-prefixed keys.
#[derive(Parser, Debug)]
#[command(name = "rainalert", version, about = "Rain alert scheduler and dispatcher")]
pub struct CliArgs {
    /// Load subscriptions from a JSON file instead of PostgreSQL
    #[arg(long, global = true, env = "RAINALERT_SUBSCRIPTIONS")]
    pub subscriptions: Option<PathBuf>,

    /// Log messages instead of sending them
    #[arg(long, global = true)]
    pub dry_run: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start the daily scheduler and the admin HTTP server
    Serve {
        /// Do not start daily firing until POST /alerts/start
        #[arg(long)]
        paused: bool,
    },
    /// Run the pipeline once and print the run report as JSON
    Trigger,
    /// Print a sample alert message
    Render {
        /// hi, en or both
        #[arg(long, default_value = "hi")]
        language: LanguagePreference,

        /// Location label shown in the message
        #[arg(long, default_value = "Nashik")]
        location: String,
    },
}
