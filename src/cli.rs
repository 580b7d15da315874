use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "hearken",
    version,
    about = "Voice-activated command dispatcher: keyword-gated listener with pluggable transcription and action handlers"
)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the listener until terminated (default if no subcommand)
    Listen,

    /// Manage the action registry
    Actions {
        #[command(subcommand)]
        action_command: ActionsCommand,
    },

    /// Load and validate configuration, printing the resolved values
    /// (secrets redacted)
    CheckConfig,
}

#[derive(Subcommand, Debug)]
pub enum ActionsCommand {
    /// Force an immediate one-shot reload and print a summary
    Reload,
}
