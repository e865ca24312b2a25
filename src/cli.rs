use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "vintage",
    about = "Vintage command-line interface for the vintage-frontend workflow",
    version,
    author
)]
pub struct Cli {
    /// Path to the project directory (defaults to current directory)
    #[arg(short, long, global = true, default_value = ".")]
    pub path: PathBuf,

    /// Settings file (defaults to vintage.toml in the project directory, if present)
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Increase log output (-v debug, -vv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the vintage-frontend generator ("yo" and "generator-vintage-frontend" must be installed globally)
    Init,

    /// Update vintage-cli through npm
    Update,

    /// Update vintage-frontend in the current project
    UpdateProject {
        /// Force update, even if you have the latest version
        #[arg(short, long)]
        force: bool,
    },

    /// Start a project task (development or production)
    Run {
        /// Name of the npm script to run
        #[arg(value_name = "TASK")]
        task: String,
    },

    /// Versions of vintage-cli and of vintage-frontend in the current project
    Version,
}
