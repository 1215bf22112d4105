//! Snapreel CLI: record the screen, inspect recordings and export edited cuts.
//!
//! Usage:
//!   snapreel record [OPTIONS]          Record the X11 desktop
//!   snapreel export <INPUT> [OPTIONS]  Trim, crop and composite a recording
//!   snapreel info <INPUT>              Show source media information
//!   snapreel check                     Check system capabilities

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use snapreel_common::{logging::init_logging, AppConfig};

mod commands;

#[derive(Parser)]
#[command(
    name = "snapreel",
    about = "Screen recording with trim, crop and background export",
    version,
    author
)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Record the screen until Ctrl+C or the time limit
    Record {
        /// Directory the recording is saved to (defaults to the downloads directory)
        #[arg(short, long)]
        output_dir: Option<PathBuf>,

        /// Stop automatically after this many seconds
        #[arg(long)]
        seconds: Option<f64>,

        /// Title the file is named after
        #[arg(short, long)]
        title: Option<String>,
    },

    /// Export an edited copy of a recording
    Export(commands::export::ExportArgs),

    /// Show source media information
    Info {
        /// Video file to inspect
        input: PathBuf,

        /// Also write a PNG still of the first frame here
        #[arg(long)]
        still: Option<PathBuf>,

        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Check system capabilities
    Check,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = AppConfig::load();
    let mut logging = config.logging.clone();
    if cli.verbose {
        logging.level = "debug".to_string();
    }
    init_logging(&logging);

    match cli.command {
        Commands::Record {
            output_dir,
            seconds,
            title,
        } => commands::record::run(&config, output_dir, seconds, title).await,
        Commands::Export(args) => commands::export::run(&config, args).await,
        Commands::Info { input, still, json } => commands::info::run(&config, input, still, json).await,
        Commands::Check => commands::check::run(&config).await,
    }
}
