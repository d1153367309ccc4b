mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "tryit-cli")]
#[command(about = "Try It CLI - Run and trace code files with the local execution engine", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a source file and print its output
    Run {
        /// Path to the source file
        file: PathBuf,

        /// Language (cpp, python); inferred from the file extension by default
        #[arg(short, long)]
        language: Option<String>,
    },

    /// Trace a Python file and print the recorded execution steps
    Trace {
        /// Path to the Python source file
        file: PathBuf,

        /// Print the raw JSON payload instead of a summary
        #[arg(long, default_value = "false")]
        json: bool,
    },

    /// Check that the host has the toolchain the engine needs
    Doctor,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run { file, language } => {
            commands::run_file(&file, language.as_deref()).await?;
        }
        Commands::Trace { file, json } => {
            commands::trace_file(&file, json).await?;
        }
        Commands::Doctor => {
            commands::doctor().await?;
        }
    }

    Ok(())
}
