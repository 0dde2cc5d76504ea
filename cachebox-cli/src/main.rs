//! CacheBox CLI - Command-line interface
//!
//! Drives a scripted owner session against an asset catalog, and exposes the
//! text encryption utility.

mod commands;
mod error;

use std::path::PathBuf;
use std::process::ExitCode;

use cachebox::config::ConfigFile;
use cachebox::logging::init_logging;
use clap::{Parser, Subcommand};

use crate::commands::session::SessionArgs;
use crate::error::CliError;

#[derive(Debug, Parser)]
#[command(name = "cachebox", version, about = "Per-owner resource cache boxes")]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Configuration file (defaults to ~/.config/cachebox/config.ini)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run one owner lifecycle against a catalog and report the ledger
    Session(SessionArgs),

    /// Encrypt text and print it as base64
    Encrypt {
        /// AES-256 key as 64 hex characters
        #[arg(long)]
        key: String,

        /// Text to encrypt
        text: String,
    },

    /// Decrypt base64 produced by `encrypt`
    Decrypt {
        /// AES-256 key as 64 hex characters
        #[arg(long)]
        key: String,

        /// Base64 cipher text
        cipher: String,
    },
}

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<(), CliError> {
    let cli = Cli::parse();
    let config = ConfigFile::load(cli.config.as_deref())?;

    let mut logging = config.logging.clone();
    if cli.verbose {
        logging = logging.with_level("debug");
    }
    let _logging = init_logging(&logging)?;

    match cli.command {
        Commands::Session(args) => commands::session::run(args, &config),
        Commands::Encrypt { key, text } => commands::crypt::encrypt(&key, &text),
        Commands::Decrypt { key, cipher } => commands::crypt::decrypt(&key, &cipher),
    }
}
