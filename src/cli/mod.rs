//! Command-line interface parsing and handling
//!
//! This module handles parsing command-line arguments and executing the appropriate commands.

pub mod cases;
pub mod chat;
pub mod render;
pub mod say;
pub mod seal;

use std::error::Error;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::cli::cases::{run_cases, run_export, CasesCommand};
use crate::cli::chat::run_chat;
use crate::cli::say::run_say;
use crate::cli::seal::{run_seal, run_verify};
use crate::core::config::data::path_display;
use crate::core::config::Config;

#[derive(Parser)]
#[command(name = "verum")]
#[command(version)]
#[command(about = "Forensic chat client with sealed documents and persistent cases")]
#[command(
    long_about = "Verum is a terminal chat client for an OpenAI-compatible model acting as the \
Verum Omnis forensic assistant. Uploaded files and every completed answer are sealed with a \
SHA-512 digest, and conversations are kept as named cases.\n\n\
Environment Variables:\n\
  OPENAI_API_KEY    Your API key (required for chat and say)\n\
  OPENAI_BASE_URL   Custom API base URL (optional, defaults to https://api.openai.com/v1)\n\
  RUST_LOG          Diagnostic log filter written to stderr (default: verum=info)\n\n\
Chat commands:\n\
  /file <path> [text]   Attach a file to the next message\n\
  /action <n>           Send suggested action n from the last answer\n\
  /export <path>        Write the last answer as a sealed PDF (Markdown for .md)\n\
  /reset                Start over with a new case\n\
  /quit                 Leave the session"
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Append the transcript to the specified file
    #[arg(short = 'l', long, global = true)]
    pub log: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start an interactive session (default)
    Chat {
        /// Resume the case with this id
        #[arg(long, conflicts_with = "new_case")]
        case: Option<String>,
        /// Start a new case, optionally named
        #[arg(long, value_name = "NAME", num_args = 0..=1, default_missing_value = "")]
        new_case: Option<String>,
    },
    /// Send a single prompt and print the streamed answer
    Say {
        /// Attach a file to the prompt
        #[arg(short, long)]
        file: Option<PathBuf>,
        #[arg(trailing_var_arg = true)]
        prompt: Vec<String>,
    },
    /// Print the seal and marker for a file
    Seal { path: PathBuf },
    /// Check a file against a SHA-512 digest
    Verify { path: PathBuf, digest: String },
    /// Manage saved cases
    Cases {
        #[command(subcommand)]
        command: CasesCommand,
    },
    /// Write a default config file
    Init {
        /// Overwrite an existing config file
        #[arg(long)]
        force: bool,
    },
    /// Write a case answer as a sealed PDF report
    Export {
        case_id: String,
        /// Output file; a .md extension writes Markdown instead of PDF
        out: PathBuf,
        /// Turn number to export (defaults to the latest document)
        #[arg(long)]
        turn: Option<u64>,
    },
}

fn run_init(force: bool) -> Result<(), Box<dyn Error>> {
    let path = Config::get_config_path()?;
    if Config::init_at(&path, force)? {
        println!("✅ Wrote default config to {}", path_display(&path));
    } else {
        println!(
            "Config already exists at {} (use --force to replace it)",
            path_display(&path)
        );
    }
    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("verum=info"));
    // Ignore the error if a subscriber was already installed.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

pub fn main() -> Result<(), Box<dyn Error>> {
    init_tracing();
    tokio::runtime::Runtime::new()?.block_on(async_main())
}

async fn async_main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();

    match args.command.unwrap_or(Commands::Chat {
        case: None,
        new_case: None,
    }) {
        Commands::Chat { case, new_case } => run_chat(case, new_case, args.log).await,
        Commands::Say { file, prompt } => run_say(prompt, file, args.log).await,
        Commands::Seal { path } => run_seal(&path),
        Commands::Verify { path, digest } => run_verify(&path, &digest),
        Commands::Cases { command } => run_cases(command),
        Commands::Init { force } => run_init(force),
        Commands::Export { case_id, out, turn } => run_export(&case_id, &out, turn),
    }
}
