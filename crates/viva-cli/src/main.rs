//! viva CLI — run automated oral-exam sessions from the command line.

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};

use viva_core::error::SessionError;

mod commands;

/// Exit status after Ctrl-C, following the shell convention for SIGINT.
const EXIT_INTERRUPTED: i32 = 130;

#[derive(Parser)]
#[command(name = "viva", version, about = "Automated oral-exam (viva) sessions")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a viva session over a plain-text source
    Run {
        /// Plain-text file with the material to be examined on
        #[arg(long)]
        source: PathBuf,

        /// Number of questions (1-10). Invalid values fall back to 3
        #[arg(long, default_value = "3")]
        count: String,

        /// Answer mode: voice or text
        #[arg(long, default_value = "voice")]
        mode: String,

        /// Provider name from the config (default: config's default_provider)
        #[arg(long)]
        provider: Option<String>,

        /// Model to use for generation and judging
        #[arg(long)]
        model: Option<String>,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,

        /// Write a JSON session report to this path
        #[arg(long)]
        report: Option<PathBuf>,

        /// Disable spoken output; everything is still printed
        #[arg(long)]
        mute: bool,
    },

    /// Check that text-to-speech works on this machine
    VoiceCheck {
        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// List available models
    ListModels {
        /// Filter to specific provider
        #[arg(long)]
        provider: Option<String>,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Create a starter viva.toml
    Init,
}

#[tokio::main]
async fn main() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("viva=info"));
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Run {
            source,
            count,
            mode,
            provider,
            model,
            config,
            report,
            mute,
        } => {
            commands::run::execute(commands::run::RunOptions {
                source,
                count,
                mode,
                provider,
                model,
                config,
                report,
                mute,
            })
            .await
        }
        Commands::VoiceCheck { config } => commands::voice_check::execute(config).await,
        Commands::ListModels { provider, config } => {
            commands::list_models::execute(provider, config)
        }
        Commands::Init => commands::init::execute(),
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        let code = match e.downcast_ref::<SessionError>() {
            Some(SessionError::Interrupted) => EXIT_INTERRUPTED,
            _ => 1,
        };
        process::exit(code);
    }
}
