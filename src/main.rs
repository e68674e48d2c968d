//! `subgloss` CLI - Inspect subtitle timing and annotate Japanese text

mod cmd;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use subgloss::config::Config;

#[derive(Parser)]
#[command(name = "subgloss")]
#[command(about = "Timed subtitles with furigana and dictionary glosses")]
#[command(version)]
struct Cli {
    /// Configuration file (default: <config dir>/subgloss/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Output format for annotated text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// Rendered HTML
    #[default]
    Html,
    /// Markup tree as JSON
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// List the entries of an SRT file
    Entries {
        /// SRT file, or - for stdin
        srt: String,

        /// Print entries as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the subtitle active at a playback time
    Active {
        /// SRT file, or - for stdin
        srt: String,

        /// Playback time in seconds
        #[arg(allow_negative_numbers = true)]
        seconds: f64,

        /// Print the entry as JSON
        #[arg(long)]
        json: bool,
    },

    /// Annotate one line of text with readings and glosses
    Annotate {
        /// Subtitle text
        text: String,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Html)]
        format: OutputFormat,
    },

    /// Look up a word in the dictionary
    Lookup {
        /// Word to resolve
        word: String,

        /// Print the full match as JSON
        #[arg(long)]
        json: bool,
    },

    /// Play an SRT file, annotating each subtitle as it becomes active
    Play {
        /// SRT file, or - for stdin
        srt: String,

        /// Start time in seconds
        #[arg(short, long, default_value = "0")]
        start: f64,

        /// Playback speed multiplier
        #[arg(long, default_value = "1.0")]
        speed: f64,

        /// Read playback times (seconds, one per line) from stdin instead of
        /// running a clock
        #[arg(long)]
        stdin_clock: bool,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Html)]
        format: OutputFormat,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr; stdout carries command output
    let filter = EnvFilter::try_from_env("SUBGLOSS_LOG").unwrap_or_else(|_| EnvFilter::new("info"));
    FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Entries { srt, json } => {
            cmd::entries::cmd_entries(&srt, json).await?;
        }
        Commands::Active { srt, seconds, json } => {
            cmd::active::cmd_active(&srt, seconds, json).await?;
        }
        Commands::Annotate { text, format } => {
            let config = Config::load(cli.config.as_deref())?;
            cmd::annotate::cmd_annotate(&config, &text, format).await?;
        }
        Commands::Lookup { word, json } => {
            let config = Config::load(cli.config.as_deref())?;
            cmd::lookup::cmd_lookup(&config, &word, json).await?;
        }
        Commands::Play {
            srt,
            start,
            speed,
            stdin_clock,
            format,
        } => {
            let config = Config::load(cli.config.as_deref())?;
            cmd::play::cmd_play(&config, &srt, start, speed, stdin_clock, format).await?;
        }
    }

    Ok(())
}
