//! Waymark Command-Line Tool
//!
//! Inspects and repairs file-backed applied state. Migrations themselves are
//! code owned by the embedding application, so this tool never executes
//! them.

mod commands;
mod error;
mod formatter;
mod manifest;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use formatter::OutputFormat;
use waymark_core::{CachePolicy, FileStore, FileStoreConfig};

/// Waymark Command-Line Tool
#[derive(Parser, Debug)]
#[command(name = "waymark")]
#[command(version, about = "Inspect and repair applied migration state")]
pub struct Args {
    /// Path of the state document
    #[arg(short, long, env = "WAYMARK_STATE")]
    pub state: PathBuf,

    /// Output format
    #[arg(long, default_value = "table", value_enum)]
    pub format: OutputFormat,

    /// Re-read the state file on every access instead of caching it
    #[arg(long)]
    pub reload: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Show recorded identifiers, and the pending ones if a manifest is given
    Status {
        /// Ordered migration identifiers, one per line
        #[arg(short, long)]
        manifest: Option<PathBuf>,
    },

    /// Validate recorded history against a manifest without applying anything
    Check {
        /// Ordered migration identifiers, one per line
        #[arg(short, long)]
        manifest: PathBuf,
    },

    /// Record an identifier as applied without executing anything
    Mark {
        /// Identifier to record
        id: String,
    },
}

fn main() -> ExitCode {
    // Logs go to stderr so formatted output stays parseable.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "waymark_cli=info,waymark_core=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let formatter = formatter::create_formatter(args.format);

    match run(args, &*formatter) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{}", formatter.format_error(&e.to_string()));
            ExitCode::from(e.exit_code())
        }
    }
}

fn run(args: Args, formatter: &dyn formatter::Formatter) -> Result<ExitCode, error::Error> {
    let policy = if args.reload {
        CachePolicy::Reload
    } else {
        CachePolicy::Retain
    };
    let store = FileStore::open(FileStoreConfig::new(&args.state).with_cache_policy(policy));

    tracing::debug!(state = %args.state.display(), ?policy, "opened state store");

    match args.command {
        Command::Status { manifest: path } => {
            let ids = path.as_deref().map(manifest::load).transpose()?;
            let status = commands::status(&store, ids.as_deref())?;
            println!("{}", formatter.format_status(&status));
            Ok(ExitCode::SUCCESS)
        }
        Command::Check { manifest: path } => {
            let status = commands::check(&store, &path)?;
            println!("{}", formatter.format_status(&status));
            Ok(ExitCode::from(status.exit_code()))
        }
        Command::Mark { id } => {
            commands::mark(&store, &id)?;
            tracing::info!(migration = %id, "identifier recorded");
            println!("{}", formatter.format_recorded(&id));
            Ok(ExitCode::SUCCESS)
        }
    }
}
