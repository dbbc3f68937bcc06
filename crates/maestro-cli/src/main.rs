use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use maestro_core::{SegmentType, SystemClock, TabType, ZoomLevel};
use maestro_runtime::config::{apply_env_overrides, config_path};
use maestro_runtime::logging::init_logging;
use maestro_runtime::{load_config, MaestroConfig};
use std::io;
use std::path::PathBuf;
use std::sync::Arc;

mod session;
mod shell;
mod watch;

use session::CliSession;

#[derive(Parser)]
#[command(name = "maestro")]
#[command(about = "Spaces, segments and tabs on a shared timeline", long_about = None)]
struct Cli {
    /// SQLite database holding the workspace
    #[arg(long, global = true)]
    db: Option<PathBuf>,
    /// Config file (default: $XDG_CONFIG_HOME/maestro/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub(crate) enum Commands {
    /// Manage spaces
    Space {
        #[command(subcommand)]
        action: SpaceCommands,
    },
    /// Manage segments
    Segment {
        #[command(subcommand)]
        action: SegmentCommands,
    },
    /// Manage tabs
    Tab {
        #[command(subcommand)]
        action: TabCommands,
    },
    /// Print the timeline node list as JSON
    Timeline {
        #[arg(long)]
        zoom: Option<ZoomLevel>,
        /// World x of the visible left edge
        #[arg(long, allow_hyphen_values = true)]
        offset: Option<f64>,
    },
    /// Write the workspace as JSON
    Export {
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Replace the workspace with a JSON export
    Import { file: PathBuf },
    Undo,
    Redo,
    /// Read commands from stdin against one in-memory session
    Shell,
    /// Run the live clock and print active segment widths each tick
    Watch {
        #[arg(long, default_value_t = 5)]
        ticks: u64,
    },
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub(crate) enum SpaceCommands {
    Add {
        name: String,
    },
    List,
    Rm {
        space: String,
    },
    Move {
        space: String,
        position: usize,
    },
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub(crate) enum SegmentCommands {
    Start {
        space: String,
        title: String,
        #[arg(long = "type", default_value = "note")]
        kind: SegmentType,
        /// Start time (RFC 3339); a future time schedules the segment
        #[arg(long)]
        at: Option<DateTime<Utc>>,
    },
    End {
        segment: String,
    },
    Pause {
        segment: String,
    },
    Resume {
        segment: String,
    },
    List {
        #[arg(long)]
        space: Option<String>,
        /// Include completed segments
        #[arg(long)]
        all: bool,
    },
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub(crate) enum TabCommands {
    Open {
        space: String,
        title: String,
        #[arg(long = "type", default_value = "terminal")]
        kind: TabType,
        #[arg(long)]
        segment: Option<String>,
    },
    Close {
        tab: String,
    },
    Fav {
        tab: String,
    },
    List {
        space: String,
    },
}

fn load_settings(cli: &Cli) -> Result<MaestroConfig> {
    let path = cli.config.clone().unwrap_or_else(config_path);
    let mut config =
        load_config(&path).with_context(|| format!("Failed to load config {}", path.display()))?;
    apply_env_overrides(&mut config).context("Invalid environment override")?;
    if let Some(db) = &cli.db {
        config.persistence.db_path = Some(db.clone());
    }
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_settings(&cli)?;
    let _log_guard = init_logging(&config.logging);

    match cli.command {
        Commands::Watch { ticks } => watch::run(&config, ticks).await,
        Commands::Shell => {
            let mut session = CliSession::open(&config, Arc::new(SystemClock))?;
            let stdin = io::stdin();
            let stdout = io::stdout();
            shell::run(&mut session, stdin.lock(), &mut stdout.lock())
        }
        command => {
            let mut session = CliSession::open(&config, Arc::new(SystemClock))?;
            let stdout = io::stdout();
            session.execute(command, &mut stdout.lock())?;
            session.save_if_changed()
        }
    }
}
