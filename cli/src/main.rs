mod backend;
mod commands;
mod config;
mod remote;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::backend::open_backend;
use crate::commands::{
    cmd_export, cmd_history, cmd_import, cmd_log, cmd_photo, cmd_sync, cmd_today, load,
};
use crate::config::Config;
use oink_core::LogStore;

#[derive(Parser)]
#[command(
    name = "oink",
    version,
    about = "Log what you eat, one \"food, calories\" at a time",
    long_about = "\n   (\\____/)\n   / @__@ \\\n  (  (oo)  )\n   `-.~~.-'\n  oink: log it before you forget it.\n"
)]
struct Cli {
    /// User id to act for (default: `user_id` from config or `OINK_USER_ID`)
    #[arg(long, global = true)]
    user: Option<i64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Log a food entry, e.g. `oink log pizza, 300`
    Log {
        /// Message in the form "food, calories"
        #[arg(required = true, num_args = 1..)]
        message: Vec<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Log a photo, optionally captioned with "food, calories"
    Photo {
        /// Image file to store with the entry
        path: PathBuf,
        /// Caption in the form "food, calories"
        #[arg(short, long)]
        caption: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show a day's entries and calorie total
    Today {
        /// Date to show (YYYY-MM-DD, today, yesterday; default: today)
        #[arg(long)]
        date: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show everything you've logged
    History {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Export your log as CSV
    Export {
        /// Write to this file instead of stdout
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
    /// Replace your log with an edited CSV export
    Import {
        /// CSV file with header user_id,time,food,calories,photo_path
        file: PathBuf,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Re-read the log from the configured backend
    Sync {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "oink=warn,oink_core=warn".into()),
        )
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn main() {
    init_tracing();
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = Config::load()?;
    let user_id = config.user_id(cli.user)?;

    // Built by hand: the HTTP collaborators block on this runtime from sync code.
    let rt = tokio::runtime::Runtime::new().context("Failed to start async runtime")?;
    let backend = open_backend(&config, rt.handle())?;
    let mut store = LogStore::new(backend);

    match cli.command {
        Commands::Log { message, json } => cmd_log(&mut store, user_id, &message.join(" "), json),
        Commands::Photo {
            path,
            caption,
            json,
        } => cmd_photo(
            &mut store,
            user_id,
            &path,
            caption.as_deref(),
            &config.data_dir.join("photos"),
            json,
        ),
        Commands::Today { date, json } => {
            load(&mut store, !json)?;
            cmd_today(&store, user_id, date, json)
        }
        Commands::History { json } => {
            load(&mut store, !json)?;
            cmd_history(&store, user_id, json)
        }
        Commands::Export { out } => {
            load(&mut store, true)?;
            cmd_export(&store, user_id, out.as_deref())
        }
        Commands::Import { file, json } => {
            load(&mut store, !json)?;
            cmd_import(&mut store, user_id, &file, config.calories_policy, json)
        }
        Commands::Sync { json } => cmd_sync(&mut store, json),
    }
}
