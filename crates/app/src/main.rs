use std::path::Path;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use course_core::Clock;
use services::AppServices;

mod cli;
mod commands;
mod config;

use config::AppConfig;

/// Exit code for a command that ran and was rejected.
const EXIT_REJECTED: i32 = 1;
/// Exit code for a failure before any command ran.
const EXIT_SETUP: i32 = 2;

#[tokio::main]
async fn main() {
    match run().await {
        Ok(code) => std::process::exit(code),
        Err(error) => {
            eprintln!("courseline error: {error:#}");
            std::process::exit(EXIT_SETUP);
        }
    }
}

async fn run() -> anyhow::Result<i32> {
    let cli = cli::Cli::parse();
    let config = AppConfig::load_with_dotenv().context("failed to load configuration")?;
    init_tracing(&config, cli.quiet, cli.verbose)?;

    let db_url = cli.db.clone().unwrap_or_else(|| config.database_url.clone());
    prepare_sqlite_file(&db_url)?;

    let clock = Clock::default();
    let app = AppServices::new_sqlite(&db_url, config.max_connections, clock)
        .await
        .with_context(|| format!("failed to open database {db_url}"))?;

    let outcome = commands::dispatch(cli.command, &app, clock, cli.user.as_deref()).await;
    let (body, code) = match outcome {
        Ok(body) => (body, 0),
        Err(err) => {
            tracing::debug!(status = err.status_code(), "command rejected");
            (serde_json::to_value(&err)?, EXIT_REJECTED)
        }
    };
    println!("{}", serde_json::to_string_pretty(&body)?);
    Ok(code)
}

fn init_tracing(config: &AppConfig, quiet: bool, verbose: bool) -> anyhow::Result<()> {
    let filter = if quiet {
        EnvFilter::new("error")
    } else if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_env("COURSELINE_LOG")
            .or_else(|_| EnvFilter::try_new(&config.log_level))
            .unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|error| anyhow::anyhow!("failed to initialize tracing subscriber: {error}"))?;

    Ok(())
}

/// Path of the database file behind a `sqlite:` URL, or `None` for in-memory databases.
fn sqlite_file_path(db_url: &str) -> Option<&str> {
    let rest = db_url
        .strip_prefix("sqlite://")
        .or_else(|| db_url.strip_prefix("sqlite:"))?;
    let (path, query) = rest.split_once('?').unwrap_or((rest, ""));
    let path = path.strip_prefix("file:").unwrap_or(path);
    if path.is_empty() || path == ":memory:" || query.contains("mode=memory") {
        return None;
    }
    Some(path)
}

/// Create a file-backed database and its directory if missing.
fn prepare_sqlite_file(db_url: &str) -> anyhow::Result<()> {
    let Some(path) = sqlite_file_path(db_url) else {
        return Ok(());
    };
    let path = Path::new(path);
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    if !path.exists() {
        std::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(path)
            .with_context(|| format!("failed to create {}", path.display()))?;
    }
    Ok(())
}
