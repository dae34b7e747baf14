//! vocab: personal vocabulary trainer.
//!
//! `vocab start` hosts the JSON API and a dashboard page,
//! default: http://127.0.0.1:3000/
//! `vocab export` / `vocab import` move the vocab table to and from CSV.

mod config;
mod dashboard;
mod db;
mod routes;
mod schedule;
mod transfer;

use clap::{Parser, Subcommand};
use config::{Config, DEFAULT_HOST, DEFAULT_PORT};
use routes::AppState;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use transfer::TransferError;

#[derive(Parser, Debug)]
#[command(name = "vocab", version, about = "Vocabulary flashcards with spaced practice")]
struct Cli {
    /// SQLite database file (default: ~/.vocab/vocab.db)
    #[arg(long, global = true, env = "VOCAB_DB_PATH")]
    db_path: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Starts the vocab web application.
    Start {
        /// Address to bind
        #[arg(long, env = "VOCAB_HOST", default_value = DEFAULT_HOST)]
        host: String,
        /// Port on which to serve the application
        #[arg(long, env = "VOCAB_PORT", default_value_t = DEFAULT_PORT)]
        port: u16,
    },

    /// Export vocab to a CSV.
    Export {
        /// File path to export the CSV
        #[arg(long, default_value = "vocab.csv")]
        file: PathBuf,
    },

    /// Import vocab from a CSV.
    Import {
        /// File path to the import CSV
        #[arg(long)]
        file: PathBuf,
        /// Delete all existing vocab before importing
        #[arg(long)]
        clean: bool,
    },
}

#[derive(Error, Debug)]
pub enum CliError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{}: {source}", .path.display())]
    File {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Database error: {0}")]
    Db(#[from] rusqlite::Error),

    #[error(transparent)]
    Transfer(#[from] TransferError),
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenv::dotenv().ok();
    env_logger::init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{}", e);
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let config = Config::resolve(cli.db_path)?;

    match cli.command {
        Command::Start { host, port } => serve(&config, &host, port).await,
        Command::Export { file } => {
            let count = export_file(&config, &file)?;
            println!("Exported {} entries to {}", count, file.display());
            Ok(())
        }
        Command::Import { file, clean } => {
            let count = import_file(&config, &file, clean)?;
            println!("Imported {} entries from {}", count, file.display());
            Ok(())
        }
    }
}

async fn serve(config: &Config, host: &str, port: u16) -> Result<(), CliError> {
    let database = Arc::new(config.open_db()?);

    let state = Arc::new(AppState {
        db: database,
        start_time: Instant::now(),
    });
    let app = routes::router(state);

    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    log::info!("Vocab service listening on http://{}", addr);

    axum::serve(listener, app).await?;
    Ok(())
}

fn export_file(config: &Config, path: &Path) -> Result<usize, CliError> {
    let db = config.open_db()?;
    let file = File::create(path).map_err(|source| CliError::File {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(transfer::export(&db, BufWriter::new(file))?)
}

fn import_file(config: &Config, path: &Path, clean: bool) -> Result<usize, CliError> {
    let file = File::open(path).map_err(|source| CliError::File {
        path: path.to_path_buf(),
        source,
    })?;
    let db = config.open_db()?;
    let reader = BufReader::new(file);
    let count = if clean {
        transfer::import_clean(&db, reader)?
    } else {
        transfer::import(&db, reader)?
    };
    Ok(count)
}
