//! # Cortex Atlas CLI (`atlas`)
//!
//! ## Usage
//!
//! ```bash
//! atlas --config ./config/atlas.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `atlas init` | Create the SQLite database and job table |
//! | `atlas analyze <path>` | Run the pipeline over a documents file and print the report |
//! | `atlas submit <path> --subject <id>` | Enqueue an analysis job |
//! | `atlas status <id>` | Show a job's status |
//! | `atlas report <id>` | Print a completed job's report |
//! | `atlas worker` | Process queued jobs until stopped |
//! | `atlas serve` | Start the HTTP API |
//!
//! Logs go to stderr; command output goes to stdout.

use anyhow::{bail, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::sync::Arc;

use cortex_atlas::config::{self, Config};
use cortex_atlas::sqlite_store::SqliteJobStore;
use cortex_atlas::worker::{run_workers, Worker};
use cortex_atlas::{input, migrate, server};
use cortex_atlas_core::models::Report;
use cortex_atlas_core::pipeline::Pipeline;
use cortex_atlas_core::store::JobStore;

/// Cortex Atlas: communication-pattern analysis over a subject's documents.
#[derive(Parser)]
#[command(name = "atlas", version, about = "Cortex Atlas — communication-pattern analysis")]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/atlas.toml`. `analyze` falls back to built-in
    /// defaults when the file is missing.
    #[arg(long, global = true, default_value = "./config/atlas.toml")]
    config: PathBuf,

    /// Log output format.
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    /// Increase log verbosity (-v debug, -vv trace). `RUST_LOG` overrides.
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema. Safe to run repeatedly.
    Init,

    /// Run the pipeline locally and print the report as JSON.
    ///
    /// The input file is a JSON list of documents or an object with a
    /// `documents` key.
    Analyze {
        path: PathBuf,

        /// Pretty-print the JSON output.
        #[arg(long)]
        pretty: bool,

        /// Subject id for the report. Defaults to the first document's author.
        #[arg(long)]
        subject: Option<String>,
    },

    /// Enqueue an analysis job and print its id.
    Submit {
        path: PathBuf,

        #[arg(long)]
        subject: String,
    },

    /// Show the status of an analysis job.
    Status { analysis_id: String },

    /// Print the report of a completed analysis job.
    Report {
        analysis_id: String,

        #[arg(long)]
        pretty: bool,
    },

    /// Poll for queued jobs and process them.
    Worker {
        /// Process at most one job, then exit.
        #[arg(long)]
        once: bool,
    },

    /// Start the HTTP API server.
    Serve,
}

fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = match cli.verbose {
        0 => "cortex_atlas=info",
        1 => "cortex_atlas=debug",
        _ => "cortex_atlas=trace",
    };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .init(),
        LogFormat::Json => fmt()
            .json()
            .with_env_filter(env_filter)
            .with_writer(std::io::stderr)
            .init(),
    }
}

fn print_report(report: &Report, pretty: bool) -> Result<()> {
    let out = if pretty {
        serde_json::to_string_pretty(report)?
    } else {
        serde_json::to_string(report)?
    };
    println!("{}", out);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli);

    // Local analysis needs no database; it uses the config file only if present.
    let cfg = match &cli.command {
        Commands::Analyze { .. } => {
            config::load_config(&cli.config).unwrap_or_else(|_| Config::minimal())
        }
        _ => config::load_config(&cli.config)?,
    };

    match cli.command {
        Commands::Analyze {
            path,
            pretty,
            subject,
        } => {
            let documents = input::load_documents(&path)?;
            let subject_id = input::default_subject(subject.as_deref(), &documents);
            let report = Pipeline::new(cfg.pipeline.params()).run(&subject_id, &documents)?;
            print_report(&report, pretty)?;
        }
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Submit { path, subject } => {
            let subject = subject.trim();
            let documents = input::load_documents(&path)?;
            input::validate_submission(subject, &documents)?;
            let store = SqliteJobStore::open(&cfg).await?;
            let analysis_id = store.enqueue(subject, &documents, None).await?;
            println!("{}", analysis_id);
        }
        Commands::Status { analysis_id } => {
            let store = SqliteJobStore::open(&cfg).await?;
            let Some(job) = store.fetch(&analysis_id).await? else {
                bail!("analysis job not found: {}", analysis_id);
            };
            println!("{}: {}", job.analysis_id, job.status);
            if let Some(error) = job.error {
                println!("error: {}", error);
            }
        }
        Commands::Report {
            analysis_id,
            pretty,
        } => {
            let store = SqliteJobStore::open(&cfg).await?;
            let Some(job) = store.fetch(&analysis_id).await? else {
                bail!("analysis job not found: {}", analysis_id);
            };
            match job.report {
                Some(report) => print_report(&report, pretty)?,
                None => bail!("report not available yet (status: {})", job.status),
            }
        }
        Commands::Worker { once } => {
            let store = Arc::new(SqliteJobStore::open(&cfg).await?);
            let worker = Worker::from_config(store, &cfg);
            if once {
                match worker.run_once().await? {
                    Some(id) => println!("Processed {}", id),
                    None => println!("No queued jobs."),
                }
            } else {
                run_workers(Arc::new(worker), cfg.worker.concurrency).await?;
            }
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
    }

    Ok(())
}
