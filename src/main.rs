//! # Bugfix Harness CLI (`bfx`)
//!
//! The `bfx` binary drives one bugfix investigation end to end: starting
//! an incident session, inferring the project data model, searching the
//! remote log corpus for a trace identifier, and filing artifacts under
//! the incident directory.
//!
//! ## Usage
//!
//! ```bash
//! bfx --config ./bugfix.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `bfx start` | Create an incident session and its directory layout |
//! | `bfx analyze` | Infer the project data model from a source tree |
//! | `bfx connect` | Smoke-test the remote log host connection |
//! | `bfx search <trace_id>` | Search remote logs and extract business facts |
//! | `bfx session <bug_id>` | Show a persisted incident session |
//! | `bfx report <bug_id> <file>` | File a report under the incident |

mod analyzer;
mod config;
mod models;
mod remote;
mod searcher;
mod store;

use anyhow::Result;
use chrono::Utc;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use uuid::Uuid;

use crate::analyzer::ProjectAnalyzer;
use crate::models::IncidentSession;
use crate::searcher::LogSearcher;
use crate::store::ArtifactStore;

/// Bugfix Harness CLI — static data-model inference, remote log mining,
/// and incident artifact management.
#[derive(Parser)]
#[command(
    name = "bfx",
    about = "Bugfix Harness — infer a project's data model, mine remote logs, and manage incident artifacts",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Commands that talk to the remote log host require it; the rest
    /// fall back to built-in defaults when it is missing.
    #[arg(long, global = true, default_value = "./bugfix.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Start a new incident session.
    ///
    /// Generates a session id, derives the bug id (from the tracking
    /// URL when given), creates the incident directory layout, and
    /// persists the session record.
    Start {
        /// Tracking-system URL for the bug (used to derive the bug id).
        #[arg(long)]
        bug_url: Option<String>,

        /// Trace identifier correlated with the failure.
        #[arg(long)]
        trace_id: Option<String>,

        /// One-line description of the bug.
        #[arg(long)]
        description: Option<String>,
    },

    /// Analyze a source tree and infer its backing data model.
    ///
    /// Classifies repository and service classes by naming convention,
    /// infers the repository→table mapping, groups services into
    /// business scenarios, and synthesizes query templates.
    Analyze {
        /// Source tree root. Defaults to `[project].root` from config.
        #[arg(long)]
        root: Option<PathBuf>,

        /// Write the inferred configuration to `<root>/bugfix.project.auto.json`.
        #[arg(long)]
        save: bool,

        /// Write the inferred configuration to this path instead.
        #[arg(long)]
        out: Option<PathBuf>,

        /// Also file a copy under this incident's `analysis/` directory.
        #[arg(long)]
        bug_id: Option<String>,
    },

    /// Smoke-test the connection to the remote log host.
    Connect,

    /// Search the remote log corpus for a trace identifier.
    ///
    /// Runs one remote grep over the configured log directory, extracts
    /// business facts from the result, and (with `--bug-id`) persists
    /// the raw log under the incident's `logs/` directory.
    Search {
        /// The trace identifier to search for.
        trace_id: String,

        /// Incident to file the raw log capture under.
        #[arg(long)]
        bug_id: Option<String>,
    },

    /// Show the persisted session record for an incident.
    Session {
        /// Incident identifier (e.g. `bug_4711`).
        bug_id: String,
    },

    /// File a completed report document under an incident.
    Report {
        /// Incident identifier (e.g. `bug_4711`).
        bug_id: String,

        /// Path to the report document to file.
        file: PathBuf,
    },
}

/// 12-character lowercase session identifier.
fn generate_session_id() -> String {
    Uuid::new_v4().simple().to_string()[..12].to_string()
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Start {
            bug_url,
            trace_id,
            description,
        } => {
            let cfg =
                config::load_config(&cli.config).unwrap_or_else(|_| config::Config::minimal());
            let session_id = generate_session_id();
            let bug_id = store::derive_bug_id(&session_id, bug_url.as_deref());

            let now = Utc::now();
            let session = IncidentSession {
                bug_id: bug_id.clone(),
                session_id: session_id.clone(),
                trace_id,
                bug_url,
                description,
                created_at: now,
                updated_at: now,
            };

            let artifact_store = ArtifactStore::new(&cfg.artifacts.root);
            let session_path = artifact_store.save_session(&session)?;

            println!("Incident session started");
            println!("  Session ID: {}", session_id);
            println!("  Bug ID:     {}", bug_id);
            println!("  Session:    {}", session_path.display());
        }
        Commands::Analyze {
            root,
            save,
            out,
            bug_id,
        } => {
            let cfg =
                config::load_config(&cli.config).unwrap_or_else(|_| config::Config::minimal());
            let root = root.unwrap_or_else(|| cfg.project.root.clone());
            let analyzer = ProjectAnalyzer::new(root);

            let project_config = if save || out.is_some() {
                let (project_config, path) = analyzer.save_config(out.as_deref())?;
                println!("Saved inferred configuration to {}", path.display());
                project_config
            } else {
                analyzer.analyze()?
            };

            println!("Analysis complete");
            println!("  Project:      {}", project_config.project_info.name);
            println!(
                "  Repositories: {}",
                project_config.project_info.total_repositories
            );
            println!(
                "  Services:     {}",
                project_config.project_info.total_services
            );
            println!("  Scenarios:    {}", project_config.business_scenarios.len());

            if let Some(bug_id) = bug_id {
                let artifact_store = ArtifactStore::new(&cfg.artifacts.root);
                let filename = format!(
                    "project_config_{}.json",
                    Utc::now().format("%Y-%m-%dT%H-%M-%S-%3fZ")
                );
                let path = artifact_store.save_analysis(
                    &bug_id,
                    &filename,
                    &serde_json::to_string_pretty(&project_config)?,
                )?;
                println!("  Filed under:  {}", path.display());
            }
        }
        Commands::Connect => {
            let cfg = config::load_config(&cli.config)?;
            let searcher = LogSearcher::new(&cfg);
            let ok = searcher.connect().await;
            searcher.disconnect();
            if !ok {
                anyhow::bail!("remote log host is unreachable");
            }
        }
        Commands::Search { trace_id, bug_id } => {
            let cfg = config::load_config(&cli.config)?;
            let searcher = LogSearcher::new(&cfg);
            let artifact_store = ArtifactStore::new(&cfg.artifacts.root);

            let store_ref = bug_id.as_deref().map(|id| (&artifact_store, id));
            let analysis = searcher.search_and_analyze(&trace_id, store_ref).await;
            searcher.disconnect();

            if let Some(err) = analysis.search_result.error {
                anyhow::bail!("search failed: {}", err);
            }
        }
        Commands::Session { bug_id } => {
            let cfg =
                config::load_config(&cli.config).unwrap_or_else(|_| config::Config::minimal());
            let artifact_store = ArtifactStore::new(&cfg.artifacts.root);
            match artifact_store.load_session(&bug_id) {
                Some(session) => println!("{}", serde_json::to_string_pretty(&session)?),
                None => println!("No session found for {}", bug_id),
            }
        }
        Commands::Report { bug_id, file } => {
            let cfg =
                config::load_config(&cli.config).unwrap_or_else(|_| config::Config::minimal());
            let content = std::fs::read_to_string(&file)
                .map_err(|e| anyhow::anyhow!("Failed to read report {}: {}", file.display(), e))?;
            let filename = file
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| "report.md".to_string());

            let artifact_store = ArtifactStore::new(&cfg.artifacts.root);
            let path = artifact_store.save_report(&bug_id, &filename, &content)?;
            println!("Report filed: {}", path.display());
        }
    }

    Ok(())
}
