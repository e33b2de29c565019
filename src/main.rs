//! # Lift Diagnostics CLI (`liftdx`)
//!
//! ## Usage
//!
//! ```bash
//! liftdx --config ./config/liftdx.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `liftdx summary` | Knowledge base counts and validation accuracy |
//! | `liftdx lookup <code>` | Exact lookup across all categories |
//! | `liftdx context <query>` | Show the context block built for a query |
//! | `liftdx context --full` | Export the whole knowledge base as Markdown |
//! | `liftdx ask "<question>"` | Ask one diagnostic question |
//! | `liftdx chat` | Interactive multi-turn session |
//! | `liftdx feedback add` | Record a judgment on an answer |
//! | `liftdx feedback list` | List recorded feedback, newest first |
//! | `liftdx feedback stats` | Accuracy statistics |
//! | `liftdx feedback export` | Export feedback as CSV |
//! | `liftdx serve` | Start the JSON HTTP API |
//!
//! Logging goes to stderr and is controlled by `RUST_LOG`
//! (default `lift_diagnostics=info`).

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use lift_diagnostics::config;
use lift_diagnostics::feedback::FeedbackLedger;
use lift_diagnostics::models::{ConfidenceTier, Judgment};
use lift_diagnostics::{ask, export, lookup, server, stats};

/// Lift Diagnostics CLI: knowledge-grounded fault diagnosis for elevator
/// controllers.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/liftdx.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "liftdx",
    about = "Lift Diagnostics - knowledge-grounded fault diagnosis for elevator controllers",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/liftdx.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show knowledge base counts and validation accuracy.
    Summary,

    /// Look up a code in every category, plus related guides and images.
    Lookup {
        /// Error code, parameter or component code (e.g. `F01 02`, `P0001`, `XTSS`).
        code: String,
    },

    /// Print the knowledge context that would be sent for a query.
    Context {
        /// The technician's question.
        query: Option<String>,

        /// Print the entire knowledge base instead of a per-query selection.
        #[arg(long)]
        full: bool,
    },

    /// Ask one diagnostic question.
    ///
    /// Requires `[engine] provider = "anthropic"` and the API key in the
    /// environment variable named by `engine.api_key_env`.
    Ask {
        /// The technician's question, in German or English.
        question: String,

        /// Send the question without conversation history.
        #[arg(long)]
        no_history: bool,
    },

    /// Start an interactive multi-turn diagnostic session.
    Chat,

    /// Record and inspect technician feedback.
    Feedback {
        #[command(subcommand)]
        action: FeedbackAction,
    },

    /// Start the JSON HTTP API on `[server].bind`.
    Serve,
}

#[derive(Subcommand)]
enum FeedbackAction {
    /// Record a judgment on a diagnostic answer.
    Add {
        #[arg(long)]
        query: String,

        #[arg(long)]
        response: String,

        /// `correct`, `incorrect` or `unsure`.
        #[arg(long)]
        judgment: Judgment,

        /// Confidence tier reported with the answer.
        #[arg(long, default_value = "MEDIUM")]
        confidence: ConfidenceTier,

        #[arg(long)]
        notes: Option<String>,
    },

    /// List feedback records, newest first.
    List {
        /// Maximum number of records to show.
        #[arg(long)]
        limit: Option<usize>,

        /// Only show records with this judgment.
        #[arg(long)]
        judgment: Option<Judgment>,
    },

    /// Show accuracy statistics.
    Stats,

    /// Export all feedback as CSV.
    Export {
        /// Write to this file instead of stdout.
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("lift_diagnostics=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Summary => {
            stats::run_stats(&cfg)?;
        }
        Commands::Lookup { code } => {
            lookup::run_lookup(&cfg, &code)?;
        }
        Commands::Context { query, full } => {
            lookup::run_context(&cfg, query.as_deref(), full)?;
        }
        Commands::Ask {
            question,
            no_history,
        } => {
            ask::run_ask(&cfg, &question, no_history).await?;
        }
        Commands::Chat => {
            ask::run_chat(&cfg).await?;
        }
        Commands::Feedback { action } => match action {
            FeedbackAction::Add {
                query,
                response,
                judgment,
                confidence,
                notes,
            } => {
                let ledger = FeedbackLedger::open(&cfg.feedback.dir)
                    .context("Failed to open feedback ledger")?;
                let record =
                    ledger.add_feedback(&query, &response, judgment, confidence, notes.as_deref())?;
                println!("Recorded feedback #{} ({})", record.id, record.judgment);
            }
            FeedbackAction::List { limit, judgment } => {
                let ledger = FeedbackLedger::open(&cfg.feedback.dir)
                    .context("Failed to open feedback ledger")?;
                let records = ledger.get_feedback(limit, judgment)?;
                if records.is_empty() {
                    println!("No feedback recorded.");
                }
                for r in records {
                    println!(
                        "#{:<4} {}  {:<9} {:<6}  {}",
                        r.id,
                        r.timestamp.format("%Y-%m-%d %H:%M"),
                        r.judgment,
                        r.confidence_tier,
                        r.query
                    );
                    if let Some(notes) = r.notes {
                        println!("       {}", notes);
                    }
                }
            }
            FeedbackAction::Stats => {
                stats::run_feedback_stats(&cfg)?;
            }
            FeedbackAction::Export { output } => {
                export::run_export(&cfg, output.as_deref())?;
            }
        },
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
    }

    Ok(())
}
