//! # Style Corpus CLI (`corpus`)
//!
//! ## Usage
//!
//! ```bash
//! corpus --config ./config/corpus.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `corpus init` | Create the SQLite database and run schema migrations |
//! | `corpus process` | Enrich new and changed documents |
//! | `corpus index` | Embed enriched records into the vector store |
//! | `corpus run` | `process` followed by `index` |
//! | `corpus retrieve "<query>"` | Show the nearest stored snippets |
//! | `corpus compose "<prompt>"` | Generate a piece in the corpus style |
//! | `corpus stamp` | Add content hashes to records that predate them |

use std::io::Read;
use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use style_corpus::app::AppContext;
use style_corpus::compose::{self, ContextMode};
use style_corpus::progress::{ProgressMode, ProgressReporter};
use style_corpus::{config, db, indexer, migrate, processor, retriever};

/// Style Corpus: keep a writing corpus enriched and indexed, and use it
/// to ground generation in the author's style.
#[derive(Parser)]
#[command(name = "corpus", version)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/corpus.toml")]
    config: PathBuf,

    /// Progress on stderr: `off`, `human`, or `json`.
    /// Defaults to `human` when stderr is a terminal.
    #[arg(long, global = true)]
    progress: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema. Idempotent.
    Init,

    /// Hash every document and re-title the ones that changed.
    ///
    /// Documents whose stored `source_hash` matches their current bytes are
    /// skipped without calling the title service.
    Process,

    /// Embed all enriched records into the configured collection.
    Index {
        /// Delete the collection's rows before indexing.
        #[arg(long)]
        reset: bool,
    },

    /// Process, then index. Stops at the first failing stage.
    Run {
        /// Delete the collection's rows before indexing.
        #[arg(long)]
        reset: bool,
    },

    /// Print the stored snippets nearest to a query.
    Retrieve {
        query: String,

        /// Number of snippets. Defaults to `retrieval.top_k`.
        #[arg(long)]
        k: Option<usize>,
    },

    /// Generate a new piece grounded in the corpus.
    Compose {
        /// The writing prompt. Read from stdin when omitted.
        prompt: Option<String>,

        /// Context source: `retrieval`, `sampling`, or `auto`.
        #[arg(long, default_value = "auto")]
        mode: String,

        /// Print the assembled context and stop.
        #[arg(long)]
        context_only: bool,
    },

    /// Add `source_hash` to enriched records written before hashing.
    Stamp,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let progress_mode = match cli.progress.as_deref() {
        None => ProgressMode::default_for_tty(),
        Some(s) => match ProgressMode::parse(s) {
            Some(mode) => mode,
            None => bail!("Unknown progress mode: {} (expected off, human, or json)", s),
        },
    };
    let progress = progress_mode.reporter();

    let cfg = config::load_config(&cli.config)?;

    if let Commands::Init = cli.command {
        let pool = db::connect(&cfg).await?;
        migrate::run_migrations(&pool).await?;
        pool.close().await;
        println!("Database initialized successfully.");
        return Ok(());
    }

    let app = AppContext::open(cfg).await?;
    let result = run_command(&app, cli.command, progress.as_ref()).await;
    app.close().await;
    result
}

async fn run_command(
    app: &AppContext,
    command: Commands,
    progress: &dyn ProgressReporter,
) -> anyhow::Result<()> {
    match command {
        Commands::Init => {}
        Commands::Process => {
            processor::run_process(app, progress).await?;
        }
        Commands::Index { reset } => {
            indexer::run_index(app, reset, progress).await?;
        }
        Commands::Run { reset } => {
            processor::run_process(app, progress).await?;
            indexer::run_index(app, reset, progress).await?;
        }
        Commands::Retrieve { query, k } => {
            let k = k.unwrap_or(app.config.retrieval.top_k);
            retriever::run_retrieve(app, &query, k).await?;
        }
        Commands::Compose {
            prompt,
            mode,
            context_only,
        } => {
            let mode = ContextMode::parse(&mode).with_context(|| {
                format!(
                    "Unknown compose mode: {} (expected retrieval, sampling, or auto)",
                    mode
                )
            })?;
            let prompt = match prompt {
                Some(p) => p,
                None => {
                    let mut buf = String::new();
                    std::io::stdin()
                        .read_to_string(&mut buf)
                        .context("reading prompt from stdin")?;
                    buf
                }
            };
            compose::run_compose(app, prompt.trim(), mode, context_only).await?;
        }
        Commands::Stamp => {
            processor::run_backfill(app)?;
        }
    }
    Ok(())
}
