//! # Autolink CLI (`autolink`)
//!
//! ## Usage
//!
//! ```bash
//! autolink --config ./config/autolink.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `autolink index` | Rebuild the title index and list every linkable title |
//! | `autolink link <id>` | Link one document |
//! | `autolink vault` | Link every non-excluded document |
//! | `autolink incremental` | Link documents modified since the last run |
//! | `autolink preview <id>` | Show link suggestions without writing |
//! | `autolink stats` | Print persisted linking statistics |
//! | `autolink watch` | Link documents as they are saved |
//!
//! Logging goes to stderr and is controlled by `RUST_LOG`
//! (default `autolink=info`).

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use autolink::config::{self, Config};
use autolink::engine::Engine;
use autolink::models::DocumentOutcome;
use autolink::progress::ProgressMode;
use autolink::state::RunState;
use autolink::stats::print_stats;
use autolink::store::fs::FsStore;
use autolink::watch;

/// Autolink: rewrite mentions of document titles into wiki-links.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/autolink.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "autolink",
    about = "Autolink: rewrite mentions of document titles into wiki-links",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/autolink.toml")]
    config: PathBuf,

    /// Progress on stderr. Defaults to `human` on a terminal, `off` otherwise.
    #[arg(long, global = true, value_enum)]
    progress: Option<ProgressMode>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Rebuild the title index and list every linkable title.
    Index,

    /// Link a single document.
    Link {
        /// Document id: path relative to the corpus root (`notes/Rust.md`).
        id: String,
    },

    /// Link every non-excluded document in batches.
    Vault,

    /// Link documents modified since the last run.
    Incremental,

    /// Show the links a document would receive, without writing it.
    Preview {
        /// Document id: path relative to the corpus root.
        id: String,
    },

    /// Print linking statistics.
    Stats,

    /// Watch the corpus and keep the index current; links documents on save
    /// when `batch.auto_link_on_save` is enabled.
    Watch,
}

fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("autolink=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn print_outcome(id: &str, outcome: &DocumentOutcome) {
    match outcome {
        DocumentOutcome::Linked { links } => println!("{}: {} link(s) added", id, links),
        DocumentOutcome::Unchanged => println!("{}: unchanged", id),
        DocumentOutcome::Skipped => println!("{}: skipped", id),
        DocumentOutcome::Failed { error } => println!("{}: failed ({})", id, error),
    }
}

async fn open_engine(cfg: Config, progress: ProgressMode) -> Result<Engine<FsStore>> {
    let store = FsStore::from_config(&cfg)?;
    let engine = Engine::new(cfg, store).with_reporter(progress.reporter());
    engine.load_state().await?;
    Ok(engine)
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;
    let progress = cli.progress.unwrap_or_else(ProgressMode::default_for_tty);

    match cli.command {
        Commands::Index => {
            let engine = open_engine(cfg, progress).await?;
            let count = engine.rebuild_index().await?;
            for title in engine.titles() {
                println!("{}", title);
            }
            eprintln!("{} title(s)", count);
        }
        Commands::Link { id } => {
            let engine = open_engine(cfg, progress).await?;
            engine.rebuild_index().await?;
            let outcome = engine.process_document(&id).await?;
            print_outcome(&id, &outcome);
        }
        Commands::Vault => {
            let engine = open_engine(cfg, progress).await?;
            let result = engine.process_vault().await?;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        Commands::Incremental => {
            let engine = open_engine(cfg, progress).await?;
            let result = engine.process_incremental().await?;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        Commands::Preview { id } => {
            let engine = open_engine(cfg, progress).await?;
            engine.rebuild_index().await?;
            let result = engine.preview(&id).await?;
            if result.suggestions.is_empty() {
                println!("No suggestions for {}.", id);
            }
            for s in &result.suggestions {
                println!(
                    "{} {:>6}  {:<24} -> {:<24} {:.2}  {}",
                    if s.approved { "+" } else { " " },
                    s.position,
                    s.original,
                    s.target,
                    s.confidence,
                    s.context.replace('\n', " ")
                );
            }
        }
        Commands::Stats => {
            let state = RunState::load(&cfg.state_path()).await?;
            print_stats(&state.stats, state.last_run);
        }
        Commands::Watch => {
            let engine = open_engine(cfg, progress).await?;
            let titles = engine.rebuild_index().await?;
            let mut watcher = watch::watch(engine.store())?;
            info!(
                root = %engine.store().root().display(),
                titles,
                "watching for changes (Ctrl-C to stop)"
            );

            loop {
                tokio::select! {
                    change = watcher.recv() => {
                        let Some(change) = change else { break };
                        match engine.handle_change(change.clone()).await {
                            Ok(Some(outcome)) => {
                                if let autolink::store::ChangeEvent::Modified(id) = &change {
                                    print_outcome(id, &outcome);
                                }
                            }
                            Ok(None) => {}
                            Err(e) => warn!("{:?}: {}", change, e),
                        }
                    }
                    _ = tokio::signal::ctrl_c() => break,
                }
            }
            engine.save_state().await?;
        }
    }

    Ok(())
}
