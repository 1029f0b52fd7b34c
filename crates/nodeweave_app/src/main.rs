// SPDX-License-Identifier: MIT OR Apache-2.0
//! nodeweave command line tool.
//!
//! Loads schema files, imports workflow documents into a session and reports
//! on them: readiness, round trips and pass-through previews.

mod commands;
mod settings;
mod watcher;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use nodeweave_graph::ExportOptions;
use settings::{Settings, SETTINGS_FILE_NAME};
use std::path::{Path, PathBuf};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use watcher::{FileEvent, FileWatcher};

#[derive(Debug, Parser)]
#[command(name = "nodeweave", version, about = "Schema-driven workflow graphs")]
struct Cli {
    /// Settings file (defaults to ./nodeweave.ron when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// More log output (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// List the models declared by schema files
    Models {
        /// Schema files; the configured ones when empty
        schemas: Vec<PathBuf>,
        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },
    /// Import a document and report skipped items and readiness
    Check {
        /// Workflow document
        document: PathBuf,
        /// Schema files
        #[arg(short, long = "schema")]
        schemas: Vec<PathBuf>,
        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },
    /// Import a document and export it again
    Roundtrip {
        /// Workflow document
        document: PathBuf,
        /// Schema files
        #[arg(short, long = "schema")]
        schemas: Vec<PathBuf>,
        /// Leave node positions and sizes out
        #[arg(long)]
        no_layout: bool,
        /// Output file; stdout when unset
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Run a pass-through preview and print every node's outputs
    Preview {
        /// Workflow document
        document: PathBuf,
        /// Schema files
        #[arg(short, long = "schema")]
        schemas: Vec<PathBuf>,
    },
    /// Re-run `check` whenever the document or a schema changes
    Watch {
        /// Workflow document
        document: PathBuf,
        /// Schema files
        #[arg(short, long = "schema")]
        schemas: Vec<PathBuf>,
    },
    /// Write a settings file
    InitConfig {
        /// Where to write it
        #[arg(default_value = SETTINGS_FILE_NAME)]
        path: PathBuf,
        /// Schema files to list in it
        #[arg(short, long = "schema")]
        schemas: Vec<PathBuf>,
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

fn init_tracing(verbose: u8) -> Result<()> {
    let level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let mut env_filter = tracing_subscriber::EnvFilter::from_default_env();
    for krate in ["nodeweave_app", "nodeweave_graph", "nodeweave_schema"] {
        env_filter = env_filter.add_directive(format!("{krate}={level}").parse()?);
    }

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose)?;
    tracing::debug!("Starting nodeweave v{}", env!("CARGO_PKG_VERSION"));

    if let Command::InitConfig { path, schemas, force } = &cli.command {
        commands::init_config(path, schemas, *force)?;
        tracing::info!("Wrote settings to {}", path.display());
        return Ok(());
    }

    let settings = Settings::discover(cli.config.as_deref()).context("Failed to load settings")?;

    match cli.command {
        Command::Models { schemas, json } => {
            let session = commands::load_session(&settings, &schemas)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&commands::models_json(&session)?)?);
            } else {
                print!("{}", commands::describe_models(&session));
            }
        }
        Command::Check { document, schemas, json } => {
            let ready = run_check(&settings, &document, &schemas, json)?;
            if !ready {
                std::process::exit(2);
            }
        }
        Command::Roundtrip {
            document,
            schemas,
            no_layout,
            output,
        } => {
            let mut session = commands::load_session(&settings, &schemas)?;
            let doc = commands::load_document(&document)?;
            let export = ExportOptions {
                include_layout: settings.export.include_layout && !no_layout,
            };
            let (report, exported) = commands::roundtrip(&mut session, &doc, &settings.import, &export);
            if !report.is_clean() {
                tracing::warn!(
                    skipped_nodes = report.skipped_nodes.len(),
                    skipped_edges = report.skipped_edges.len(),
                    "Document did not import cleanly"
                );
            }
            let text = exported.to_json()?;
            match output {
                Some(path) => {
                    std::fs::write(&path, text).with_context(|| format!("Failed to write {}", path.display()))?;
                    tracing::info!("Wrote {}", path.display());
                }
                None => println!("{text}"),
            }
        }
        Command::Preview { document, schemas } => {
            let mut session = commands::load_session(&settings, &schemas)?;
            let doc = commands::load_document(&document)?;
            let outputs = commands::preview(&mut session, &doc, &settings.import);
            println!("{}", serde_json::to_string_pretty(&outputs)?);
        }
        Command::Watch { document, schemas } => watch(&settings, &document, &schemas)?,
        Command::InitConfig { .. } => {}
    }
    Ok(())
}

fn run_check(settings: &Settings, document: &Path, schemas: &[PathBuf], json: bool) -> Result<bool> {
    let mut session = commands::load_session(settings, schemas)?;
    let doc = commands::load_document(document)?;
    let report = commands::check(&mut session, &doc, &settings.import);
    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{}", report.render());
    }
    Ok(report.is_ready())
}

fn watch(settings: &Settings, document: &Path, schemas: &[PathBuf]) -> Result<()> {
    let mut files = vec![document.to_path_buf()];
    if schemas.is_empty() {
        files.extend(settings.schemas.iter().map(|entry| entry.path.clone()));
    } else {
        files.extend(schemas.iter().cloned());
    }
    let watcher = FileWatcher::new(&files).context("Failed to start file watcher")?;

    if let Err(e) = run_check(settings, document, schemas, false) {
        tracing::error!("{e:#}");
    }
    while let Some(events) = watcher.wait() {
        let mut rerun = false;
        for event in events {
            match event {
                FileEvent::Changed(path) => {
                    tracing::debug!("Changed: {}", path.display());
                    rerun = true;
                }
                FileEvent::Deleted(path) => tracing::warn!("Deleted: {}", path.display()),
                FileEvent::Error(e) => tracing::error!("Watch error: {e}"),
            }
        }
        if rerun {
            println!();
            if let Err(e) = run_check(settings, document, schemas, false) {
                tracing::error!("{e:#}");
            }
        }
    }
    Ok(())
}
