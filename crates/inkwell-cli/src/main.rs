#![deny(unsafe_code)]

//! Inkwell CLI: run the editing assistant against files.

mod file_document;

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use inkwell_config::AppConfig;
use inkwell_core::{Assistant, DocCatalog, EditReport, OrchestratorSettings};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::file_document::FileDocument;

/// Inkwell: an AI assistant that edits structured documents in place.
#[derive(Parser)]
#[command(name = "inkwell", version, about, long_about = None)]
struct Cli {
    /// Path to configuration file.
    #[arg(short, long, default_value = "inkwell.toml")]
    config: PathBuf,

    /// Increase log verbosity (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ask the model to edit a file and write the result back.
    Edit(DocumentArgs),

    /// Print the prompt that `edit` would send, without calling the model.
    Prompt(DocumentArgs),

    /// Render processor documentation from the catalog.
    Catalog {
        /// Processors to render (all when omitted).
        names: Vec<String>,
    },

    /// Validate and display configuration.
    Config {
        /// Show the resolved configuration.
        #[arg(long)]
        show: bool,
    },
}

#[derive(Args)]
struct DocumentArgs {
    /// Document to edit.
    file: PathBuf,

    /// What the assistant should do.
    #[arg(short, long)]
    instruction: String,

    /// Caret position (character offset).
    #[arg(long, default_value_t = 0)]
    caret: usize,

    /// Selected range as START:END (character offsets).
    #[arg(long, value_parser = parse_selection)]
    selection: Option<(usize, usize)>,

    /// Extra processors whose documentation goes into the prompt.
    #[arg(long = "processor")]
    processors: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let (config, found) = load_config(&cli.config).await?;

    let filter = match cli.verbose {
        0 => config.logging.level.as_str(),
        1 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(std::io::stderr)
        .init();
    if !found {
        info!(path = %cli.config.display(), "Config file not found, using defaults");
    }

    match cli.command {
        Commands::Edit(args) => cmd_edit(&config, args).await?,
        Commands::Prompt(args) => cmd_prompt(&config, args).await?,
        Commands::Catalog { names } => cmd_catalog(&config, &names),
        Commands::Config { show } => cmd_config(&config, &cli.config, show)?,
    }

    Ok(())
}

async fn cmd_edit(config: &AppConfig, args: DocumentArgs) -> Result<()> {
    let api_key = config.llm.resolve_api_key()?;
    let assistant = build_assistant(config, &api_key).await?;
    let document = open_document(&args).await?;
    let path = document.path().to_path_buf();
    let document = Arc::new(Mutex::new(document));

    info!(file = %path.display(), model = %config.llm.model, "Starting edit");
    let task = assistant.spawn_edit(Arc::clone(&document), args.instruction);
    let token = task.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, discarding the pending edit");
            token.cancel();
        }
    });

    match task.join().await? {
        EditReport::Applied(snapshot) => {
            let saved = document
                .lock()
                .map_err(|_| anyhow::anyhow!("document lock poisoned"))?
                .clone();
            saved.save().await?;
            match snapshot.selection {
                Some((start, end)) => println!(
                    "Updated {} (caret {}, selection {start}:{end})",
                    path.display(),
                    snapshot.caret
                ),
                None => println!("Updated {} (caret {})", path.display(), snapshot.caret),
            }
        }
        EditReport::NoChange => println!("The model returned no edit; {} is unchanged.", path.display()),
        EditReport::Cancelled => println!("Cancelled; {} is unchanged.", path.display()),
    }
    Ok(())
}

async fn cmd_prompt(config: &AppConfig, args: DocumentArgs) -> Result<()> {
    // The gateway is never called, so no key is needed.
    let assistant = build_assistant(config, "").await?;
    let document = open_document(&args).await?;
    let prompt = assistant.render_prompt(&document, &args.instruction)?;
    print!("{prompt}");
    Ok(())
}

fn cmd_catalog(config: &AppConfig, names: &[String]) {
    let catalog = DocCatalog::from_config(&config.catalog, config.assistant.content_type.as_str());
    let rendered = if names.is_empty() {
        catalog.render(&catalog.names())
    } else {
        catalog.render(names)
    };
    if rendered.is_empty() {
        println!("The catalog is empty.");
    } else {
        print!("{rendered}");
    }
}

fn cmd_config(config: &AppConfig, config_path: &Path, show: bool) -> Result<()> {
    if show {
        let toml_str =
            toml::to_string_pretty(config).map_err(|e| anyhow::anyhow!("TOML error: {e}"))?;
        println!("{toml_str}");
    } else {
        println!("Configuration at '{}' is valid.", config_path.display());
    }
    Ok(())
}

async fn build_assistant(config: &AppConfig, api_key: &str) -> Result<Assistant> {
    let gateway = inkwell_core::llm::create_gateway(&config.llm, api_key);
    let settings = OrchestratorSettings::from_config(&config.llm, &config.assistant);
    let catalog = DocCatalog::from_config(&config.catalog, config.assistant.content_type.as_str());
    let mut assistant = Assistant::new(Arc::from(gateway), settings, catalog);

    if let Some(ref path) = config.assistant.general_info {
        let text = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("failed to read general info file {}", path.display()))?;
        assistant = assistant.with_general_info(text);
    }
    Ok(assistant)
}

async fn open_document(args: &DocumentArgs) -> Result<FileDocument> {
    let document = FileDocument::open(&args.file)
        .await
        .with_context(|| format!("failed to open {}", args.file.display()))?
        .with_processors(args.processors.iter().cloned());
    Ok(match args.selection {
        Some((start, end)) if start != end => document.with_selection(start, end),
        _ => document.with_caret(args.caret),
    })
}

async fn load_config(path: &Path) -> Result<(AppConfig, bool)> {
    if tokio::fs::try_exists(path).await.unwrap_or(false) {
        let config = AppConfig::load(path)
            .await
            .with_context(|| format!("invalid configuration in {}", path.display()))?;
        Ok((config, true))
    } else {
        Ok((AppConfig::default(), false))
    }
}

fn parse_selection(value: &str) -> Result<(usize, usize), String> {
    let (start, end) = value
        .split_once(':')
        .ok_or_else(|| format!("expected START:END, got {value:?}"))?;
    let start = start
        .trim()
        .parse::<usize>()
        .map_err(|e| format!("invalid selection start {start:?}: {e}"))?;
    let end = end
        .trim()
        .parse::<usize>()
        .map_err(|e| format!("invalid selection end {end:?}: {e}"))?;
    Ok((start, end))
}
