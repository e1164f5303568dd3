//! Command-line interface for watching batch upgrade progress.

mod terminal;

pub use terminal::TerminalSurface;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};

use crate::config::WatchConfig;
use crate::error::ProgressError;
use crate::session::{websocket_endpoint, BatchView, Location, Teardown};
use crate::surface::{MemorySurface, Surface};
use crate::transport::{TransportEvent, TransportHandle};

/// Page used by `replay` when no URL is given.
const REPLAY_PAGE_URL: &str =
    "http://localhost/admin/firmware_upgrader/batchupgradeoperation/replay/change/";

/// Batch Upgrade Progress
///
/// Follows the live progress of a batch firmware upgrade and reconciles it
/// with the status already shown on the batch page.
#[derive(Parser, Debug)]
#[command(name = "batch-progress")]
#[command(author = "Firmware Upgrader Team")]
#[command(version = "0.1.0")]
#[command(about = "Live progress of batch firmware upgrades")]
#[command(long_about = None)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

/// CLI subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Follow a batch over its WebSocket endpoint
    Watch {
        /// URL of the batch page
        #[arg(short, long)]
        url: String,

        /// Snapshot of the rendered page (JSON)
        #[arg(short, long)]
        document: Option<PathBuf>,

        /// Host override for the streaming endpoint
        #[arg(long)]
        host: Option<String>,

        /// Configuration file (TOML)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Feed recorded messages through the engine and print the final page
    Replay {
        /// Snapshot of the rendered page (JSON)
        #[arg(short, long)]
        document: PathBuf,

        /// Newline-delimited raw messages
        #[arg(short, long)]
        events: PathBuf,

        /// URL of the batch page
        #[arg(short, long, default_value = REPLAY_PAGE_URL)]
        url: String,

        /// Configuration file (TOML)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Print the streaming endpoint of a batch page
    Endpoint {
        /// URL of the batch page
        #[arg(short, long)]
        url: String,

        /// Host override for the streaming endpoint
        #[arg(long)]
        host: Option<String>,

        /// Configuration file (TOML)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

/// Run the CLI application.
pub fn run(cli: Cli) -> anyhow::Result<()> {
    // Initialize logging
    if cli.verbose {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("debug"))
            .init();
    } else if !cli.quiet {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
            .init();
    }

    // Another provider may already be installed; either way one is available.
    let _ = rustls::crypto::ring::default_provider().install_default();

    match cli.command {
        Commands::Watch {
            url,
            document,
            host,
            config,
        } => {
            let config = load_config(config.as_deref(), host)?;
            let document = match document {
                Some(path) => load_document(&path)?,
                None => MemorySurface::new(),
            };
            block_on(run_watch(config, &url, document, cli.quiet))
        }
        Commands::Replay {
            document,
            events,
            url,
            config,
        } => {
            let config = load_config(config.as_deref(), None)?;
            let document = load_document(&document)?;
            let messages = std::fs::read_to_string(&events)
                .with_context(|| format!("Failed to read events from {}", events.display()))?;
            block_on(run_replay(config, &url, document, messages, cli.quiet))
        }
        Commands::Endpoint { url, host, config } => {
            let config = load_config(config.as_deref(), host)?;
            run_endpoint(&config, &url)
        }
    }
}

fn block_on<F: std::future::Future<Output = anyhow::Result<()>>>(future: F) -> anyhow::Result<()> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")?
        .block_on(future)
}

fn load_config(path: Option<&Path>, host: Option<String>) -> anyhow::Result<WatchConfig> {
    let mut config = match path {
        Some(path) => WatchConfig::from_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => WatchConfig::default(),
    };
    if let Some(host) = host {
        config = config.with_api_host(host);
    }
    config.validate()?;
    Ok(config)
}

fn load_document(path: &Path) -> anyhow::Result<MemorySurface> {
    MemorySurface::from_json_file(path)
        .with_context(|| format!("Failed to load page snapshot {}", path.display()))
}

/// Attach a view. Teardown before the view is attached is a clean stop.
async fn attach_view<S: Surface + 'static>(
    config: WatchConfig,
    location: &Location,
    surface: Arc<S>,
    teardown: Teardown,
) -> anyhow::Result<Option<BatchView<S>>> {
    match BatchView::attach(config, location, surface, teardown).await {
        Err(ProgressError::Cancelled) => {
            log::info!("Stopped before the view was attached");
            Ok(None)
        }
        result => Ok(result?),
    }
}

/// Run watch command.
async fn run_watch(
    config: WatchConfig,
    url: &str,
    document: MemorySurface,
    quiet: bool,
) -> anyhow::Result<()> {
    let location = Location::parse(url).with_context(|| format!("Invalid page URL {}", url))?;
    let surface = Arc::new(TerminalSurface::new(document, quiet));
    let teardown = Teardown::new();

    let on_interrupt = teardown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::info!("Interrupted, closing connection");
            on_interrupt.trigger();
        }
    });

    let view = match attach_view(config, &location, surface.clone(), teardown).await? {
        Some(view) => view,
        None => {
            log::info!("Not watching {}", url);
            return Ok(());
        }
    };

    let stats = view.run_websocket().await;
    surface.finish();

    if !quiet {
        println!("{}", stats);
    }
    Ok(())
}

/// Run replay command.
async fn run_replay(
    config: WatchConfig,
    url: &str,
    document: MemorySurface,
    messages: String,
    quiet: bool,
) -> anyhow::Result<()> {
    let location = Location::parse(url).with_context(|| format!("Invalid page URL {}", url))?;
    let settle = config.highlight_window();

    let view = match BatchView::attach(config, &location, Arc::new(document.clone()), Teardown::new())
        .await?
    {
        Some(view) => view,
        None => bail!("Could not attach to batch page {}", url),
    };

    let (sender, transport) = TransportHandle::channel();
    tokio::spawn(async move {
        if sender.send(TransportEvent::Open).await.is_err() {
            return;
        }
        for line in messages.lines().filter(|line| !line.trim().is_empty()) {
            if sender
                .send(TransportEvent::Message(line.to_string()))
                .await
                .is_err()
            {
                return;
            }
        }
    });

    let stats = view.run(transport).await;

    // Let pending highlight clears land before taking the final picture.
    tokio::time::sleep(settle).await;

    println!("{}", serde_json::to_string_pretty(&document.nodes())?);
    if !quiet {
        eprintln!("{}", stats);
    }
    Ok(())
}

/// Run endpoint command.
fn run_endpoint(config: &WatchConfig, url: &str) -> anyhow::Result<()> {
    let location = Location::parse(url).with_context(|| format!("Invalid page URL {}", url))?;
    let batch_id = match location.batch_id(&config.batch_path_segment) {
        Some(id) => id,
        None => bail!("No batch ID found in path: {}", location.path),
    };
    let endpoint = websocket_endpoint(&location, config, &batch_id)?;
    println!("{}", endpoint);
    Ok(())
}
