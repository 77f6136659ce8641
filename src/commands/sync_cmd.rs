//! Sync CLI commands for synchronizing with the server.

use clap::{Args, Subcommand};
use recipebox_core::{
    ImportLink, ImportLinkError, SyncCoordinator, SyncError, SyncOutcome, SyncReport,
};
use std::time::Duration;
use uuid::Uuid;

use super::{find_collection, AppContext};

/// Sync shared collections with the server
#[derive(Debug, Args)]
pub struct SyncCommand {
    #[command(subcommand)]
    command: Option<SyncSubcommand>,

    /// Only sync this collection (ID or name)
    #[arg(long)]
    collection: Option<String>,

    /// Keep running and sync periodically until interrupted
    #[arg(long)]
    watch: bool,
}

#[derive(Debug, Subcommand)]
enum SyncSubcommand {
    /// Show sync configuration and local sync state
    Status,
}

impl SyncCommand {
    pub async fn run(&self, ctx: &AppContext) -> Result<(), SyncCommandError> {
        match &self.command {
            Some(SyncSubcommand::Status) => self.status(ctx).await,
            None if self.watch => self.watch(ctx).await,
            None => self.sync(ctx).await,
        }
    }

    async fn sync(&self, ctx: &AppContext) -> Result<(), SyncCommandError> {
        let coordinator = ctx.coordinator()?;

        println!("Syncing with server...");
        println!();

        match &self.collection {
            Some(identifier) => {
                let id = resolve(ctx, identifier).await?;
                let outcome = coordinator.sync_one(id).await?;
                println!("  ✓ {}", describe(&outcome));
            }
            None => {
                let report = coordinator.sync_all().await;
                print_report(ctx, &report).await;
                if !report.is_success() {
                    wait_for_images(&coordinator).await;
                    return Err(SyncCommandError::Incomplete(report.failures()));
                }
            }
        }

        wait_for_images(&coordinator).await;
        println!();
        println!("Sync complete.");
        Ok(())
    }

    async fn watch(&self, ctx: &AppContext) -> Result<(), SyncCommandError> {
        let coordinator = ctx.coordinator()?;

        println!(
            "Syncing every {}s. Press Ctrl-C to stop.",
            coordinator.settings().interval.as_secs()
        );
        let periodic = coordinator.start_periodic();

        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl-C: {}", e);
        }

        println!("Stopping after the current cycle...");
        periodic.stop().await;
        wait_for_images(&coordinator).await;
        Ok(())
    }

    async fn status(&self, ctx: &AppContext) -> Result<(), SyncCommandError> {
        let config = &ctx.config;
        println!("Sync Configuration");
        println!("==================");
        println!();

        match (&config.sync.server_url, &config.sync.api_key) {
            (Some(server_url), Some(api_key)) => {
                println!("Server:    {}", server_url);
                println!("API Key:   {}...", api_key.chars().take(8).collect::<String>());
                println!("Interval:  {}s", config.sync.interval().as_secs());
            }
            _ => {
                println!("Status: Not configured");
                println!();
                println!("To enable sync, add to your config file:");
                println!();
                println!("  sync:");
                println!("    server_url: \"http://localhost:8080\"");
                println!("    api_key: \"your-api-key\"");
                println!();
                println!("Or set environment variables:");
                println!("  RECIPEBOX_SYNC_URL");
                println!("  RECIPEBOX_SYNC_API_KEY");
            }
        }
        println!();

        let library = ctx.library.lock().await;
        let shared: Vec<_> = library.collections().iter().filter(|c| c.shared).collect();
        if shared.is_empty() {
            println!("No shared collections.");
            return Ok(());
        }
        println!("Shared collections:");
        for collection in shared {
            println!(
                "  {} v{} {}",
                collection.name,
                collection.version,
                if collection.dirty {
                    "(unsynced changes)"
                } else {
                    "(in sync)"
                }
            );
        }
        Ok(())
    }
}

/// Push one collection now
#[derive(Debug, Args)]
pub struct PushCommand {
    /// Collection ID (UUID) or name
    identifier: String,
}

impl PushCommand {
    pub async fn run(&self, ctx: &AppContext) -> Result<(), SyncCommandError> {
        let coordinator = ctx.coordinator()?;
        let id = resolve(ctx, &self.identifier).await?;

        let version = coordinator.push(id).await?;
        println!("Pushed version {}.", version);
        Ok(())
    }
}

/// Import a shared collection from an import link
#[derive(Debug, Args)]
pub struct ImportCommand {
    /// Link of the form recipebox://import/<collection-id>
    link: String,
}

impl ImportCommand {
    pub async fn run(&self, ctx: &AppContext) -> Result<(), SyncCommandError> {
        let link = ImportLink::parse(&self.link)?;
        let coordinator = ctx.coordinator()?;

        let report = coordinator.import(link.collection_id).await?;
        wait_for_images(&coordinator).await;

        let library = ctx.library.lock().await;
        if let Some(collection) = library.get(link.collection_id) {
            println!(
                "Imported '{}' ({} recipe(s), {} new item(s)).",
                collection.name,
                collection.recipe_count(),
                report.inserted
            );
        }
        Ok(())
    }
}

async fn resolve(ctx: &AppContext, identifier: &str) -> Result<Uuid, SyncCommandError> {
    let library = ctx.library.lock().await;
    find_collection(&library, identifier)
        .ok_or_else(|| SyncCommandError::NotFound(identifier.to_string()))
}

fn describe(outcome: &SyncOutcome) -> String {
    match outcome {
        SyncOutcome::NotShared => "not shared, skipped".to_string(),
        SyncOutcome::UpToDate => "up to date".to_string(),
        SyncOutcome::Imported(report) => format!(
            "updated from server ({} added, {} removed, {} image(s) to fetch)",
            report.inserted,
            report.removed,
            report.downloads.len()
        ),
        SyncOutcome::Pushed { version } => format!("pushed version {}", version),
        SyncOutcome::Bootstrapped { version } => {
            format!("pushed version {} (no usable server copy)", version)
        }
    }
}

async fn print_report(ctx: &AppContext, report: &SyncReport) {
    if report.collections.is_empty() {
        println!("  No shared collections.");
        return;
    }

    let library = ctx.library.lock().await;
    for entry in &report.collections {
        let name = library
            .get(entry.collection_id)
            .map(|c| c.name.clone())
            .unwrap_or_else(|| entry.collection_id.to_string());
        match &entry.result {
            Ok(outcome) => println!("  ✓ {}: {}", name, describe(outcome)),
            Err(e) => println!("  ✗ {}: {}", name, e),
        }
    }
}

/// Downloads run in the background; keep the process alive until they land.
async fn wait_for_images(coordinator: &SyncCoordinator) {
    let assets = coordinator.assets();
    let pending = assets.pending_downloads();
    if pending == 0 {
        return;
    }

    println!("Waiting for {} image download(s)...", pending);
    while assets.pending_downloads() > 0 {
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
}

/// Errors from sync commands
#[derive(Debug)]
pub enum SyncCommandError {
    NotConfigured,
    NotFound(String),
    InvalidLink(ImportLinkError),
    Incomplete(usize),
    SyncError(SyncError),
}

impl std::fmt::Display for SyncCommandError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SyncCommandError::NotConfigured => write!(
                f,
                "Sync is not configured. Set sync.server_url and sync.api_key (see 'recipebox sync status')"
            ),
            SyncCommandError::NotFound(identifier) => {
                write!(f, "Collection not found: {}", identifier)
            }
            SyncCommandError::InvalidLink(e) => write!(f, "{}", e),
            SyncCommandError::Incomplete(failed) => {
                write!(f, "{} collection(s) failed to sync", failed)
            }
            SyncCommandError::SyncError(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for SyncCommandError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SyncCommandError::InvalidLink(e) => Some(e),
            SyncCommandError::SyncError(e) => Some(e),
            _ => None,
        }
    }
}

impl From<SyncError> for SyncCommandError {
    fn from(e: SyncError) -> Self {
        SyncCommandError::SyncError(e)
    }
}

impl From<ImportLinkError> for SyncCommandError {
    fn from(e: ImportLinkError) -> Self {
        SyncCommandError::InvalidLink(e)
    }
}
