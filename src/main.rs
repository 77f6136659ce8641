use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

use commands::{
    AppContext, CollectionCommand, ConfigCommand, GroupCommand, ImportCommand, PushCommand,
    RecipeCommand, SyncCommand,
};
use recipebox::config::Config;

#[derive(Parser)]
#[command(name = "recipebox")]
#[command(version)]
#[command(about = "Recipe collections, shared and synced across devices", long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage collections
    Collection(CollectionCommand),

    /// Manage groups inside a collection
    Group(GroupCommand),

    /// Manage recipes
    Recipe(RecipeCommand),

    /// Sync shared collections with the server
    Sync(SyncCommand),

    /// Push one collection to the server now
    Push(PushCommand),

    /// Import a shared collection from a link
    Import(ImportCommand),

    /// Manage configuration
    Config(ConfigCommand),
}

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "recipebox=info,recipebox_core=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    if let Err(e) = run().await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Load configuration
    let config = Config::load(cli.config)?;

    let command = match cli.command {
        Some(Commands::Config(cmd)) => return cmd.run(&config),
        Some(command) => command,
        None => {
            println!("Use --help to see available commands");
            return Ok(());
        }
    };

    let ctx = AppContext::open(config).await?;
    match command {
        Commands::Collection(cmd) => cmd.run(&ctx).await?,
        Commands::Group(cmd) => cmd.run(&ctx).await?,
        Commands::Recipe(cmd) => cmd.run(&ctx).await?,
        Commands::Sync(cmd) => cmd.run(&ctx).await?,
        Commands::Push(cmd) => cmd.run(&ctx).await?,
        Commands::Import(cmd) => cmd.run(&ctx).await?,
        Commands::Config(cmd) => cmd.run(&ctx.config)?,
    }

    Ok(())
}
