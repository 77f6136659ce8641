use clap::{Args, Subcommand};
use std::io::{self, Write};

use super::{find_collection, AppContext, OutputFormat};
use recipebox_core::ImportLink;

#[derive(Args)]
pub struct CollectionCommand {
    #[command(subcommand)]
    pub command: CollectionSubcommand,
}

#[derive(Subcommand)]
pub enum CollectionSubcommand {
    /// Create a new collection
    Create {
        /// Name of the collection
        name: String,

        /// Share the collection right away
        #[arg(long)]
        shared: bool,
    },

    /// List all collections
    List {
        /// Output format
        #[arg(long, short, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Show a collection with its groups and recipes
    Show {
        /// Collection ID (UUID) or name
        identifier: String,

        /// Output format
        #[arg(long, short, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Rename a collection
    Rename {
        /// Collection ID (UUID) or name
        identifier: String,

        /// New name
        name: String,
    },

    /// Share a collection and print its import link
    Share {
        /// Collection ID (UUID) or name
        identifier: String,
    },

    /// Stop sharing a collection
    Unshare {
        /// Collection ID (UUID) or name
        identifier: String,
    },

    /// Delete a collection (also on the server when shared)
    Delete {
        /// Collection ID (UUID) or name
        identifier: String,

        /// Skip confirmation prompt
        #[arg(long, short)]
        force: bool,
    },
}

impl CollectionCommand {
    pub async fn run(&self, ctx: &AppContext) -> Result<(), Box<dyn std::error::Error>> {
        match &self.command {
            CollectionSubcommand::Create { name, shared } => {
                if name.trim().is_empty() {
                    return Err("Collection name cannot be empty".into());
                }

                let mut library = ctx.library.lock().await;
                let id = library.create_collection(name.trim()).await?;
                if *shared {
                    library.set_shared(id, true).await?;
                }
                println!("Created collection {} ({})", name.trim(), id);
                if *shared {
                    println!("Import link: {}", ImportLink::new(id));
                }
                Ok(())
            }

            CollectionSubcommand::List { format } => {
                let library = ctx.library.lock().await;
                let collections = library.collections();

                if collections.is_empty() {
                    println!("No collections found");
                    return Ok(());
                }

                match format {
                    OutputFormat::Json => {
                        println!("{}", serde_json::to_string_pretty(collections)?);
                    }
                    OutputFormat::Text => {
                        println!(
                            "{:<36}  {:<30}  {:>7}  {:>7}  SHARED",
                            "ID", "NAME", "RECIPES", "VERSION"
                        );
                        println!("{}", "-".repeat(92));
                        for collection in collections {
                            let name = if collection.name.chars().count() > 30 {
                                format!("{}...", collection.name.chars().take(27).collect::<String>())
                            } else {
                                collection.name.clone()
                            };
                            let version = if collection.dirty {
                                format!("{}*", collection.version)
                            } else {
                                collection.version.to_string()
                            };
                            println!(
                                "{:<36}  {:<30}  {:>7}  {:>7}  {}",
                                collection.id,
                                name,
                                collection.recipe_count(),
                                version,
                                if collection.shared { "yes" } else { "no" }
                            );
                        }
                        println!("\nTotal: {} collection(s)", collections.len());
                    }
                }
                Ok(())
            }

            CollectionSubcommand::Show { identifier, format } => {
                let library = ctx.library.lock().await;
                let collection = find_collection(&library, identifier)
                    .and_then(|id| library.get(id))
                    .ok_or_else(|| format!("Collection not found: {}", identifier))?;

                match format {
                    OutputFormat::Json => {
                        println!("{}", serde_json::to_string_pretty(collection)?);
                    }
                    OutputFormat::Text => {
                        println!("{}", collection);
                    }
                }
                Ok(())
            }

            CollectionSubcommand::Rename { identifier, name } => {
                if name.trim().is_empty() {
                    return Err("Collection name cannot be empty".into());
                }

                let mut library = ctx.library.lock().await;
                let id = find_collection(&library, identifier)
                    .ok_or_else(|| format!("Collection not found: {}", identifier))?;
                library.rename_collection(id, name.trim()).await?;
                println!("Renamed collection to '{}'", name.trim());
                Ok(())
            }

            CollectionSubcommand::Share { identifier } => {
                let mut library = ctx.library.lock().await;
                let id = find_collection(&library, identifier)
                    .ok_or_else(|| format!("Collection not found: {}", identifier))?;
                library.set_shared(id, true).await?;
                println!("Collection is now shared. It will be pushed on the next sync.");
                println!("Import link: {}", ImportLink::new(id));
                Ok(())
            }

            CollectionSubcommand::Unshare { identifier } => {
                let mut library = ctx.library.lock().await;
                let id = find_collection(&library, identifier)
                    .ok_or_else(|| format!("Collection not found: {}", identifier))?;
                library.set_shared(id, false).await?;
                println!("Collection is no longer shared.");
                Ok(())
            }

            CollectionSubcommand::Delete { identifier, force } => {
                let (id, name, shared) = {
                    let library = ctx.library.lock().await;
                    let collection = find_collection(&library, identifier)
                        .and_then(|id| library.get(id))
                        .ok_or_else(|| format!("Collection not found: {}", identifier))?;
                    (collection.id, collection.name.clone(), collection.shared)
                };

                // Confirm deletion unless --force is used
                if !force {
                    print!("Delete collection '{}'? [y/N] ", name);
                    io::stdout().flush()?;

                    let mut input = String::new();
                    io::stdin().read_line(&mut input)?;

                    if !input.trim().eq_ignore_ascii_case("y") {
                        println!("Deletion cancelled.");
                        return Ok(());
                    }
                }

                if shared && ctx.config.sync.is_configured() {
                    ctx.coordinator()?.delete_collection(id).await?;
                } else {
                    let removed = ctx.library.lock().await.delete_collection(id).await?;
                    for filename in removed.recipes().filter_map(|r| r.local_image.as_ref()) {
                        let _ = std::fs::remove_file(ctx.config.images_dir().join(filename));
                    }
                    if shared {
                        println!("Sync is not configured; the server copy was left in place.");
                    }
                }
                println!("Deleted collection: {}", name);
                Ok(())
            }
        }
    }
}
