use clap::{Args, Subcommand};

use super::{find_collection, AppContext};

#[derive(Args)]
pub struct GroupCommand {
    #[command(subcommand)]
    pub command: GroupSubcommand,
}

#[derive(Subcommand)]
pub enum GroupSubcommand {
    /// Add a group to a collection
    Add {
        /// Collection ID (UUID) or name
        collection: String,

        /// Name of the group
        name: String,
    },
}

impl GroupCommand {
    pub async fn run(&self, ctx: &AppContext) -> Result<(), Box<dyn std::error::Error>> {
        match &self.command {
            GroupSubcommand::Add { collection, name } => {
                if name.trim().is_empty() {
                    return Err("Group name cannot be empty".into());
                }

                let mut library = ctx.library.lock().await;
                let collection_id = find_collection(&library, collection)
                    .ok_or_else(|| format!("Collection not found: {}", collection))?;
                let id = library.add_group(collection_id, name.trim()).await?;
                println!("Added group {} ({})", name.trim(), id);
                Ok(())
            }
        }
    }
}
