use clap::{Args, Subcommand};
use std::path::PathBuf;
use uuid::Uuid;

use super::{AppContext, OutputFormat};
use recipebox_core::assets::import_image_file;
use recipebox_core::{Ingredient, Nutrition, Recipe};

#[derive(Args)]
pub struct RecipeCommand {
    #[command(subcommand)]
    pub command: RecipeSubcommand,
}

#[derive(Subcommand)]
pub enum RecipeSubcommand {
    /// Add a recipe to a group
    Add {
        /// Group ID (UUID)
        group: Uuid,

        /// Recipe title
        title: String,

        /// Page the recipe came from
        #[arg(long, default_value = "")]
        url: String,

        /// Name of the site the recipe came from
        #[arg(long)]
        site_name: Option<String>,

        /// Ingredient as NAME=AMOUNT (can be repeated)
        #[arg(long = "ingredient", value_name = "NAME=AMOUNT")]
        ingredients: Vec<String>,

        /// Step (can be repeated, in order)
        #[arg(long = "step", value_name = "STEP")]
        steps: Vec<String>,

        /// Calories (kcal)
        #[arg(long)]
        calories: Option<f64>,

        /// Total fat (g)
        #[arg(long)]
        fat: Option<f64>,

        /// Total carbohydrates (g)
        #[arg(long)]
        carbs: Option<f64>,

        /// Total protein (g)
        #[arg(long)]
        protein: Option<f64>,

        /// Total sugar (g)
        #[arg(long)]
        sugar: Option<f64>,
    },

    /// Show a recipe's details
    Show {
        /// Recipe ID (UUID)
        id: Uuid,

        /// Output format
        #[arg(long, short, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Remove a recipe
    Remove {
        /// Recipe ID (UUID)
        id: Uuid,
    },

    /// Set the hero image of a recipe from a local file
    SetImage {
        /// Recipe ID (UUID)
        id: Uuid,

        /// Image file
        path: PathBuf,
    },
}

fn parse_ingredient(value: &str) -> Result<Ingredient, String> {
    let (name, amount) = value
        .split_once('=')
        .ok_or_else(|| format!("Ingredient must be NAME=AMOUNT: {}", value))?;
    if name.trim().is_empty() {
        return Err(format!("Ingredient name cannot be empty: {}", value));
    }
    Ok(Ingredient::new(Uuid::nil(), name.trim(), amount.trim()))
}

impl RecipeCommand {
    pub async fn run(&self, ctx: &AppContext) -> Result<(), Box<dyn std::error::Error>> {
        match &self.command {
            RecipeSubcommand::Add {
                group,
                title,
                url,
                site_name,
                ingredients,
                steps,
                calories,
                fat,
                carbs,
                protein,
                sugar,
            } => {
                if title.trim().is_empty() {
                    return Err("Recipe title cannot be empty".into());
                }

                let mut recipe = Recipe::new(*group, title.trim(), url.trim())
                    .with_steps(steps.clone())
                    .with_nutrition(Nutrition {
                        calories: *calories,
                        total_fat: *fat,
                        total_carbs: *carbs,
                        total_protein: *protein,
                        total_sugar: *sugar,
                    });
                if let Some(site_name) = site_name {
                    recipe = recipe.with_site_name(site_name);
                }
                for value in ingredients {
                    recipe = recipe.with_ingredient(parse_ingredient(value)?);
                }

                let mut library = ctx.library.lock().await;
                let id = library.add_recipe(*group, recipe).await?;
                println!("Added recipe:");
                if let Some(recipe) = library.find_recipe(id) {
                    println!("{}", recipe);
                }
                Ok(())
            }

            RecipeSubcommand::Show { id, format } => {
                let library = ctx.library.lock().await;
                let recipe = library
                    .find_recipe(*id)
                    .ok_or_else(|| format!("Recipe not found: {}", id))?;

                match format {
                    OutputFormat::Json => {
                        println!("{}", serde_json::to_string_pretty(recipe)?);
                    }
                    OutputFormat::Text => {
                        println!("{}", recipe);
                    }
                }
                Ok(())
            }

            RecipeSubcommand::Remove { id } => {
                let removed = ctx.library.lock().await.remove_recipe(*id).await?;
                if let Some(filename) = &removed.local_image {
                    let _ = std::fs::remove_file(ctx.config.images_dir().join(filename));
                }
                println!("Removed recipe: {}", removed.title);
                Ok(())
            }

            RecipeSubcommand::SetImage { id, path } => {
                if ctx.library.lock().await.find_recipe(*id).is_none() {
                    return Err(format!("Recipe not found: {}", id).into());
                }

                let filename = import_image_file(&ctx.config.images_dir(), path).await?;
                let previous = ctx
                    .library
                    .lock()
                    .await
                    .set_recipe_image(*id, filename)
                    .await?;
                if let Some(previous) = previous {
                    let _ = std::fs::remove_file(ctx.config.images_dir().join(previous));
                }
                println!("Image set. It will be uploaded on the next sync.");
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ingredient() {
        let ingredient = parse_ingredient("flour = 2 cups").unwrap();
        assert_eq!(ingredient.name, "flour");
        assert_eq!(ingredient.amount, "2 cups");

        assert!(parse_ingredient("flour").is_err());
        assert!(parse_ingredient("=2 cups").is_err());
    }
}
