use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use super::image_state::ImageState;
use super::ingredient::Ingredient;
use super::nutrition::Nutrition;

/// A recipe saved into a group.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Recipe {
    pub id: Uuid,
    /// Owning group (non-owning back reference).
    pub group_id: Uuid,
    /// Page the recipe was saved from.
    pub url: String,
    pub title: String,
    pub site_name: String,
    pub created_at: DateTime<Utc>,
    pub steps: Vec<String>,
    pub nutrition: Nutrition,
    pub ingredients: Vec<Ingredient>,
    /// Filename of the local image copy inside the images directory.
    pub local_image: Option<String>,
    /// Remote URL of the hero image, as carried in snapshots.
    pub remote_image_url: Option<String>,
    /// Remote URL whose bytes `local_image` holds.
    pub last_seen_remote_url: Option<String>,
    /// The local image still has to be uploaded.
    pub upload_pending: bool,
}

impl Recipe {
    pub fn new(group_id: Uuid, title: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            group_id,
            url: url.into(),
            title: title.into(),
            site_name: String::new(),
            created_at: Utc::now(),
            steps: Vec::new(),
            nutrition: Nutrition::default(),
            ingredients: Vec::new(),
            local_image: None,
            remote_image_url: None,
            last_seen_remote_url: None,
            upload_pending: false,
        }
    }

    pub fn with_site_name(mut self, site_name: impl Into<String>) -> Self {
        self.site_name = site_name.into();
        self
    }

    pub fn with_steps(mut self, steps: Vec<String>) -> Self {
        self.steps = steps;
        self
    }

    pub fn with_nutrition(mut self, nutrition: Nutrition) -> Self {
        self.nutrition = nutrition;
        self
    }

    /// Adds an ingredient, re-pointing its back reference at this recipe.
    pub fn with_ingredient(mut self, mut ingredient: Ingredient) -> Self {
        ingredient.recipe_id = self.id;
        self.ingredients.push(ingredient);
        self
    }

    /// Stored image state, ignoring transfers that are currently in flight.
    pub fn image_state(&self) -> ImageState {
        if self.local_image.is_some() && self.upload_pending {
            return ImageState::PendingUpload;
        }
        if self.remote_image_url.is_some() && self.remote_image_url != self.last_seen_remote_url {
            return ImageState::PendingDownload;
        }
        match (&self.local_image, &self.last_seen_remote_url) {
            (Some(_), Some(_)) => ImageState::Synced,
            (Some(_), None) => ImageState::PendingUpload,
            _ => ImageState::NoImage,
        }
    }
}

impl fmt::Display for Recipe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.title)?;
        writeln!(f, "{}", "=".repeat(self.title.len()))?;

        if !self.site_name.is_empty() {
            writeln!(f, "From: {} ({})", self.site_name, self.url)?;
        } else if !self.url.is_empty() {
            writeln!(f, "From: {}", self.url)?;
        }
        writeln!(f, "Image: {}", self.image_state())?;

        if !self.ingredients.is_empty() {
            writeln!(f, "\nIngredients:")?;
            for ingredient in &self.ingredients {
                writeln!(f, "  - {}", ingredient)?;
            }
        }

        if !self.steps.is_empty() {
            writeln!(f, "\nSteps:")?;
            for (i, step) in self.steps.iter().enumerate() {
                writeln!(f, "  {}. {}", i + 1, step)?;
            }
        }

        if !self.nutrition.is_empty() {
            writeln!(f, "\nNutrition: {}", self.nutrition)?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_ingredient_sets_back_reference() {
        let recipe = Recipe::new(Uuid::new_v4(), "Pancakes", "https://example.com/p")
            .with_ingredient(Ingredient::new(Uuid::nil(), "flour", "1 cup"));
        assert_eq!(recipe.ingredients[0].recipe_id, recipe.id);
    }

    #[test]
    fn test_image_state_transitions() {
        let mut recipe = Recipe::new(Uuid::new_v4(), "Soup", "");
        assert_eq!(recipe.image_state(), ImageState::NoImage);

        recipe.local_image = Some("a.jpg".into());
        recipe.upload_pending = true;
        assert_eq!(recipe.image_state(), ImageState::PendingUpload);

        recipe.upload_pending = false;
        recipe.remote_image_url = Some("https://img/a.jpg".into());
        recipe.last_seen_remote_url = Some("https://img/a.jpg".into());
        assert_eq!(recipe.image_state(), ImageState::Synced);

        recipe.remote_image_url = Some("https://img/b.jpg".into());
        assert_eq!(recipe.image_state(), ImageState::PendingDownload);

        recipe.upload_pending = true;
        assert_eq!(recipe.image_state(), ImageState::PendingUpload);
    }

    #[test]
    fn test_remote_only_image_is_pending_download() {
        let mut recipe = Recipe::new(Uuid::new_v4(), "Bread", "");
        recipe.remote_image_url = Some("https://img/bread.jpg".into());
        assert_eq!(recipe.image_state(), ImageState::PendingDownload);
    }

    #[test]
    fn test_recipe_display() {
        let recipe = Recipe::new(Uuid::new_v4(), "Tacos", "https://example.com/tacos")
            .with_site_name("Example")
            .with_steps(vec!["Warm tortillas".into(), "Fill".into()])
            .with_ingredient(Ingredient::new(Uuid::nil(), "tortillas", "8"));

        let output = format!("{}", recipe);
        assert!(output.contains("Tacos"));
        assert!(output.contains("From: Example"));
        assert!(output.contains("8 tortillas"));
        assert!(output.contains("2. Fill"));
    }
}
