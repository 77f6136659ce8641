use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::recipe::Recipe;

/// A named group of recipes inside a collection (e.g. "Weeknight dinners").
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Group {
    pub id: Uuid,
    /// Owning collection (non-owning back reference).
    pub collection_id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub recipes: Vec<Recipe>,
}

impl Group {
    pub fn new(collection_id: Uuid, name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            collection_id,
            name: name.into(),
            created_at: Utc::now(),
            recipes: Vec::new(),
        }
    }

    /// Adds a recipe, re-pointing its back reference at this group.
    pub fn with_recipe(mut self, mut recipe: Recipe) -> Self {
        recipe.group_id = self.id;
        self.recipes.push(recipe);
        self
    }

    pub fn recipe(&self, id: Uuid) -> Option<&Recipe> {
        self.recipes.iter().find(|r| r.id == id)
    }
}
