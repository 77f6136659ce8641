//! Wire representation of a collection subtree.
//!
//! A snapshot is a fully denormalized copy of a [`Collection`] used for push and
//! fetch. Images only appear as their remote URL; local filenames, the dirty flag
//! and other device-local state never leave the device.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{Collection, Group, Ingredient, Nutrition, Recipe};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CollectionSnapshot {
    pub id: Uuid,
    pub name: String,
    pub version: i64,
    pub last_modified: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub shared: bool,
    #[serde(default)]
    pub groups: Vec<GroupSnapshot>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GroupSnapshot {
    pub id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub items: Vec<RecipeSnapshot>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RecipeSnapshot {
    pub id: Uuid,
    pub url: String,
    pub title: String,
    pub site_name: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub ingredients: Vec<IngredientSnapshot>,
    #[serde(default)]
    pub steps: Vec<String>,
    #[serde(flatten)]
    pub nutrition: Nutrition,
    #[serde(
        rename = "heroImageURL",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub hero_image_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IngredientSnapshot {
    pub id: Uuid,
    pub name: String,
    pub amount: String,
    #[serde(default, rename = "substitution")]
    pub substitutions: Vec<String>,
}

impl From<&Collection> for CollectionSnapshot {
    fn from(collection: &Collection) -> Self {
        Self {
            id: collection.id,
            name: collection.name.clone(),
            version: collection.version,
            last_modified: collection.last_modified,
            created_at: collection.created_at,
            shared: collection.shared,
            groups: collection.groups.iter().map(GroupSnapshot::from).collect(),
        }
    }
}

impl From<&Group> for GroupSnapshot {
    fn from(group: &Group) -> Self {
        Self {
            id: group.id,
            name: group.name.clone(),
            created_at: group.created_at,
            items: group.recipes.iter().map(RecipeSnapshot::from).collect(),
        }
    }
}

impl From<&Recipe> for RecipeSnapshot {
    fn from(recipe: &Recipe) -> Self {
        Self {
            id: recipe.id,
            url: recipe.url.clone(),
            title: recipe.title.clone(),
            site_name: recipe.site_name.clone(),
            created_at: recipe.created_at,
            ingredients: recipe
                .ingredients
                .iter()
                .map(IngredientSnapshot::from)
                .collect(),
            steps: recipe.steps.clone(),
            nutrition: recipe.nutrition,
            hero_image_url: recipe.remote_image_url.clone(),
        }
    }
}

impl From<&Ingredient> for IngredientSnapshot {
    fn from(ingredient: &Ingredient) -> Self {
        Self {
            id: ingredient.id,
            name: ingredient.name.clone(),
            amount: ingredient.amount.clone(),
            substitutions: ingredient.substitutions.clone(),
        }
    }
}
