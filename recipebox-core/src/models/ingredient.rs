use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// A single ingredient line of a recipe.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Ingredient {
    pub id: Uuid,
    /// Owning recipe (non-owning back reference).
    pub recipe_id: Uuid,
    pub name: String,
    /// Free-form amount as written in the source, e.g. "2 cups".
    pub amount: String,
    pub substitutions: Vec<String>,
}

impl Ingredient {
    pub fn new(recipe_id: Uuid, name: impl Into<String>, amount: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            recipe_id,
            name: name.into(),
            amount: amount.into(),
            substitutions: Vec::new(),
        }
    }

    pub fn with_substitutions(mut self, substitutions: Vec<String>) -> Self {
        self.substitutions = substitutions;
        self
    }
}

impl fmt::Display for Ingredient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.amount.is_empty() {
            write!(f, "{}", self.name)?;
        } else {
            write!(f, "{} {}", self.amount, self.name)?;
        }
        if !self.substitutions.is_empty() {
            write!(f, " (or {})", self.substitutions.join(", "))?;
        }
        Ok(())
    }
}
