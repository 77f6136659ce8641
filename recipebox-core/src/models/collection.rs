use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use super::group::Group;
use super::recipe::Recipe;

/// Top-level container of groups. The unit of sharing and versioning.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Collection {
    pub id: Uuid,
    pub name: String,
    /// Only ever increases.
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub last_modified: DateTime<Utc>,
    pub shared: bool,
    /// Local edits not yet confirmed pushed.
    pub dirty: bool,
    pub groups: Vec<Group>,
}

impl Collection {
    pub fn new(name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            version: 1,
            created_at: now,
            last_modified: now,
            shared: false,
            dirty: false,
            groups: Vec::new(),
        }
    }

    pub fn with_version(mut self, version: i64) -> Self {
        self.version = version;
        self
    }

    pub fn shared(mut self) -> Self {
        self.shared = true;
        self
    }

    /// Adds a group, re-pointing its back reference at this collection.
    pub fn with_group(mut self, mut group: Group) -> Self {
        group.collection_id = self.id;
        self.groups.push(group);
        self
    }

    /// Records a local edit.
    ///
    /// The version is bumped on the clean to dirty transition only, so any number
    /// of edits between two pushes cost a single version.
    pub fn mark_edited(&mut self) {
        if !self.dirty {
            self.version += 1;
        }
        self.dirty = true;
        self.last_modified = Utc::now();
    }

    pub fn group(&self, id: Uuid) -> Option<&Group> {
        self.groups.iter().find(|g| g.id == id)
    }

    pub fn group_mut(&mut self, id: Uuid) -> Option<&mut Group> {
        self.groups.iter_mut().find(|g| g.id == id)
    }

    pub fn recipes(&self) -> impl Iterator<Item = &Recipe> {
        self.groups.iter().flat_map(|g| g.recipes.iter())
    }

    pub fn recipes_mut(&mut self) -> impl Iterator<Item = &mut Recipe> {
        self.groups.iter_mut().flat_map(|g| g.recipes.iter_mut())
    }

    pub fn recipe_mut(&mut self, id: Uuid) -> Option<&mut Recipe> {
        self.recipes_mut().find(|r| r.id == id)
    }

    pub fn recipe_count(&self) -> usize {
        self.groups.iter().map(|g| g.recipes.len()).sum()
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.name)?;
        writeln!(f, "{}", "=".repeat(self.name.len()))?;
        writeln!(f, "ID:       {}", self.id)?;
        writeln!(
            f,
            "Version:  {}{}",
            self.version,
            if self.dirty { " (unsynced changes)" } else { "" }
        )?;
        writeln!(f, "Shared:   {}", if self.shared { "yes" } else { "no" })?;
        writeln!(f, "Modified: {}", self.last_modified.format("%Y-%m-%d %H:%M"))?;

        for group in &self.groups {
            writeln!(f, "\n{} ({})", group.name, group.id)?;
            for recipe in &group.recipes {
                writeln!(f, "  - {} ({})", recipe.title, recipe.id)?;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collection_new() {
        let collection = Collection::new("Family");
        assert_eq!(collection.name, "Family");
        assert_eq!(collection.version, 1);
        assert!(!collection.shared);
        assert!(!collection.dirty);
    }

    #[test]
    fn test_mark_edited_bumps_once_per_dirty_cycle() {
        let mut collection = Collection::new("Family");
        collection.mark_edited();
        collection.mark_edited();
        assert_eq!(collection.version, 2);
        assert!(collection.dirty);

        collection.dirty = false;
        collection.mark_edited();
        assert_eq!(collection.version, 3);
    }

    #[test]
    fn test_builders_set_back_references() {
        let collection = Collection::new("Family").with_group(
            Group::new(Uuid::nil(), "Dinners")
                .with_recipe(Recipe::new(Uuid::nil(), "Chili", "https://example.com/chili")),
        );
        let group = &collection.groups[0];
        assert_eq!(group.collection_id, collection.id);
        assert_eq!(group.recipes[0].group_id, group.id);
        assert_eq!(collection.recipe_count(), 1);
    }
}
