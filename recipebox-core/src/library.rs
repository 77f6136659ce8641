//! The local entity tree and its single owner.
//!
//! All reads and writes of the tree go through [`Library`], which keeps the
//! in-memory collections and writes each change through to SQLite. Callers share
//! it as a [`SharedLibrary`] so that user edits, merges and image completions are
//! serialized against one owner.

use std::sync::Arc;

use tokio::sync::Mutex;
use uuid::Uuid;

use crate::db::CollectionRepository;
use crate::error::StoreError;
use crate::merge::{build_collection, merge_collection, MergeReport};
use crate::models::{Collection, Group, Ingredient, Recipe};
use crate::snapshot::CollectionSnapshot;

pub type SharedLibrary = Arc<Mutex<Library>>;

pub struct Library {
    collections: Vec<Collection>,
    repo: CollectionRepository,
}

impl Library {
    /// Loads every persisted collection.
    pub async fn open(repo: CollectionRepository) -> Result<Self, StoreError> {
        let collections = repo.list().await?;
        tracing::debug!("Loaded {} collection(s)", collections.len());
        Ok(Self { collections, repo })
    }

    pub fn into_shared(self) -> SharedLibrary {
        Arc::new(Mutex::new(self))
    }

    pub fn collections(&self) -> &[Collection] {
        &self.collections
    }

    pub fn get(&self, id: Uuid) -> Option<&Collection> {
        self.collections.iter().find(|c| c.id == id)
    }

    fn get_mut(&mut self, id: Uuid) -> Result<&mut Collection, StoreError> {
        self.collections
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or(StoreError::CollectionNotFound(id))
    }

    /// Ids of every collection taking part in sync.
    pub fn shared_ids(&self) -> Vec<Uuid> {
        self.collections
            .iter()
            .filter(|c| c.shared)
            .map(|c| c.id)
            .collect()
    }

    pub fn find_recipe(&self, recipe_id: Uuid) -> Option<&Recipe> {
        self.collections
            .iter()
            .flat_map(|c| c.recipes())
            .find(|r| r.id == recipe_id)
    }

    /// Finds a recipe anywhere in the tree, with the id of its collection.
    pub(crate) fn find_recipe_mut(&mut self, recipe_id: Uuid) -> Option<(Uuid, &mut Recipe)> {
        self.collections.iter_mut().find_map(|c| {
            let collection_id = c.id;
            c.recipe_mut(recipe_id).map(|r| (collection_id, r))
        })
    }

    fn collection_of_group(&self, group_id: Uuid) -> Result<Uuid, StoreError> {
        self.collections
            .iter()
            .find(|c| c.group(group_id).is_some())
            .map(|c| c.id)
            .ok_or(StoreError::GroupNotFound(group_id))
    }

    fn collection_of_recipe(&self, recipe_id: Uuid) -> Result<Uuid, StoreError> {
        self.collections
            .iter()
            .find(|c| c.recipes().any(|r| r.id == recipe_id))
            .map(|c| c.id)
            .ok_or(StoreError::RecipeNotFound(recipe_id))
    }

    /// Writes one collection through to the database.
    pub async fn persist(&self, id: Uuid) -> Result<(), StoreError> {
        match self.get(id) {
            Some(collection) => self.repo.save(collection).await,
            None => Ok(()),
        }
    }

    /// Applies a local edit to a collection, then records it as edited and saves.
    async fn edit<T>(
        &mut self,
        id: Uuid,
        change: impl FnOnce(&mut Collection) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let collection = self.get_mut(id)?;
        let result = change(collection)?;
        collection.mark_edited();
        self.persist(id).await?;
        Ok(result)
    }

    // Local edits

    pub async fn create_collection(&mut self, name: impl Into<String>) -> Result<Uuid, StoreError> {
        let collection = Collection::new(name);
        let id = collection.id;
        self.repo.save(&collection).await?;
        self.collections.push(collection);
        Ok(id)
    }

    pub async fn rename_collection(&mut self, id: Uuid, name: &str) -> Result<(), StoreError> {
        self.edit(id, |c| {
            c.name = name.to_string();
            Ok(())
        })
        .await
    }

    pub async fn set_shared(&mut self, id: Uuid, shared: bool) -> Result<(), StoreError> {
        self.edit(id, |c| {
            c.shared = shared;
            Ok(())
        })
        .await
    }

    /// Removes a collection and everything under it.
    pub async fn delete_collection(&mut self, id: Uuid) -> Result<Collection, StoreError> {
        let index = self
            .collections
            .iter()
            .position(|c| c.id == id)
            .ok_or(StoreError::CollectionNotFound(id))?;
        self.repo.delete(id).await?;
        Ok(self.collections.remove(index))
    }

    pub async fn add_group(&mut self, collection_id: Uuid, name: &str) -> Result<Uuid, StoreError> {
        self.edit(collection_id, |c| {
            let group = Group::new(c.id, name);
            let id = group.id;
            c.groups.push(group);
            Ok(id)
        })
        .await
    }

    pub async fn add_recipe(&mut self, group_id: Uuid, mut recipe: Recipe) -> Result<Uuid, StoreError> {
        let collection_id = self.collection_of_group(group_id)?;
        self.edit(collection_id, |c| {
            let group = c
                .group_mut(group_id)
                .ok_or(StoreError::GroupNotFound(group_id))?;
            recipe.group_id = group_id;
            for ingredient in &mut recipe.ingredients {
                ingredient.recipe_id = recipe.id;
            }
            let id = recipe.id;
            group.recipes.push(recipe);
            Ok(id)
        })
        .await
    }

    pub async fn remove_recipe(&mut self, recipe_id: Uuid) -> Result<Recipe, StoreError> {
        let collection_id = self.collection_of_recipe(recipe_id)?;
        self.edit(collection_id, |c| {
            c.groups
                .iter_mut()
                .find_map(|g| {
                    let index = g.recipes.iter().position(|r| r.id == recipe_id)?;
                    Some(g.recipes.remove(index))
                })
                .ok_or(StoreError::RecipeNotFound(recipe_id))
        })
        .await
    }

    pub async fn add_ingredient(
        &mut self,
        recipe_id: Uuid,
        mut ingredient: Ingredient,
    ) -> Result<Uuid, StoreError> {
        let collection_id = self.collection_of_recipe(recipe_id)?;
        self.edit(collection_id, |c| {
            let recipe = c
                .recipe_mut(recipe_id)
                .ok_or(StoreError::RecipeNotFound(recipe_id))?;
            ingredient.recipe_id = recipe_id;
            let id = ingredient.id;
            recipe.ingredients.push(ingredient);
            Ok(id)
        })
        .await
    }

    /// Points a recipe at a new local image and queues it for upload.
    ///
    /// Returns the filename of the image it replaced, if any.
    pub async fn set_recipe_image(
        &mut self,
        recipe_id: Uuid,
        filename: String,
    ) -> Result<Option<String>, StoreError> {
        let collection_id = self.collection_of_recipe(recipe_id)?;
        self.edit(collection_id, |c| {
            let recipe = c
                .recipe_mut(recipe_id)
                .ok_or(StoreError::RecipeNotFound(recipe_id))?;
            recipe.upload_pending = true;
            Ok(recipe.local_image.replace(filename))
        })
        .await
    }

    // Sync bookkeeping

    /// Makes sure the collection carries a version newer than the last push, then
    /// clears dirty ahead of an explicit push.
    pub(crate) async fn stage_push(&mut self, id: Uuid) -> Result<i64, StoreError> {
        let collection = self.get_mut(id)?;
        if !collection.dirty {
            collection.mark_edited();
        }
        collection.dirty = false;
        let version = collection.version;
        self.persist(id).await?;
        Ok(version)
    }

    /// Clears dirty and takes the snapshot to push, in one step.
    pub(crate) async fn begin_push(&mut self, id: Uuid) -> Result<CollectionSnapshot, StoreError> {
        let collection = self.get_mut(id)?;
        collection.dirty = false;
        let snapshot = CollectionSnapshot::from(&*collection);
        self.persist(id).await?;
        Ok(snapshot)
    }

    /// Re-marks a collection after a failed push. Does not bump the version.
    pub(crate) async fn mark_dirty(&mut self, id: Uuid) -> Result<(), StoreError> {
        self.get_mut(id)?.dirty = true;
        self.persist(id).await
    }

    /// Applies an authoritative snapshot: merges into the matching collection or
    /// builds a new one.
    pub(crate) async fn apply_snapshot(
        &mut self,
        snapshot: &CollectionSnapshot,
    ) -> Result<MergeReport, StoreError> {
        let report = match self.collections.iter_mut().find(|c| c.id == snapshot.id) {
            Some(local) => merge_collection(local, snapshot),
            None => {
                let (collection, report) = build_collection(snapshot);
                self.collections.push(collection);
                report
            }
        };
        self.persist(snapshot.id).await?;
        Ok(report)
    }
}
