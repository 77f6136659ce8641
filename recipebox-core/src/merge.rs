//! Authoritative tree merge.
//!
//! Applying a remote snapshot replaces the content of the local tree while
//! keeping the identity of every entity that exists on both sides, so local-only
//! state (image files, pending uploads) survives a merge. Each level of the tree
//! is reconciled the same way: children are matched by id, matched children are
//! updated in place, unmatched incoming children are created and unmatched local
//! children are deleted together with their subtree.

use std::collections::{HashMap, HashSet};

use uuid::Uuid;

use crate::models::{Collection, Group, Ingredient, Recipe};
use crate::snapshot::{CollectionSnapshot, GroupSnapshot, IngredientSnapshot, RecipeSnapshot};

/// A hero image that has to be fetched after a merge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadRequest {
    pub recipe_id: Uuid,
    pub url: String,
}

/// What a merge changed, and the follow-up work it left for the image pipeline.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MergeReport {
    pub inserted: usize,
    pub updated: usize,
    pub removed: usize,
    pub downloads: Vec<DownloadRequest>,
    /// Recipes deleted by the merge, including those under deleted groups.
    pub removed_recipes: Vec<Uuid>,
    /// Local image files that no longer belong to any recipe.
    pub discarded_images: Vec<String>,
}

trait Reconcile: Sized {
    type Snapshot;

    fn id(&self) -> Uuid;
    fn snapshot_id(snapshot: &Self::Snapshot) -> Uuid;
    fn update_from(&mut self, snapshot: &Self::Snapshot, report: &mut MergeReport);
    fn build(snapshot: &Self::Snapshot, parent_id: Uuid, report: &mut MergeReport) -> Self;
    fn removed(self, report: &mut MergeReport);
}

/// Reconciles one level of children against the incoming list.
///
/// The result follows the incoming order. Duplicate incoming ids keep the
/// first occurrence.
fn reconcile<T: Reconcile>(
    children: &mut Vec<T>,
    incoming: &[T::Snapshot],
    parent_id: Uuid,
    report: &mut MergeReport,
) {
    let mut existing: HashMap<Uuid, T> = children.drain(..).map(|c| (c.id(), c)).collect();
    let mut seen = HashSet::with_capacity(incoming.len());
    let mut merged = Vec::with_capacity(incoming.len());

    for snapshot in incoming {
        let id = T::snapshot_id(snapshot);
        if !seen.insert(id) {
            tracing::warn!("Duplicate id {} in snapshot, keeping the first occurrence", id);
            continue;
        }
        match existing.remove(&id) {
            Some(mut child) => {
                child.update_from(snapshot, report);
                report.updated += 1;
                merged.push(child);
            }
            None => {
                merged.push(T::build(snapshot, parent_id, report));
                report.inserted += 1;
            }
        }
    }

    for (_, child) in existing {
        child.removed(report);
    }

    *children = merged;
}

impl Reconcile for Group {
    type Snapshot = GroupSnapshot;

    fn id(&self) -> Uuid {
        self.id
    }

    fn snapshot_id(snapshot: &GroupSnapshot) -> Uuid {
        snapshot.id
    }

    fn update_from(&mut self, snapshot: &GroupSnapshot, report: &mut MergeReport) {
        self.name = snapshot.name.clone();
        self.created_at = snapshot.created_at;
        reconcile(&mut self.recipes, &snapshot.items, self.id, report);
    }

    fn build(snapshot: &GroupSnapshot, parent_id: Uuid, report: &mut MergeReport) -> Self {
        let mut group = Group::new(parent_id, snapshot.name.clone());
        group.id = snapshot.id;
        group.created_at = snapshot.created_at;
        reconcile(&mut group.recipes, &snapshot.items, group.id, report);
        group
    }

    fn removed(self, report: &mut MergeReport) {
        report.removed += 1;
        for recipe in self.recipes {
            recipe.removed(report);
        }
    }
}

impl Reconcile for Recipe {
    type Snapshot = RecipeSnapshot;

    fn id(&self) -> Uuid {
        self.id
    }

    fn snapshot_id(snapshot: &RecipeSnapshot) -> Uuid {
        snapshot.id
    }

    fn update_from(&mut self, snapshot: &RecipeSnapshot, report: &mut MergeReport) {
        self.url = snapshot.url.clone();
        self.title = snapshot.title.clone();
        self.site_name = snapshot.site_name.clone();
        self.created_at = snapshot.created_at;
        self.steps = snapshot.steps.clone();
        self.nutrition = snapshot.nutrition;
        reconcile(&mut self.ingredients, &snapshot.ingredients, self.id, report);
        self.apply_remote_image(snapshot.hero_image_url.as_deref(), report);
    }

    fn build(snapshot: &RecipeSnapshot, parent_id: Uuid, report: &mut MergeReport) -> Self {
        let mut recipe = Recipe::new(parent_id, snapshot.title.clone(), snapshot.url.clone());
        recipe.id = snapshot.id;
        recipe.update_from(snapshot, report);
        recipe
    }

    fn removed(self, report: &mut MergeReport) {
        report.removed += 1;
        report.removed_recipes.push(self.id);
        if let Some(filename) = self.local_image {
            report.discarded_images.push(filename);
        }
    }
}

impl Recipe {
    fn apply_remote_image(&mut self, incoming: Option<&str>, report: &mut MergeReport) {
        match incoming {
            Some(url) => {
                if self.last_seen_remote_url.as_deref() != Some(url) {
                    // The remote image replaces whatever was waiting to go up.
                    self.upload_pending = false;
                    report.downloads.push(DownloadRequest {
                        recipe_id: self.id,
                        url: url.to_string(),
                    });
                }
                self.remote_image_url = Some(url.to_string());
            }
            None if self.upload_pending => {}
            None => {
                if let Some(filename) = self.local_image.take() {
                    report.discarded_images.push(filename);
                }
                self.remote_image_url = None;
                self.last_seen_remote_url = None;
            }
        }
    }
}

impl Reconcile for Ingredient {
    type Snapshot = IngredientSnapshot;

    fn id(&self) -> Uuid {
        self.id
    }

    fn snapshot_id(snapshot: &IngredientSnapshot) -> Uuid {
        snapshot.id
    }

    fn update_from(&mut self, snapshot: &IngredientSnapshot, _report: &mut MergeReport) {
        self.name = snapshot.name.clone();
        self.amount = snapshot.amount.clone();
        self.substitutions = snapshot.substitutions.clone();
    }

    fn build(snapshot: &IngredientSnapshot, parent_id: Uuid, report: &mut MergeReport) -> Self {
        let mut ingredient = Ingredient::new(parent_id, "", "");
        ingredient.id = snapshot.id;
        ingredient.update_from(snapshot, report);
        ingredient
    }

    fn removed(self, report: &mut MergeReport) {
        report.removed += 1;
    }
}

/// Overwrites `local` with the content of `remote`.
///
/// The caller guarantees both describe the same collection. The local copy ends
/// up clean at the remote version.
pub fn merge_collection(local: &mut Collection, remote: &CollectionSnapshot) -> MergeReport {
    debug_assert_eq!(local.id, remote.id);

    let mut report = MergeReport::default();
    local.name = remote.name.clone();
    local.version = remote.version;
    local.created_at = remote.created_at;
    local.last_modified = remote.last_modified;
    local.shared = remote.shared;
    local.dirty = false;
    reconcile(&mut local.groups, &remote.groups, local.id, &mut report);

    tracing::debug!(
        "Merged collection {} at version {}: {} inserted, {} updated, {} removed",
        local.id,
        local.version,
        report.inserted,
        report.updated,
        report.removed
    );
    report
}

/// Builds a new local collection from a snapshot that has no local counterpart.
pub fn build_collection(remote: &CollectionSnapshot) -> (Collection, MergeReport) {
    let mut collection = Collection::new(remote.name.clone());
    collection.id = remote.id;
    let report = merge_collection(&mut collection, remote);
    (collection, report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Nutrition;

    const HERO: &str = "https://images.example.com/hero.jpg";

    fn recipe_snapshot(title: &str) -> RecipeSnapshot {
        RecipeSnapshot::from(&Recipe::new(Uuid::nil(), title, "https://example.com"))
    }

    fn group_snapshot(name: &str, items: Vec<RecipeSnapshot>) -> GroupSnapshot {
        let mut snapshot = GroupSnapshot::from(&Group::new(Uuid::nil(), name));
        snapshot.items = items;
        snapshot
    }

    fn collection_with_group(version: i64, group: Group) -> Collection {
        Collection::new("Family")
            .with_version(version)
            .shared()
            .with_group(group)
    }

    #[test]
    fn test_merge_replaces_content_and_keeps_identity() {
        let mut local_recipe = Recipe::new(Uuid::nil(), "Soup", "");
        local_recipe.local_image = Some("soup.jpg".into());
        local_recipe.last_seen_remote_url = Some(HERO.into());
        local_recipe.remote_image_url = Some(HERO.into());
        let recipe_id = local_recipe.id;

        let mut local = collection_with_group(3, Group::new(Uuid::nil(), "Soups").with_recipe(local_recipe));
        local.dirty = true;

        let mut remote = CollectionSnapshot::from(&local);
        remote.version = 5;
        remote.name = "Family Favorites".into();
        remote.groups[0].items[0].title = "Tomato Soup".into();
        remote.groups[0].items[0].nutrition = Nutrition {
            calories: Some(200.0),
            ..Default::default()
        };

        let report = merge_collection(&mut local, &remote);

        assert_eq!(local.version, 5);
        assert_eq!(local.name, "Family Favorites");
        assert!(!local.dirty);
        let recipe = &local.groups[0].recipes[0];
        assert_eq!(recipe.id, recipe_id);
        assert_eq!(recipe.title, "Tomato Soup");
        assert_eq!(recipe.nutrition.calories, Some(200.0));
        assert_eq!(recipe.local_image.as_deref(), Some("soup.jpg"));
        assert!(report.downloads.is_empty());
        assert_eq!(report.inserted, 0);
    }

    #[test]
    fn test_merge_adds_and_removes_groups() {
        let g1 = Group::new(Uuid::nil(), "G1").with_recipe(Recipe::new(Uuid::nil(), "A", ""));
        let g1_recipe = g1.recipes[0].id;
        let mut local = collection_with_group(3, g1);

        let mut remote = CollectionSnapshot::from(&local);
        remote.version = 4;
        remote.groups = vec![group_snapshot("G2", vec![recipe_snapshot("B")])];
        let g2_id = remote.groups[0].id;

        let report = merge_collection(&mut local, &remote);

        assert_eq!(local.groups.len(), 1);
        assert_eq!(local.groups[0].id, g2_id);
        assert_eq!(local.groups[0].name, "G2");
        assert_eq!(local.groups[0].recipes[0].title, "B");
        assert_eq!(local.groups[0].recipes[0].group_id, g2_id);
        assert_eq!(local.groups[0].collection_id, local.id);
        assert_eq!(report.removed_recipes, vec![g1_recipe]);
    }

    #[test]
    fn test_merge_trims_group_and_adds_another() {
        let g1 = Group::new(Uuid::nil(), "G1")
            .with_recipe(Recipe::new(Uuid::nil(), "A", ""))
            .with_recipe(Recipe::new(Uuid::nil(), "B", ""));
        let g1_id = g1.id;
        let (kept, dropped) = (g1.recipes[0].id, g1.recipes[1].id);
        let mut local = collection_with_group(3, g1);

        let mut remote = CollectionSnapshot::from(&local);
        remote.version = 4;
        remote.groups[0].items.truncate(1);
        remote.groups[0].items[0].title = "A2".into();
        remote.groups.push(group_snapshot("G2", vec![recipe_snapshot("C")]));
        let g2_id = remote.groups[1].id;

        let report = merge_collection(&mut local, &remote);

        assert_eq!(local.groups.len(), 2);
        assert_eq!(local.groups[0].id, g1_id);
        assert_eq!(local.groups[0].recipes.len(), 1);
        assert_eq!(local.groups[0].recipes[0].id, kept);
        assert_eq!(local.groups[0].recipes[0].title, "A2");
        assert_eq!(local.groups[1].id, g2_id);
        assert_eq!(local.groups[1].collection_id, local.id);
        assert_eq!(local.groups[1].recipes[0].title, "C");
        assert_eq!(local.groups[1].recipes[0].group_id, g2_id);
        assert_eq!(report.removed_recipes, vec![dropped]);
        assert!(local.recipes().all(|r| r.id != dropped));
    }

    #[test]
    fn test_removed_subtree_reports_images() {
        let mut recipe = Recipe::new(Uuid::nil(), "Bread", "");
        recipe.local_image = Some("bread.jpg".into());
        let mut local = collection_with_group(1, Group::new(Uuid::nil(), "Baking").with_recipe(recipe));

        let mut remote = CollectionSnapshot::from(&local);
        remote.version = 2;
        remote.groups[0].items.clear();

        let report = merge_collection(&mut local, &remote);

        assert!(local.groups[0].recipes.is_empty());
        assert_eq!(report.removed, 1);
        assert_eq!(report.discarded_images, vec!["bread.jpg".to_string()]);
    }

    #[test]
    fn test_merge_is_idempotent() {
        let mut local = collection_with_group(1, Group::new(Uuid::nil(), "Old"));
        let mut remote = CollectionSnapshot::from(&collection_with_group(
            2,
            Group::new(Uuid::nil(), "New")
                .with_recipe(Recipe::new(Uuid::nil(), "A", ""))
                .with_recipe(Recipe::new(Uuid::nil(), "B", "")),
        ));
        remote.id = local.id;

        merge_collection(&mut local, &remote);
        let once = local.clone();
        let report = merge_collection(&mut local, &remote);

        assert_eq!(local, once);
        assert_eq!(report.inserted, 0);
        assert_eq!(report.removed, 0);
        assert_eq!(local.recipe_count(), 2);
    }

    #[test]
    fn test_merge_follows_incoming_order() {
        let a = Recipe::new(Uuid::nil(), "A", "");
        let b = Recipe::new(Uuid::nil(), "B", "");
        let mut local = collection_with_group(
            1,
            Group::new(Uuid::nil(), "G").with_recipe(a).with_recipe(b),
        );

        let mut remote = CollectionSnapshot::from(&local);
        remote.version = 2;
        remote.groups[0].items.reverse();

        merge_collection(&mut local, &remote);

        let titles: Vec<_> = local.groups[0].recipes.iter().map(|r| r.title.as_str()).collect();
        assert_eq!(titles, vec!["B", "A"]);
    }

    #[test]
    fn test_duplicate_ids_keep_first() {
        let mut local = collection_with_group(1, Group::new(Uuid::nil(), "G"));
        let mut remote = CollectionSnapshot::from(&local);
        remote.version = 2;
        let first = recipe_snapshot("First");
        let mut second = first.clone();
        second.title = "Second".into();
        remote.groups[0].items = vec![first, second];

        merge_collection(&mut local, &remote);

        assert_eq!(local.groups[0].recipes.len(), 1);
        assert_eq!(local.groups[0].recipes[0].title, "First");
    }

    #[test]
    fn test_unchanged_hero_url_schedules_nothing() {
        let mut recipe = Recipe::new(Uuid::nil(), "Pie", "");
        recipe.remote_image_url = Some(HERO.into());
        recipe.last_seen_remote_url = Some(HERO.into());
        recipe.local_image = Some("pie.jpg".into());
        let mut local = collection_with_group(1, Group::new(Uuid::nil(), "G").with_recipe(recipe));

        let mut remote = CollectionSnapshot::from(&local);
        remote.version = 2;

        let report = merge_collection(&mut local, &remote);
        assert!(report.downloads.is_empty());
    }

    #[test]
    fn test_changed_hero_url_schedules_one_download() {
        let mut recipe = Recipe::new(Uuid::nil(), "Pie", "");
        recipe.remote_image_url = Some(HERO.into());
        recipe.last_seen_remote_url = Some(HERO.into());
        recipe.local_image = Some("pie.jpg".into());
        let recipe_id = recipe.id;
        let mut local = collection_with_group(1, Group::new(Uuid::nil(), "G").with_recipe(recipe));

        let mut remote = CollectionSnapshot::from(&local);
        remote.version = 2;
        remote.groups[0].items[0].hero_image_url = Some("https://images.example.com/new.jpg".into());

        let report = merge_collection(&mut local, &remote);

        assert_eq!(
            report.downloads,
            vec![DownloadRequest {
                recipe_id,
                url: "https://images.example.com/new.jpg".into()
            }]
        );
        let recipe = &local.groups[0].recipes[0];
        assert_eq!(recipe.image_state(), crate::models::ImageState::PendingDownload);
        // Bytes on disk stay until the download replaces them.
        assert_eq!(recipe.local_image.as_deref(), Some("pie.jpg"));
    }

    #[test]
    fn test_new_recipe_with_hero_schedules_download() {
        let mut local = collection_with_group(1, Group::new(Uuid::nil(), "G"));
        let mut remote = CollectionSnapshot::from(&local);
        remote.version = 2;
        let mut item = recipe_snapshot("Tacos");
        item.hero_image_url = Some(HERO.into());
        remote.groups[0].items.push(item);

        let report = merge_collection(&mut local, &remote);

        assert_eq!(report.inserted, 1);
        assert_eq!(report.downloads.len(), 1);
        assert_eq!(report.downloads[0].url, HERO);
    }

    #[test]
    fn test_cleared_hero_url_drops_local_copy() {
        let mut recipe = Recipe::new(Uuid::nil(), "Pie", "");
        recipe.remote_image_url = Some(HERO.into());
        recipe.last_seen_remote_url = Some(HERO.into());
        recipe.local_image = Some("pie.jpg".into());
        let mut local = collection_with_group(1, Group::new(Uuid::nil(), "G").with_recipe(recipe));

        let mut remote = CollectionSnapshot::from(&local);
        remote.version = 2;
        remote.groups[0].items[0].hero_image_url = None;

        let report = merge_collection(&mut local, &remote);

        let recipe = &local.groups[0].recipes[0];
        assert!(recipe.local_image.is_none());
        assert!(recipe.remote_image_url.is_none());
        assert_eq!(report.discarded_images, vec!["pie.jpg".to_string()]);
    }

    #[test]
    fn test_pending_upload_survives_merge_without_remote_image() {
        let mut recipe = Recipe::new(Uuid::nil(), "Pie", "");
        recipe.local_image = Some("new.jpg".into());
        recipe.upload_pending = true;
        let mut local = collection_with_group(1, Group::new(Uuid::nil(), "G").with_recipe(recipe));

        let mut remote = CollectionSnapshot::from(&local);
        remote.version = 2;

        merge_collection(&mut local, &remote);

        let recipe = &local.groups[0].recipes[0];
        assert!(recipe.upload_pending);
        assert_eq!(recipe.local_image.as_deref(), Some("new.jpg"));
    }

    #[test]
    fn test_ingredients_are_reconciled() {
        let recipe = Recipe::new(Uuid::nil(), "Salad", "")
            .with_ingredient(Ingredient::new(Uuid::nil(), "lettuce", "1 head"))
            .with_ingredient(Ingredient::new(Uuid::nil(), "croutons", "1 cup"));
        let kept = recipe.ingredients[0].id;
        let mut local = collection_with_group(1, Group::new(Uuid::nil(), "G").with_recipe(recipe));

        let mut remote = CollectionSnapshot::from(&local);
        remote.version = 2;
        let items = &mut remote.groups[0].items[0].ingredients;
        items.truncate(1);
        items[0].amount = "2 heads".into();

        let report = merge_collection(&mut local, &remote);

        let ingredients = &local.groups[0].recipes[0].ingredients;
        assert_eq!(ingredients.len(), 1);
        assert_eq!(ingredients[0].id, kept);
        assert_eq!(ingredients[0].amount, "2 heads");
        assert_eq!(report.removed, 1);
    }

    #[test]
    fn test_build_collection() {
        let source = collection_with_group(
            7,
            Group::new(Uuid::nil(), "G").with_recipe(Recipe::new(Uuid::nil(), "A", "")),
        );
        let snapshot = CollectionSnapshot::from(&source);

        let (built, report) = build_collection(&snapshot);

        assert_eq!(built.id, source.id);
        assert_eq!(built.version, 7);
        assert!(built.shared);
        assert!(!built.dirty);
        assert_eq!(built.recipe_count(), 1);
        assert_eq!(report.inserted, 2);
    }
}
