use chrono::{DateTime, Utc};
use sqlx::{Sqlite, SqlitePool, Transaction};
use uuid::Uuid;

use crate::error::StoreError;
use crate::models::{Collection, Group, Ingredient, Nutrition, Recipe};

/// Persists whole collection subtrees.
#[derive(Debug, Clone)]
pub struct CollectionRepository {
    pool: SqlitePool,
}

#[derive(sqlx::FromRow)]
struct CollectionRow {
    id: String,
    name: String,
    version: i64,
    created_at: String,
    last_modified: String,
    shared: bool,
    dirty: bool,
}

#[derive(sqlx::FromRow)]
struct GroupRow {
    id: String,
    name: String,
    created_at: String,
}

#[derive(sqlx::FromRow)]
struct RecipeRow {
    id: String,
    url: String,
    title: String,
    site_name: String,
    created_at: String,
    steps: String,
    calories: Option<f64>,
    total_fat: Option<f64>,
    total_carbs: Option<f64>,
    total_protein: Option<f64>,
    total_sugar: Option<f64>,
    local_image: Option<String>,
    remote_image_url: Option<String>,
    last_seen_remote_url: Option<String>,
    upload_pending: bool,
}

#[derive(sqlx::FromRow)]
struct IngredientRow {
    id: String,
    name: String,
    amount: String,
    substitutions: String,
}

impl CollectionRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Writes the collection and replaces its whole subtree in one transaction.
    pub async fn save(&self, collection: &Collection) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;
        let id = collection.id.to_string();

        sqlx::query(
            r#"
            INSERT INTO collections (id, name, version, created_at, last_modified, shared, dirty)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                version = excluded.version,
                created_at = excluded.created_at,
                last_modified = excluded.last_modified,
                shared = excluded.shared,
                dirty = excluded.dirty
            "#,
        )
        .bind(&id)
        .bind(&collection.name)
        .bind(collection.version)
        .bind(collection.created_at.to_rfc3339())
        .bind(collection.last_modified.to_rfc3339())
        .bind(collection.shared)
        .bind(collection.dirty)
        .execute(&mut *tx)
        .await?;

        // CASCADE clears recipes and ingredients
        sqlx::query("DELETE FROM recipe_groups WHERE collection_id = ?")
            .bind(&id)
            .execute(&mut *tx)
            .await?;

        for (position, group) in collection.groups.iter().enumerate() {
            insert_group(&mut tx, &id, position as i64, group).await?;
        }

        tx.commit().await?;
        Ok(())
    }

    pub async fn list(&self) -> Result<Vec<Collection>, StoreError> {
        let rows: Vec<CollectionRow> =
            sqlx::query_as("SELECT * FROM collections ORDER BY created_at, name")
                .fetch_all(&self.pool)
                .await?;

        let mut collections = Vec::with_capacity(rows.len());
        for row in rows {
            collections.push(self.hydrate_collection(row).await?);
        }
        Ok(collections)
    }

    pub async fn delete(&self, id: Uuid) -> Result<(), StoreError> {
        // CASCADE handles groups, recipes and ingredients
        sqlx::query("DELETE FROM collections WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn hydrate_collection(&self, row: CollectionRow) -> Result<Collection, StoreError> {
        let collection_id = parse_id("collections", &row.id)?;

        let group_rows: Vec<GroupRow> = sqlx::query_as(
            "SELECT id, name, created_at FROM recipe_groups WHERE collection_id = ? ORDER BY position",
        )
        .bind(&row.id)
        .fetch_all(&self.pool)
        .await?;

        let mut groups = Vec::with_capacity(group_rows.len());
        for group_row in group_rows {
            groups.push(self.hydrate_group(collection_id, group_row).await?);
        }

        Ok(Collection {
            id: collection_id,
            name: row.name,
            version: row.version,
            created_at: parse_time("collections", &row.created_at)?,
            last_modified: parse_time("collections", &row.last_modified)?,
            shared: row.shared,
            dirty: row.dirty,
            groups,
        })
    }

    async fn hydrate_group(&self, collection_id: Uuid, row: GroupRow) -> Result<Group, StoreError> {
        let group_id = parse_id("recipe_groups", &row.id)?;

        let recipe_rows: Vec<RecipeRow> = sqlx::query_as(
            r#"
            SELECT id, url, title, site_name, created_at, steps,
                   calories, total_fat, total_carbs, total_protein, total_sugar,
                   local_image, remote_image_url, last_seen_remote_url, upload_pending
            FROM recipes WHERE group_id = ? ORDER BY position
            "#,
        )
        .bind(&row.id)
        .fetch_all(&self.pool)
        .await?;

        let mut recipes = Vec::with_capacity(recipe_rows.len());
        for recipe_row in recipe_rows {
            recipes.push(self.hydrate_recipe(group_id, recipe_row).await?);
        }

        Ok(Group {
            id: group_id,
            collection_id,
            name: row.name,
            created_at: parse_time("recipe_groups", &row.created_at)?,
            recipes,
        })
    }

    async fn hydrate_recipe(&self, group_id: Uuid, row: RecipeRow) -> Result<Recipe, StoreError> {
        let recipe_id = parse_id("recipes", &row.id)?;

        let ingredient_rows: Vec<IngredientRow> = sqlx::query_as(
            "SELECT id, name, amount, substitutions FROM ingredients WHERE recipe_id = ? ORDER BY position",
        )
        .bind(&row.id)
        .fetch_all(&self.pool)
        .await?;

        let ingredients = ingredient_rows
            .into_iter()
            .map(|i| {
                Ok(Ingredient {
                    id: parse_id("ingredients", &i.id)?,
                    recipe_id,
                    name: i.name,
                    amount: i.amount,
                    substitutions: parse_list("ingredients", &i.substitutions)?,
                })
            })
            .collect::<Result<Vec<_>, StoreError>>()?;

        Ok(Recipe {
            id: recipe_id,
            group_id,
            url: row.url,
            title: row.title,
            site_name: row.site_name,
            created_at: parse_time("recipes", &row.created_at)?,
            steps: parse_list("recipes", &row.steps)?,
            nutrition: Nutrition {
                calories: row.calories,
                total_fat: row.total_fat,
                total_carbs: row.total_carbs,
                total_protein: row.total_protein,
                total_sugar: row.total_sugar,
            },
            ingredients,
            local_image: row.local_image,
            remote_image_url: row.remote_image_url,
            last_seen_remote_url: row.last_seen_remote_url,
            upload_pending: row.upload_pending,
        })
    }
}

async fn insert_group(
    tx: &mut Transaction<'_, Sqlite>,
    collection_id: &str,
    position: i64,
    group: &Group,
) -> Result<(), StoreError> {
    let group_id = group.id.to_string();

    sqlx::query(
        "INSERT INTO recipe_groups (id, collection_id, position, name, created_at) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(&group_id)
    .bind(collection_id)
    .bind(position)
    .bind(&group.name)
    .bind(group.created_at.to_rfc3339())
    .execute(&mut **tx)
    .await?;

    for (position, recipe) in group.recipes.iter().enumerate() {
        let recipe_id = recipe.id.to_string();
        let steps = serde_json::to_string(&recipe.steps).unwrap_or_else(|_| "[]".to_string());

        sqlx::query(
            r#"
            INSERT INTO recipes (id, group_id, position, url, title, site_name, created_at, steps,
                                 calories, total_fat, total_carbs, total_protein, total_sugar,
                                 local_image, remote_image_url, last_seen_remote_url, upload_pending)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&recipe_id)
        .bind(&group_id)
        .bind(position as i64)
        .bind(&recipe.url)
        .bind(&recipe.title)
        .bind(&recipe.site_name)
        .bind(recipe.created_at.to_rfc3339())
        .bind(&steps)
        .bind(recipe.nutrition.calories)
        .bind(recipe.nutrition.total_fat)
        .bind(recipe.nutrition.total_carbs)
        .bind(recipe.nutrition.total_protein)
        .bind(recipe.nutrition.total_sugar)
        .bind(&recipe.local_image)
        .bind(&recipe.remote_image_url)
        .bind(&recipe.last_seen_remote_url)
        .bind(recipe.upload_pending)
        .execute(&mut **tx)
        .await?;

        for (position, ingredient) in recipe.ingredients.iter().enumerate() {
            let substitutions = serde_json::to_string(&ingredient.substitutions)
                .unwrap_or_else(|_| "[]".to_string());

            sqlx::query(
                "INSERT INTO ingredients (id, recipe_id, position, name, amount, substitutions) VALUES (?, ?, ?, ?, ?, ?)",
            )
            .bind(ingredient.id.to_string())
            .bind(&recipe_id)
            .bind(position as i64)
            .bind(&ingredient.name)
            .bind(&ingredient.amount)
            .bind(&substitutions)
            .execute(&mut **tx)
            .await?;
        }
    }

    Ok(())
}

fn parse_id(table: &'static str, value: &str) -> Result<Uuid, StoreError> {
    Uuid::parse_str(value).map_err(|e| StoreError::Corrupt {
        table,
        message: format!("bad id '{}': {}", value, e),
    })
}

fn parse_time(table: &'static str, value: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StoreError::Corrupt {
            table,
            message: format!("bad timestamp '{}': {}", value, e),
        })
}

fn parse_list(table: &'static str, value: &str) -> Result<Vec<String>, StoreError> {
    serde_json::from_str(value).map_err(|e| StoreError::Corrupt {
        table,
        message: format!("bad list '{}': {}", value, e),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_db;
    use tempfile::TempDir;

    struct TestContext {
        repo: CollectionRepository,
        pool: SqlitePool,
        _temp_dir: TempDir, // Keep alive for duration of test
    }

    async fn setup_repo() -> TestContext {
        let temp_dir = TempDir::new().unwrap();
        let pool = init_db(&temp_dir.path().join("test.db")).await.unwrap();
        TestContext {
            repo: CollectionRepository::new(pool.clone()),
            pool,
            _temp_dir: temp_dir,
        }
    }

    fn sample_collection() -> Collection {
        let mut recipe = Recipe::new(Uuid::nil(), "Ramen", "https://example.com/ramen")
            .with_site_name("Example")
            .with_steps(vec!["Boil".into(), "Slurp".into()])
            .with_nutrition(Nutrition {
                calories: Some(610.0),
                total_fat: Some(22.0),
                ..Default::default()
            })
            .with_ingredient(Ingredient::new(Uuid::nil(), "noodles", "200 g"))
            .with_ingredient(
                Ingredient::new(Uuid::nil(), "miso", "2 tbsp")
                    .with_substitutions(vec!["doenjang".into()]),
            );
        recipe.local_image = Some("ramen.jpg".into());
        recipe.upload_pending = true;

        Collection::new("Noodles")
            .with_group(Group::new(Uuid::nil(), "Soups").with_recipe(recipe))
            .with_group(
                Group::new(Uuid::nil(), "Cold")
                    .with_recipe(Recipe::new(Uuid::nil(), "Soba", "https://example.com/soba")),
            )
    }

    async fn load(repo: &CollectionRepository, id: Uuid) -> Option<Collection> {
        repo.list().await.unwrap().into_iter().find(|c| c.id == id)
    }

    async fn count(pool: &SqlitePool, table: &str) -> i64 {
        let row: (i64,) = sqlx::query_as(&format!("SELECT COUNT(*) FROM {}", table))
            .fetch_one(pool)
            .await
            .unwrap();
        row.0
    }

    #[tokio::test]
    async fn test_save_and_get_collection() {
        let ctx = setup_repo().await;
        let collection = sample_collection();

        ctx.repo.save(&collection).await.unwrap();
        let loaded = load(&ctx.repo, collection.id).await.unwrap();

        assert_eq!(loaded.name, "Noodles");
        assert_eq!(loaded.groups.len(), 2);
        assert_eq!(loaded.groups[0].name, "Soups");
        assert_eq!(loaded.groups[1].name, "Cold");

        let ramen = &loaded.groups[0].recipes[0];
        assert_eq!(ramen.steps, vec!["Boil", "Slurp"]);
        assert_eq!(ramen.nutrition.calories, Some(610.0));
        assert_eq!(ramen.ingredients[1].substitutions, vec!["doenjang"]);
        assert_eq!(ramen.local_image.as_deref(), Some("ramen.jpg"));
        assert!(ramen.upload_pending);
        assert_eq!(ramen.group_id, loaded.groups[0].id);
        assert_eq!(ramen.ingredients[0].recipe_id, ramen.id);
    }

    #[tokio::test]
    async fn test_empty_database_lists_nothing() {
        let ctx = setup_repo().await;
        assert!(ctx.repo.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_save_replaces_removed_children() {
        let ctx = setup_repo().await;
        let mut collection = sample_collection();
        ctx.repo.save(&collection).await.unwrap();

        collection.groups.remove(0);
        collection.version = 2;
        ctx.repo.save(&collection).await.unwrap();

        let loaded = load(&ctx.repo, collection.id).await.unwrap();
        assert_eq!(loaded.version, 2);
        assert_eq!(loaded.groups.len(), 1);
        assert_eq!(count(&ctx.pool, "recipes").await, 1);
        assert_eq!(count(&ctx.pool, "ingredients").await, 0);
    }

    #[tokio::test]
    async fn test_delete_collection_cascades() {
        let ctx = setup_repo().await;
        let collection = sample_collection();
        ctx.repo.save(&collection).await.unwrap();
        assert_eq!(count(&ctx.pool, "ingredients").await, 2);

        ctx.repo.delete(collection.id).await.unwrap();

        assert!(ctx.repo.list().await.unwrap().is_empty());
        assert_eq!(count(&ctx.pool, "recipe_groups").await, 0);
        assert_eq!(count(&ctx.pool, "recipes").await, 0);
        assert_eq!(count(&ctx.pool, "ingredients").await, 0);
    }

    #[tokio::test]
    async fn test_list_collections() {
        let ctx = setup_repo().await;
        ctx.repo.save(&Collection::new("A")).await.unwrap();
        ctx.repo.save(&sample_collection()).await.unwrap();

        let collections = ctx.repo.list().await.unwrap();
        assert_eq!(collections.len(), 2);
    }
}
