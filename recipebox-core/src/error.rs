//! Error types shared across the sync engine.

use std::path::PathBuf;
use thiserror::Error;
use uuid::Uuid;

use crate::transfer::TransferError;

/// Errors from the local store (in-memory tree plus SQLite persistence).
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Collection not found: {0}")]
    CollectionNotFound(Uuid),

    #[error("Group not found: {0}")]
    GroupNotFound(Uuid),

    #[error("Recipe not found: {0}")]
    RecipeNotFound(Uuid),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error("I/O error for {0}: {1}")]
    Io(PathBuf, #[source] std::io::Error),

    #[error("Corrupt row in {table}: {message}")]
    Corrupt { table: &'static str, message: String },
}

/// Errors from the image upload and download flows.
#[derive(Error, Debug)]
pub enum AssetError {
    #[error("I/O error for {0}: {1}")]
    Io(PathBuf, #[source] std::io::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Image transfer failed: {0}")]
    Transfer(#[from] TransferError),

    #[error("Image task failed: {0}")]
    Task(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Errors from a sync cycle.
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Unknown collection: {0}")]
    UnknownCollection(Uuid),

    #[error(transparent)]
    Transfer(#[from] TransferError),

    #[error(transparent)]
    Asset(#[from] AssetError),

    #[error(transparent)]
    Store(#[from] StoreError),
}
