//! Recipebox Core Library
//!
//! Collection models, local persistence and the sync engine shared by the
//! Recipebox applications.

pub mod assets;
pub mod coordinator;
pub mod db;
pub mod error;
pub mod library;
pub mod link;
pub mod merge;
pub mod models;
pub mod snapshot;
pub mod transfer;

pub use assets::AssetPipeline;
pub use coordinator::{
    BootstrapPolicy, CollectionSync, PeriodicSync, SyncCoordinator, SyncOutcome, SyncReport,
    SyncSettings, DEFAULT_SYNC_INTERVAL,
};
pub use db::{init_db, CollectionRepository};
pub use error::{AssetError, StoreError, SyncError};
pub use library::{Library, SharedLibrary};
pub use link::{ImportLink, ImportLinkError};
pub use merge::{build_collection, merge_collection, DownloadRequest, MergeReport};
pub use models::{Collection, Group, ImageState, Ingredient, Nutrition, Recipe};
pub use snapshot::{CollectionSnapshot, GroupSnapshot, IngredientSnapshot, RecipeSnapshot};
pub use transfer::{HttpTransferClient, ImageUploadResponse, TransferClient, TransferError, AUTH_HEADER};

pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!version().is_empty());
    }
}
