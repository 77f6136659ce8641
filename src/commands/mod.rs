mod collection;
mod config_cmd;
mod group;
mod recipe;
mod sync_cmd;

pub use collection::CollectionCommand;
pub use config_cmd::ConfigCommand;
pub use group::GroupCommand;
pub use recipe::RecipeCommand;
pub use sync_cmd::{ImportCommand, PushCommand, SyncCommand, SyncCommandError};

use clap::ValueEnum;
use recipebox::config::Config;
use recipebox_core::{
    init_db, AssetPipeline, CollectionRepository, HttpTransferClient, Library, SharedLibrary,
    StoreError, SyncCoordinator, SyncSettings, TransferClient,
};
use std::sync::Arc;
use uuid::Uuid;

#[derive(Clone, ValueEnum, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Everything a command needs: configuration plus the opened local library.
pub struct AppContext {
    pub config: Config,
    pub library: SharedLibrary,
}

impl AppContext {
    pub async fn open(config: Config) -> Result<Self, StoreError> {
        let pool = init_db(&config.database_path()).await?;
        let library = Library::open(CollectionRepository::new(pool))
            .await?
            .into_shared();
        Ok(Self { config, library })
    }

    /// Builds the sync coordinator from the sync configuration.
    pub fn coordinator(&self) -> Result<Arc<SyncCoordinator>, SyncCommandError> {
        let (Some(server_url), Some(api_key)) =
            (&self.config.sync.server_url, &self.config.sync.api_key)
        else {
            return Err(SyncCommandError::NotConfigured);
        };

        let transfer: Arc<dyn TransferClient> =
            Arc::new(HttpTransferClient::new(server_url.clone(), api_key.clone()));
        let assets = Arc::new(AssetPipeline::new(
            Arc::clone(&transfer),
            self.config.images_dir(),
        ));
        let settings = SyncSettings {
            interval: self.config.sync.interval(),
            bootstrap: self.config.sync.bootstrap,
        };
        Ok(Arc::new(SyncCoordinator::new(
            self.library.clone(),
            transfer,
            assets,
            settings,
        )))
    }
}

/// Resolves a collection by UUID or (case-insensitive) name.
pub fn find_collection(library: &Library, identifier: &str) -> Option<Uuid> {
    if let Ok(id) = Uuid::parse_str(identifier) {
        return library.get(id).map(|c| c.id);
    }
    library
        .collections()
        .iter()
        .find(|c| c.name.eq_ignore_ascii_case(identifier))
        .map(|c| c.id)
}
