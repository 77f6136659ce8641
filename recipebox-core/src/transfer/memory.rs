//! In-process remote store with failure injection, for tests.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use uuid::Uuid;

use super::{TransferClient, TransferError};
use crate::snapshot::CollectionSnapshot;

/// How an injected fetch failure presents itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchFailure {
    Network,
    NotFound,
    Malformed,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Calls {
    pub fetches: usize,
    pub pushes: usize,
    pub deletes: usize,
    pub uploads: usize,
    pub downloads: usize,
}

#[derive(Default)]
struct State {
    collections: HashMap<Uuid, CollectionSnapshot>,
    images: HashMap<String, Vec<u8>>,
    calls: Calls,
    fetch_failure: Option<FetchFailure>,
    fail_push: bool,
    fail_delete: bool,
    fail_upload: bool,
    fail_download: bool,
    download_delay: Option<Duration>,
}

#[derive(Default)]
pub struct MemoryTransfer {
    state: Mutex<State>,
}

impl MemoryTransfer {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }

    pub fn insert(&self, snapshot: CollectionSnapshot) {
        self.state().collections.insert(snapshot.id, snapshot);
    }

    pub fn get(&self, id: Uuid) -> Option<CollectionSnapshot> {
        self.state().collections.get(&id).cloned()
    }

    pub fn put_image(&self, url: &str, bytes: Vec<u8>) {
        self.state().images.insert(url.to_string(), bytes);
    }

    pub fn calls(&self) -> Calls {
        self.state().calls
    }

    pub fn fail_fetch(&self, failure: Option<FetchFailure>) {
        self.state().fetch_failure = failure;
    }

    pub fn fail_push(&self, fail: bool) {
        self.state().fail_push = fail;
    }

    pub fn fail_delete(&self, fail: bool) {
        self.state().fail_delete = fail;
    }

    pub fn fail_upload(&self, fail: bool) {
        self.state().fail_upload = fail;
    }

    pub fn fail_download(&self, fail: bool) {
        self.state().fail_download = fail;
    }

    pub fn delay_downloads(&self, delay: Duration) {
        self.state().download_delay = Some(delay);
    }
}

fn network_error() -> TransferError {
    TransferError::Http("connection refused".to_string())
}

#[async_trait]
impl TransferClient for MemoryTransfer {
    async fn fetch(&self, id: Uuid) -> Result<CollectionSnapshot, TransferError> {
        let mut state = self.state();
        state.calls.fetches += 1;
        match state.fetch_failure {
            Some(FetchFailure::Network) => return Err(network_error()),
            Some(FetchFailure::NotFound) => {
                return Err(TransferError::NotFound(format!("collection {}", id)))
            }
            Some(FetchFailure::Malformed) => {
                return Err(TransferError::Decode("expected value at line 1".to_string()))
            }
            None => {}
        }
        state
            .collections
            .get(&id)
            .cloned()
            .ok_or_else(|| TransferError::NotFound(format!("collection {}", id)))
    }

    async fn push(&self, snapshot: &CollectionSnapshot) -> Result<(), TransferError> {
        let mut state = self.state();
        state.calls.pushes += 1;
        if state.fail_push {
            return Err(network_error());
        }
        state.collections.insert(snapshot.id, snapshot.clone());
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> Result<(), TransferError> {
        let mut state = self.state();
        state.calls.deletes += 1;
        if state.fail_delete {
            return Err(network_error());
        }
        state.collections.remove(&id);
        Ok(())
    }

    async fn upload_image(&self, bytes: Vec<u8>) -> Result<String, TransferError> {
        let mut state = self.state();
        state.calls.uploads += 1;
        if state.fail_upload {
            return Err(TransferError::Status {
                status: 500,
                message: "upload rejected".to_string(),
            });
        }
        let url = format!("memory://images/{}.jpg", state.images.len() + 1);
        state.images.insert(url.clone(), bytes);
        Ok(url)
    }

    async fn download_image(&self, url: &str) -> Result<Vec<u8>, TransferError> {
        let delay = {
            let mut state = self.state();
            state.calls.downloads += 1;
            state.download_delay
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let state = self.state();
        if state.fail_download {
            return Err(network_error());
        }
        state
            .images
            .get(url)
            .cloned()
            .ok_or_else(|| TransferError::NotFound(url.to_string()))
    }
}
