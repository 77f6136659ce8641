//! Sync coordinator.
//!
//! Decides, per shared collection, whether the remote copy or the local copy wins
//! (higher version wins, equal versions are left alone) and drives the merge, push
//! and image transfers that follow. Whole cycles are serialized so periodic and
//! ad-hoc syncs never interleave.

use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::assets::AssetPipeline;
use crate::error::SyncError;
use crate::library::SharedLibrary;
use crate::merge::MergeReport;
use crate::snapshot::CollectionSnapshot;
use crate::transfer::{TransferClient, TransferError};

pub const DEFAULT_SYNC_INTERVAL: Duration = Duration::from_secs(30);

/// When a failed fetch turns into a bootstrap push of the local copy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BootstrapPolicy {
    /// Any network error or non-success status, including 404.
    #[default]
    TransportFailure,
    /// Only a confirmed 404.
    NotFoundOnly,
}

impl BootstrapPolicy {
    /// Undecodable snapshots never bootstrap: the remote copy exists and would be
    /// overwritten.
    pub fn should_bootstrap(&self, error: &TransferError) -> bool {
        match self {
            BootstrapPolicy::TransportFailure => error.is_transport(),
            BootstrapPolicy::NotFoundOnly => error.is_not_found(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncSettings {
    pub interval: Duration,
    pub bootstrap: BootstrapPolicy,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            interval: DEFAULT_SYNC_INTERVAL,
            bootstrap: BootstrapPolicy::default(),
        }
    }
}

/// What one collection's sync cycle did.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncOutcome {
    NotShared,
    UpToDate,
    Imported(MergeReport),
    Pushed { version: i64 },
    Bootstrapped { version: i64 },
}

#[derive(Debug)]
pub struct CollectionSync {
    pub collection_id: Uuid,
    pub result: Result<SyncOutcome, SyncError>,
}

/// Result of a full pass over the shared collections.
#[derive(Debug)]
pub struct SyncReport {
    pub collections: Vec<CollectionSync>,
    pub finished_at: DateTime<Utc>,
}

impl SyncReport {
    pub fn failures(&self) -> usize {
        self.collections.iter().filter(|c| c.result.is_err()).count()
    }

    pub fn is_success(&self) -> bool {
        self.failures() == 0
    }
}

enum Decision {
    Imported(MergeReport),
    PushLocal,
    UpToDate,
}

pub struct SyncCoordinator {
    library: SharedLibrary,
    transfer: Arc<dyn TransferClient>,
    assets: Arc<AssetPipeline>,
    settings: SyncSettings,
    cycle: Mutex<()>,
    last_sync: StdMutex<Option<DateTime<Utc>>>,
}

impl SyncCoordinator {
    pub fn new(
        library: SharedLibrary,
        transfer: Arc<dyn TransferClient>,
        assets: Arc<AssetPipeline>,
        settings: SyncSettings,
    ) -> Self {
        Self {
            library,
            transfer,
            assets,
            settings,
            cycle: Mutex::new(()),
            last_sync: StdMutex::new(None),
        }
    }

    pub fn library(&self) -> &SharedLibrary {
        &self.library
    }

    pub fn assets(&self) -> &Arc<AssetPipeline> {
        &self.assets
    }

    pub fn settings(&self) -> &SyncSettings {
        &self.settings
    }

    /// Time of the last completed import or full sync pass.
    pub fn last_sync(&self) -> Option<DateTime<Utc>> {
        *self
            .last_sync
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn record_sync(&self, at: DateTime<Utc>) {
        *self
            .last_sync
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(at);
    }

    /// Syncs one shared collection.
    pub async fn sync_one(&self, id: Uuid) -> Result<SyncOutcome, SyncError> {
        let _cycle = self.cycle.lock().await;
        let outcome = self.sync_collection(id).await?;
        if matches!(outcome, SyncOutcome::Imported(_)) {
            self.record_sync(Utc::now());
        }
        Ok(outcome)
    }

    /// Syncs every shared collection, continuing past failures.
    pub async fn sync_all(&self) -> SyncReport {
        let ids = self.library.lock().await.shared_ids();
        let mut collections = Vec::with_capacity(ids.len());

        for id in ids {
            let result = {
                let _cycle = self.cycle.lock().await;
                self.sync_collection(id).await
            };
            if let Err(e) = &result {
                tracing::warn!("Sync of collection {} failed: {}", id, e);
            }
            collections.push(CollectionSync {
                collection_id: id,
                result,
            });
        }

        let finished_at = Utc::now();
        self.record_sync(finished_at);
        let report = SyncReport {
            collections,
            finished_at,
        };
        tracing::info!(
            "Sync pass finished: {} collection(s), {} failed",
            report.collections.len(),
            report.failures()
        );
        report
    }

    async fn sync_collection(&self, id: Uuid) -> Result<SyncOutcome, SyncError> {
        {
            let library = self.library.lock().await;
            let collection = library.get(id).ok_or(SyncError::UnknownCollection(id))?;
            if !collection.shared {
                tracing::debug!("Collection {} is not shared, skipping", id);
                return Ok(SyncOutcome::NotShared);
            }
        }

        self.assets.upload_pending(&self.library, id).await?;

        let outcome = match self.transfer.fetch(id).await {
            Ok(remote) => self.reconcile(remote).await?,
            Err(e) if self.settings.bootstrap.should_bootstrap(&e) => {
                tracing::warn!(
                    "Fetch of collection {} failed ({}), pushing local copy",
                    id,
                    e
                );
                let version = self.push_local(id).await?;
                SyncOutcome::Bootstrapped { version }
            }
            Err(e) => {
                tracing::warn!("Fetch of collection {} failed: {}", id, e);
                return Err(e.into());
            }
        };

        self.assets.resume_downloads(&self.library, id).await;
        Ok(outcome)
    }

    async fn reconcile(&self, remote: CollectionSnapshot) -> Result<SyncOutcome, SyncError> {
        let id = remote.id;
        let decision = {
            let mut library = self.library.lock().await;
            let local_version = library
                .get(id)
                .ok_or(SyncError::UnknownCollection(id))?
                .version;

            if remote.version > local_version {
                Decision::Imported(library.apply_snapshot(&remote).await?)
            } else if remote.version < local_version {
                Decision::PushLocal
            } else {
                Decision::UpToDate
            }
        };

        match decision {
            Decision::Imported(report) => {
                tracing::info!(
                    "Imported collection {} at version {}: {} inserted, {} updated, {} removed",
                    id,
                    remote.version,
                    report.inserted,
                    report.updated,
                    report.removed
                );
                self.after_merge(&report).await;
                Ok(SyncOutcome::Imported(report))
            }
            Decision::PushLocal => {
                let version = self.push_local(id).await?;
                Ok(SyncOutcome::Pushed { version })
            }
            Decision::UpToDate => {
                tracing::debug!("Collection {} is up to date at version {}", id, remote.version);
                Ok(SyncOutcome::UpToDate)
            }
        }
    }

    async fn after_merge(&self, report: &MergeReport) {
        self.assets.cancel_downloads(&report.removed_recipes);
        self.assets.discard_images(&report.discarded_images).await;
        self.assets
            .schedule_downloads(&self.library, report.downloads.clone());
    }

    /// Clears dirty, snapshots and pushes. A failed push marks the collection
    /// dirty again.
    async fn push_local(&self, id: Uuid) -> Result<i64, SyncError> {
        let snapshot = self.library.lock().await.begin_push(id).await?;

        if let Err(e) = self.transfer.push(&snapshot).await {
            tracing::warn!("Push of collection {} failed: {}", id, e);
            self.remark_dirty(id).await;
            return Err(e.into());
        }

        tracing::info!("Pushed collection {} at version {}", id, snapshot.version);
        Ok(snapshot.version)
    }

    async fn remark_dirty(&self, id: Uuid) {
        if let Err(e) = self.library.lock().await.mark_dirty(id).await {
            tracing::error!("Failed to mark collection {} dirty: {}", id, e);
        }
    }

    /// Pushes a collection now, shared or not.
    pub async fn push(&self, id: Uuid) -> Result<i64, SyncError> {
        let _cycle = self.cycle.lock().await;
        self.library.lock().await.stage_push(id).await?;

        if let Err(e) = self.assets.upload_pending(&self.library, id).await {
            tracing::warn!("Image upload for collection {} failed: {}", id, e);
            self.remark_dirty(id).await;
            return Err(e.into());
        }

        self.push_local(id).await
    }

    /// Fetches a collection and applies it as-is, whatever the local version.
    pub async fn import(&self, id: Uuid) -> Result<MergeReport, SyncError> {
        let _cycle = self.cycle.lock().await;
        let remote = self.transfer.fetch(id).await?;
        let report = self.library.lock().await.apply_snapshot(&remote).await?;

        tracing::info!(
            "Imported collection {} ({}) at version {}",
            id,
            remote.name,
            remote.version
        );
        self.after_merge(&report).await;
        self.record_sync(Utc::now());
        Ok(report)
    }

    /// Deletes a collection locally and, when it is shared, on the server.
    ///
    /// The server copy goes first, so a failed remote delete leaves the local
    /// collection in place to retry from.
    pub async fn delete_collection(&self, id: Uuid) -> Result<(), SyncError> {
        let _cycle = self.cycle.lock().await;
        let shared = self
            .library
            .lock()
            .await
            .get(id)
            .ok_or(SyncError::UnknownCollection(id))?
            .shared;
        if shared {
            self.transfer.delete(id).await?;
            tracing::info!("Deleted shared collection {} on server", id);
        }

        let removed = self.library.lock().await.delete_collection(id).await?;

        let recipe_ids: Vec<Uuid> = removed.recipes().map(|r| r.id).collect();
        self.assets.cancel_downloads(&recipe_ids);
        let images: Vec<String> = removed
            .recipes()
            .filter_map(|r| r.local_image.clone())
            .collect();
        self.assets.discard_images(&images).await;
        Ok(())
    }

    /// Runs [`sync_all`](Self::sync_all) every [`SyncSettings::interval`] until
    /// stopped.
    pub fn start_periodic(self: &Arc<Self>) -> PeriodicSync {
        let interval = self.settings.interval;
        let (stop_tx, mut stop_rx) = watch::channel(false);
        let coordinator = Arc::clone(self);

        let handle = tokio::spawn(async move {
            tracing::info!("Periodic sync started every {:?}", interval);
            loop {
                if *stop_rx.borrow() {
                    break;
                }
                coordinator.sync_all().await;

                tokio::select! {
                    _ = tokio::time::sleep(interval) => {}
                    changed = stop_rx.changed() => {
                        if changed.is_err() {
                            break;
                        }
                    }
                }
            }
            tracing::info!("Periodic sync stopped");
        });

        PeriodicSync { stop_tx, handle }
    }
}

/// Handle to a running periodic sync. Dropping it stops the loop after the
/// current cycle.
pub struct PeriodicSync {
    stop_tx: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl PeriodicSync {
    pub fn is_running(&self) -> bool {
        !self.handle.is_finished()
    }

    /// Stops the loop. A cycle already in progress is allowed to finish.
    pub async fn stop(self) {
        let _ = self.stop_tx.send(true);
        if let Err(e) = self.handle.await {
            tracing::error!("Periodic sync task failed: {}", e);
        }
    }
}
