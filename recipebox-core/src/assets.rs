//! Image upload and download flows.
//!
//! Uploads run inline as the first phase of a push: every pending image of the
//! collection is re-encoded and uploaded concurrently, and the push only goes
//! ahead once every readable one has a remote URL. Downloads run in the background,
//! one task per recipe, and write their result back through the shared library
//! when they finish.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use futures::future::join_all;
use image::codecs::jpeg::JpegEncoder;
use image::ImageError;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::error::AssetError;
use crate::library::SharedLibrary;
use crate::merge::DownloadRequest;
use crate::models::{ImageState, Recipe};
use crate::transfer::TransferClient;

/// Longest edge of an uploaded image, in pixels.
pub const MAX_IMAGE_DIMENSION: u32 = 1600;

pub const JPEG_QUALITY: u8 = 80;

struct InFlightDownload {
    url: String,
    generation: u64,
    handle: JoinHandle<()>,
}

type DownloadRegistry = Arc<Mutex<HashMap<Uuid, InFlightDownload>>>;

pub struct AssetPipeline {
    transfer: Arc<dyn TransferClient>,
    images_dir: PathBuf,
    uploading: Mutex<HashSet<Uuid>>,
    downloads: DownloadRegistry,
    next_generation: AtomicU64,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl AssetPipeline {
    pub fn new(transfer: Arc<dyn TransferClient>, images_dir: impl Into<PathBuf>) -> Self {
        Self {
            transfer,
            images_dir: images_dir.into(),
            uploading: Mutex::new(HashSet::new()),
            downloads: Arc::new(Mutex::new(HashMap::new())),
            next_generation: AtomicU64::new(0),
        }
    }

    pub fn images_dir(&self) -> &Path {
        &self.images_dir
    }

    pub fn image_path(&self, filename: &str) -> PathBuf {
        self.images_dir.join(filename)
    }

    /// Image state of a recipe, including transfers currently in flight.
    pub fn image_state(&self, recipe: &Recipe) -> ImageState {
        if lock(&self.uploading).contains(&recipe.id) {
            return ImageState::Uploading;
        }
        if self.is_downloading(recipe.id) {
            return ImageState::Downloading;
        }
        recipe.image_state()
    }

    pub fn is_downloading(&self, recipe_id: Uuid) -> bool {
        lock(&self.downloads)
            .get(&recipe_id)
            .is_some_and(|d| !d.handle.is_finished())
    }

    /// Number of download tasks that have not finished yet.
    pub fn pending_downloads(&self) -> usize {
        lock(&self.downloads)
            .values()
            .filter(|d| !d.handle.is_finished())
            .count()
    }

    /// Copies an image file into the images directory. See [`import_image_file`].
    pub async fn import_local_image(&self, source: &Path) -> Result<String, AssetError> {
        import_image_file(&self.images_dir, source).await
    }

    /// Removes image files that no longer belong to any recipe.
    pub async fn discard_images(&self, filenames: &[String]) {
        for filename in filenames {
            let path = self.image_path(filename);
            if let Err(e) = tokio::fs::remove_file(&path).await {
                if e.kind() != std::io::ErrorKind::NotFound {
                    tracing::warn!("Failed to remove image {}: {}", path.display(), e);
                }
            }
        }
    }

    /// Uploads every pending image of a collection.
    ///
    /// Successful uploads are recorded on their recipes even when a sibling fails,
    /// so a retry only sends what is still missing. Images that can no longer be
    /// read or decoded are skipped and left pending. Returns the number of images
    /// uploaded, or the first transfer failure.
    pub async fn upload_pending(
        &self,
        library: &SharedLibrary,
        collection_id: Uuid,
    ) -> Result<usize, AssetError> {
        let pending: Vec<(Uuid, String)> = {
            let library = library.lock().await;
            let Some(collection) = library.get(collection_id) else {
                return Ok(0);
            };
            collection
                .recipes()
                .filter(|r| r.upload_pending)
                .filter_map(|r| r.local_image.clone().map(|f| (r.id, f)))
                .collect()
        };
        if pending.is_empty() {
            return Ok(0);
        }

        tracing::debug!(
            "Uploading {} image(s) for collection {}",
            pending.len(),
            collection_id
        );
        lock(&self.uploading).extend(pending.iter().map(|(id, _)| *id));

        let results = join_all(
            pending
                .iter()
                .map(|(_, filename)| self.upload_one(self.image_path(filename))),
        )
        .await;

        {
            let mut uploading = lock(&self.uploading);
            for (recipe_id, _) in &pending {
                uploading.remove(recipe_id);
            }
        }

        let mut first_error = None;
        let mut uploaded = 0;
        let mut library = library.lock().await;
        for ((recipe_id, filename), result) in pending.into_iter().zip(results) {
            match result {
                Ok(url) => {
                    let Some((_, recipe)) = library.find_recipe_mut(recipe_id) else {
                        continue;
                    };
                    // The user may have picked another image meanwhile.
                    if recipe.local_image.as_deref() != Some(filename.as_str()) {
                        continue;
                    }
                    recipe.remote_image_url = Some(url.clone());
                    recipe.last_seen_remote_url = Some(url);
                    recipe.upload_pending = false;
                    uploaded += 1;
                }
                // Unreadable files stay pending without holding back the push.
                Err(e @ (AssetError::Io(..) | AssetError::Image(_))) => {
                    tracing::warn!(
                        "Skipping image {} of recipe {}: {}",
                        filename,
                        recipe_id,
                        e
                    );
                }
                Err(e) => {
                    tracing::warn!("Image upload for recipe {} failed: {}", recipe_id, e);
                    first_error.get_or_insert(e);
                }
            }
        }
        if uploaded > 0 {
            library.persist(collection_id).await?;
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(uploaded),
        }
    }

    async fn upload_one(&self, path: PathBuf) -> Result<String, AssetError> {
        let bytes = tokio::fs::read(&path)
            .await
            .map_err(|e| AssetError::Io(path, e))?;
        let encoded = blocking(move || encode_for_upload(&bytes)).await?;
        Ok(self.transfer.upload_image(encoded).await?)
    }

    /// Starts a download for each request. Returns how many were started.
    pub fn schedule_downloads(&self, library: &SharedLibrary, requests: Vec<DownloadRequest>) -> usize {
        requests
            .into_iter()
            .filter(|request| self.schedule_download(library, request.clone()))
            .count()
    }

    /// Starts downloading one hero image.
    ///
    /// A download of the same URL already in flight for the recipe is left alone;
    /// a download of a different URL is cancelled and replaced.
    pub fn schedule_download(&self, library: &SharedLibrary, request: DownloadRequest) -> bool {
        let mut downloads = lock(&self.downloads);
        if let Some(existing) = downloads.get(&request.recipe_id) {
            if existing.url == request.url && !existing.handle.is_finished() {
                return false;
            }
            existing.handle.abort();
        }

        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        let recipe_id = request.recipe_id;
        let url = request.url.clone();
        let registry = Arc::clone(&self.downloads);
        let transfer = Arc::clone(&self.transfer);
        let images_dir = self.images_dir.clone();
        let library = Arc::clone(library);

        let handle = tokio::spawn(async move {
            if let Err(e) = download(transfer, images_dir, library, &request).await {
                tracing::warn!("Image download for recipe {} failed: {}", request.recipe_id, e);
            }
            let mut downloads = lock(&registry);
            if downloads
                .get(&request.recipe_id)
                .is_some_and(|d| d.generation == generation)
            {
                downloads.remove(&request.recipe_id);
            }
        });

        downloads.insert(
            recipe_id,
            InFlightDownload {
                url,
                generation,
                handle,
            },
        );
        true
    }

    /// Schedules downloads for recipes whose remote image has not been fetched yet,
    /// such as after an earlier download failed.
    pub async fn resume_downloads(&self, library: &SharedLibrary, collection_id: Uuid) -> usize {
        let requests: Vec<DownloadRequest> = {
            let library = library.lock().await;
            let Some(collection) = library.get(collection_id) else {
                return 0;
            };
            collection
                .recipes()
                .filter(|r| r.image_state() == ImageState::PendingDownload)
                .filter_map(|r| {
                    r.remote_image_url.clone().map(|url| DownloadRequest {
                        recipe_id: r.id,
                        url,
                    })
                })
                .collect()
        };
        self.schedule_downloads(library, requests)
    }

    /// Cancels downloads for recipes that no longer exist.
    pub fn cancel_downloads(&self, recipe_ids: &[Uuid]) {
        let mut downloads = lock(&self.downloads);
        for recipe_id in recipe_ids {
            if let Some(download) = downloads.remove(recipe_id) {
                tracing::debug!("Cancelling image download for recipe {}", recipe_id);
                download.handle.abort();
            }
        }
    }
}

impl Drop for AssetPipeline {
    fn drop(&mut self) {
        for (_, download) in lock(&self.downloads).drain() {
            download.handle.abort();
        }
    }
}

async fn download(
    transfer: Arc<dyn TransferClient>,
    images_dir: PathBuf,
    library: SharedLibrary,
    request: &DownloadRequest,
) -> Result<(), AssetError> {
    let bytes = transfer.download_image(&request.url).await?;
    let (bytes, extension) = blocking(move || {
        let extension = validate_image(&bytes)?;
        Ok((bytes, extension))
    })
    .await?;
    let filename = write_image(&images_dir, extension, &bytes).await?;

    let mut library = library.lock().await;
    let stored = match library.find_recipe_mut(request.recipe_id) {
        None => {
            tracing::debug!(
                "Recipe {} was deleted before its image arrived, discarding",
                request.recipe_id
            );
            None
        }
        Some((_, recipe)) if recipe.remote_image_url.as_deref() != Some(request.url.as_str()) => {
            tracing::debug!("Image for recipe {} is stale, discarding", request.recipe_id);
            None
        }
        // A photo picked locally while the download ran wins over the remote one.
        Some((_, recipe)) if recipe.upload_pending => {
            tracing::debug!(
                "Recipe {} got a local image during download, discarding",
                request.recipe_id
            );
            None
        }
        Some((collection_id, recipe)) => {
            let previous = recipe.local_image.replace(filename.clone());
            recipe.last_seen_remote_url = Some(request.url.clone());
            recipe.upload_pending = false;
            Some((collection_id, previous))
        }
    };
    let Some((collection_id, previous)) = stored else {
        drop(library);
        remove_quietly(&images_dir.join(&filename)).await;
        return Ok(());
    };
    library.persist(collection_id).await?;
    drop(library);

    if let Some(previous) = previous.filter(|p| *p != filename) {
        remove_quietly(&images_dir.join(previous)).await;
    }
    tracing::debug!("Downloaded image for recipe {}", request.recipe_id);
    Ok(())
}

/// Copies an image file into `images_dir`, validating that it decodes.
///
/// Returns the filename to store on the recipe.
pub async fn import_image_file(images_dir: &Path, source: &Path) -> Result<String, AssetError> {
    let bytes = tokio::fs::read(source)
        .await
        .map_err(|e| AssetError::Io(source.to_path_buf(), e))?;
    let (bytes, extension) = blocking(move || {
        let extension = validate_image(&bytes)?;
        Ok((bytes, extension))
    })
    .await?;
    write_image(images_dir, extension, &bytes).await
}

async fn blocking<T, F>(work: F) -> Result<T, AssetError>
where
    F: FnOnce() -> Result<T, ImageError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| AssetError::Task(e.to_string()))?
        .map_err(AssetError::from)
}

async fn write_image(images_dir: &Path, extension: &str, bytes: &[u8]) -> Result<String, AssetError> {
    tokio::fs::create_dir_all(images_dir)
        .await
        .map_err(|e| AssetError::Io(images_dir.to_path_buf(), e))?;
    let filename = format!("{}.{}", Uuid::new_v4(), extension);
    let path = images_dir.join(&filename);
    tokio::fs::write(&path, bytes)
        .await
        .map_err(|e| AssetError::Io(path, e))?;
    Ok(filename)
}

async fn remove_quietly(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        tracing::debug!("Could not remove {}: {}", path.display(), e);
    }
}

/// Checks that the bytes decode as an image; returns the file extension to use.
fn validate_image(bytes: &[u8]) -> Result<&'static str, ImageError> {
    let format = image::guess_format(bytes)?;
    image::load_from_memory_with_format(bytes, format)?;
    Ok(format.extensions_str().first().copied().unwrap_or("img"))
}

/// Downscales to [`MAX_IMAGE_DIMENSION`] and encodes as JPEG.
pub fn encode_for_upload(bytes: &[u8]) -> Result<Vec<u8>, ImageError> {
    let mut image = image::load_from_memory(bytes)?;
    if image.width() > MAX_IMAGE_DIMENSION || image.height() > MAX_IMAGE_DIMENSION {
        image = image.thumbnail(MAX_IMAGE_DIMENSION, MAX_IMAGE_DIMENSION);
    }
    let rgb = image.to_rgb8();

    let mut encoded = Vec::new();
    JpegEncoder::new_with_quality(&mut encoded, JPEG_QUALITY).encode_image(&rgb)?;
    Ok(encoded)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::db::{init_db, CollectionRepository};
    use crate::library::Library;
    use crate::transfer::memory::MemoryTransfer;
    use image::{ImageFormat, RgbImage};
    use std::io::Cursor;
    use std::time::Duration;
    use tempfile::TempDir;

    pub(crate) fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let image = RgbImage::from_pixel(width, height, image::Rgb([200, 80, 40]));
        let mut bytes = Vec::new();
        image
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .unwrap();
        bytes
    }

    pub(crate) async fn wait_for_downloads(pipeline: &AssetPipeline) {
        for _ in 0..200 {
            if pipeline.pending_downloads() == 0 {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("downloads did not finish");
    }

    struct Fixture {
        library: SharedLibrary,
        remote: Arc<MemoryTransfer>,
        pipeline: AssetPipeline,
        collection_id: Uuid,
        recipe_id: Uuid,
        _temp_dir: TempDir,
    }

    async fn fixture() -> Fixture {
        let temp_dir = TempDir::new().unwrap();
        let pool = init_db(&temp_dir.path().join("test.db")).await.unwrap();
        let mut library = Library::open(CollectionRepository::new(pool)).await.unwrap();
        let collection_id = library.create_collection("Family").await.unwrap();
        let group_id = library.add_group(collection_id, "Dinners").await.unwrap();
        let recipe_id = library
            .add_recipe(group_id, Recipe::new(Uuid::nil(), "Pizza", ""))
            .await
            .unwrap();

        let remote = Arc::new(MemoryTransfer::new());
        let pipeline = AssetPipeline::new(remote.clone(), temp_dir.path().join("images"));
        Fixture {
            library: library.into_shared(),
            remote,
            pipeline,
            collection_id,
            recipe_id,
            _temp_dir: temp_dir,
        }
    }

    async fn recipe(f: &Fixture) -> Recipe {
        f.library.lock().await.find_recipe(f.recipe_id).cloned().unwrap()
    }

    #[test]
    fn test_encode_for_upload_downscales() {
        let encoded = encode_for_upload(&png_bytes(3200, 800)).unwrap();
        let decoded = image::load_from_memory(&encoded).unwrap();

        assert_eq!(image::guess_format(&encoded).unwrap(), ImageFormat::Jpeg);
        assert_eq!(decoded.width(), 1600);
        assert_eq!(decoded.height(), 400);
    }

    #[test]
    fn test_encode_for_upload_keeps_small_images() {
        let decoded = image::load_from_memory(&encode_for_upload(&png_bytes(64, 32)).unwrap()).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (64, 32));
    }

    #[test]
    fn test_encode_rejects_garbage() {
        assert!(encode_for_upload(b"not an image").is_err());
    }

    #[tokio::test]
    async fn test_import_local_image() {
        let f = fixture().await;
        let source = f._temp_dir.path().join("photo.png");
        std::fs::write(&source, png_bytes(10, 10)).unwrap();

        let filename = f.pipeline.import_local_image(&source).await.unwrap();

        assert!(filename.ends_with(".png"));
        assert!(f.pipeline.image_path(&filename).exists());
    }

    #[tokio::test]
    async fn test_import_local_image_rejects_non_images() {
        let f = fixture().await;
        let source = f._temp_dir.path().join("notes.txt");
        std::fs::write(&source, "hello").unwrap();

        let err = f.pipeline.import_local_image(&source).await.unwrap_err();
        assert!(matches!(err, AssetError::Image(_)));
    }

    #[tokio::test]
    async fn test_upload_pending_records_remote_url() {
        let f = fixture().await;
        let source = f._temp_dir.path().join("photo.png");
        std::fs::write(&source, png_bytes(20, 20)).unwrap();
        let filename = f.pipeline.import_local_image(&source).await.unwrap();
        f.library
            .lock()
            .await
            .set_recipe_image(f.recipe_id, filename)
            .await
            .unwrap();
        assert_eq!(recipe(&f).await.image_state(), ImageState::PendingUpload);

        let uploaded = f.pipeline.upload_pending(&f.library, f.collection_id).await.unwrap();

        assert_eq!(uploaded, 1);
        let recipe = recipe(&f).await;
        assert_eq!(recipe.image_state(), ImageState::Synced);
        assert_eq!(recipe.remote_image_url.as_deref(), Some("memory://images/1.jpg"));
        assert_eq!(f.pipeline.image_state(&recipe), ImageState::Synced);
    }

    #[tokio::test]
    async fn test_upload_failure_leaves_recipe_pending() {
        let f = fixture().await;
        let source = f._temp_dir.path().join("photo.png");
        std::fs::write(&source, png_bytes(20, 20)).unwrap();
        let filename = f.pipeline.import_local_image(&source).await.unwrap();
        f.library
            .lock()
            .await
            .set_recipe_image(f.recipe_id, filename)
            .await
            .unwrap();
        f.remote.fail_upload(true);

        let err = f.pipeline.upload_pending(&f.library, f.collection_id).await.unwrap_err();

        assert!(matches!(err, AssetError::Transfer(_)));
        assert!(recipe(&f).await.upload_pending);
    }

    #[tokio::test]
    async fn test_missing_image_file_is_skipped() {
        let f = fixture().await;
        f.library
            .lock()
            .await
            .set_recipe_image(f.recipe_id, "gone.jpg".to_string())
            .await
            .unwrap();

        let uploaded = f.pipeline.upload_pending(&f.library, f.collection_id).await.unwrap();

        assert_eq!(uploaded, 0);
        assert_eq!(f.remote.calls().uploads, 0);
        let recipe = recipe(&f).await;
        assert!(recipe.upload_pending);
        assert!(recipe.remote_image_url.is_none());
    }

    #[tokio::test]
    async fn test_nothing_to_upload() {
        let f = fixture().await;
        let uploaded = f.pipeline.upload_pending(&f.library, f.collection_id).await.unwrap();
        assert_eq!(uploaded, 0);
        assert_eq!(f.remote.calls().uploads, 0);
    }

    async fn point_at_remote(f: &Fixture, url: &str) {
        let mut library = f.library.lock().await;
        let (_, recipe) = library.find_recipe_mut(f.recipe_id).unwrap();
        recipe.remote_image_url = Some(url.to_string());
    }

    #[tokio::test]
    async fn test_download_writes_back() {
        let f = fixture().await;
        let url = "memory://images/hero.png";
        f.remote.put_image(url, png_bytes(8, 8));
        point_at_remote(&f, url).await;

        let started = f.pipeline.schedule_download(
            &f.library,
            DownloadRequest {
                recipe_id: f.recipe_id,
                url: url.into(),
            },
        );
        assert!(started);
        wait_for_downloads(&f.pipeline).await;

        let recipe = recipe(&f).await;
        assert_eq!(recipe.image_state(), ImageState::Synced);
        assert_eq!(recipe.last_seen_remote_url.as_deref(), Some(url));
        let filename = recipe.local_image.unwrap();
        assert!(f.pipeline.image_path(&filename).exists());
    }

    #[tokio::test]
    async fn test_same_url_is_not_downloaded_twice() {
        let f = fixture().await;
        let url = "memory://images/hero.png";
        f.remote.put_image(url, png_bytes(8, 8));
        f.remote.delay_downloads(Duration::from_millis(100));
        point_at_remote(&f, url).await;

        let request = DownloadRequest {
            recipe_id: f.recipe_id,
            url: url.into(),
        };
        assert!(f.pipeline.schedule_download(&f.library, request.clone()));
        assert!(!f.pipeline.schedule_download(&f.library, request));
        assert_eq!(f.pipeline.image_state(&recipe(&f).await), ImageState::Downloading);

        wait_for_downloads(&f.pipeline).await;
        assert_eq!(f.remote.calls().downloads, 1);
    }

    #[tokio::test]
    async fn test_failed_download_leaves_state() {
        let f = fixture().await;
        let url = "memory://images/hero.png";
        f.remote.put_image(url, png_bytes(8, 8));
        f.remote.fail_download(true);
        point_at_remote(&f, url).await;

        f.pipeline.schedule_download(
            &f.library,
            DownloadRequest {
                recipe_id: f.recipe_id,
                url: url.into(),
            },
        );
        wait_for_downloads(&f.pipeline).await;

        let recipe = recipe(&f).await;
        assert_eq!(recipe.image_state(), ImageState::PendingDownload);
        assert!(recipe.local_image.is_none());

        f.remote.fail_download(false);
        assert_eq!(f.pipeline.resume_downloads(&f.library, f.collection_id).await, 1);
        wait_for_downloads(&f.pipeline).await;
        assert!(f.library.lock().await.find_recipe(f.recipe_id).unwrap().local_image.is_some());
    }

    #[tokio::test]
    async fn test_recipe_deleted_mid_download() {
        let f = fixture().await;
        let url = "memory://images/hero.png";
        f.remote.put_image(url, png_bytes(8, 8));
        f.remote.delay_downloads(Duration::from_millis(50));
        point_at_remote(&f, url).await;

        f.pipeline.schedule_download(
            &f.library,
            DownloadRequest {
                recipe_id: f.recipe_id,
                url: url.into(),
            },
        );
        f.library.lock().await.remove_recipe(f.recipe_id).await.unwrap();
        wait_for_downloads(&f.pipeline).await;

        let leftover = std::fs::read_dir(f.pipeline.images_dir())
            .map(|entries| entries.count())
            .unwrap_or(0);
        assert_eq!(leftover, 0);
    }

    #[tokio::test]
    async fn test_local_image_picked_mid_download_wins() {
        let f = fixture().await;
        let url = "memory://images/hero.png";
        f.remote.put_image(url, png_bytes(8, 8));
        f.remote.delay_downloads(Duration::from_millis(100));
        point_at_remote(&f, url).await;

        f.pipeline.schedule_download(
            &f.library,
            DownloadRequest {
                recipe_id: f.recipe_id,
                url: url.into(),
            },
        );

        let source = f._temp_dir.path().join("mine.png");
        std::fs::write(&source, png_bytes(6, 6)).unwrap();
        let mine = f.pipeline.import_local_image(&source).await.unwrap();
        f.library
            .lock()
            .await
            .set_recipe_image(f.recipe_id, mine.clone())
            .await
            .unwrap();
        wait_for_downloads(&f.pipeline).await;

        let recipe = recipe(&f).await;
        assert_eq!(recipe.local_image.as_deref(), Some(mine.as_str()));
        assert!(recipe.upload_pending);
        assert!(f.pipeline.image_path(&mine).exists());
        let stored = std::fs::read_dir(f.pipeline.images_dir()).unwrap().count();
        assert_eq!(stored, 1);
    }

    #[tokio::test]
    async fn test_cancel_downloads() {
        let f = fixture().await;
        let url = "memory://images/hero.png";
        f.remote.put_image(url, png_bytes(8, 8));
        f.remote.delay_downloads(Duration::from_secs(5));
        point_at_remote(&f, url).await;

        f.pipeline.schedule_download(
            &f.library,
            DownloadRequest {
                recipe_id: f.recipe_id,
                url: url.into(),
            },
        );
        assert_eq!(f.pipeline.pending_downloads(), 1);

        f.pipeline.cancel_downloads(&[f.recipe_id]);
        assert_eq!(f.pipeline.pending_downloads(), 0);
        assert!(!f.pipeline.is_downloading(f.recipe_id));
    }

    #[tokio::test]
    async fn test_discard_images() {
        let f = fixture().await;
        let source = f._temp_dir.path().join("photo.png");
        std::fs::write(&source, png_bytes(4, 4)).unwrap();
        let filename = f.pipeline.import_local_image(&source).await.unwrap();

        f.pipeline
            .discard_images(&[filename.clone(), "missing.jpg".to_string()])
            .await;

        assert!(!f.pipeline.image_path(&filename).exists());
    }
}
