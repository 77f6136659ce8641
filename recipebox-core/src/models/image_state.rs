use std::fmt;

/// Where a recipe's image is in its sync lifecycle.
///
/// ```text
/// NoImage -> PendingUpload -> Uploading -> Synced
/// PendingDownload -> Downloading -> Synced
/// ```
///
/// `Uploading` and `Downloading` only exist while a transfer is in flight, so
/// they are reported by the asset pipeline rather than stored on the recipe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageState {
    NoImage,
    PendingUpload,
    Uploading,
    PendingDownload,
    Downloading,
    Synced,
}

impl fmt::Display for ImageState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImageState::NoImage => write!(f, "none"),
            ImageState::PendingUpload => write!(f, "pending upload"),
            ImageState::Uploading => write!(f, "uploading"),
            ImageState::PendingDownload => write!(f, "pending download"),
            ImageState::Downloading => write!(f, "downloading"),
            ImageState::Synced => write!(f, "synced"),
        }
    }
}
