//! Transport to the remote collection store.
//!
//! The transport is stateless and performs no retries. Retry policy lives in the
//! sync coordinator.

mod http;
#[cfg(test)]
pub(crate) mod memory;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::snapshot::CollectionSnapshot;

pub use http::HttpTransferClient;

/// Header carrying the static token on every request.
pub const AUTH_HEADER: &str = "X-Api-Key";

/// Body returned by `POST /images`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ImageUploadResponse {
    #[serde(rename = "imageURL")]
    pub image_url: String,
}

/// Errors surfaced by a transfer client.
#[derive(Error, Debug)]
pub enum TransferError {
    /// The server answered 404.
    #[error("Not found on server: {0}")]
    NotFound(String),

    /// Any other non-success status.
    #[error("Server returned status {status}: {message}")]
    Status { status: u16, message: String },

    /// The request never produced a response (connect, DNS, reset...).
    #[error("HTTP error: {0}")]
    Http(String),

    /// A response arrived but its body could not be decoded.
    #[error("Invalid response body: {0}")]
    Decode(String),
}

impl TransferError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, TransferError::NotFound(_))
    }

    /// True for network errors and non-success statuses, false for decode errors.
    pub fn is_transport(&self) -> bool {
        !matches!(self, TransferError::Decode(_))
    }
}

/// Remote store operations used by the sync engine.
#[async_trait]
pub trait TransferClient: Send + Sync {
    /// `GET /collections/{id}`
    async fn fetch(&self, id: Uuid) -> Result<CollectionSnapshot, TransferError>;

    /// `POST /collections/{id}`, an idempotent upsert.
    async fn push(&self, snapshot: &CollectionSnapshot) -> Result<(), TransferError>;

    /// `DELETE /collections/{id}`
    async fn delete(&self, id: Uuid) -> Result<(), TransferError>;

    /// `POST /images` with the raw bytes; returns the URL the image is served from.
    async fn upload_image(&self, bytes: Vec<u8>) -> Result<String, TransferError>;

    /// Fetches the bytes behind an image URL taken from a snapshot.
    async fn download_image(&self, url: &str) -> Result<Vec<u8>, TransferError>;
}
