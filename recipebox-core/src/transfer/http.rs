//! reqwest-backed transfer client for the REST collection store.

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use uuid::Uuid;

use super::{ImageUploadResponse, TransferClient, TransferError, AUTH_HEADER};
use crate::snapshot::CollectionSnapshot;

/// HTTP transfer client.
///
/// ```text
/// GET    /collections/{id}  -> CollectionSnapshot
/// POST   /collections/{id}  <- CollectionSnapshot
/// DELETE /collections/{id}
/// POST   /images            <- raw bytes, -> { "imageURL": ... }
/// ```
#[derive(Debug, Clone)]
pub struct HttpTransferClient {
    server_url: String,
    api_key: String,
    client: Client,
}

impl HttpTransferClient {
    /// Creates a new client for the given server and token.
    pub fn new(server_url: String, api_key: String) -> Self {
        Self {
            server_url: normalize_base_url(&server_url),
            api_key,
            client: Client::new(),
        }
    }

    /// Returns the normalized server URL.
    pub fn server_url(&self) -> &str {
        &self.server_url
    }

    fn build_http_url(&self, path: &str) -> String {
        format!("{}{}", self.server_url, path)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request.header(AUTH_HEADER, format!("Bearer {}", self.api_key))
    }

    /// Only URLs on our own server get the token.
    fn is_own_url(&self, url: &str) -> bool {
        url.strip_prefix(&self.server_url)
            .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
    }

    async fn send(&self, request: RequestBuilder, what: String) -> Result<Response, TransferError> {
        let response = request
            .send()
            .await
            .map_err(|e| TransferError::Http(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        if status == StatusCode::NOT_FOUND {
            return Err(TransferError::NotFound(what));
        }

        let mut message = response.text().await.unwrap_or_default();
        message.truncate(200);
        Err(TransferError::Status {
            status: status.as_u16(),
            message,
        })
    }
}

#[async_trait]
impl TransferClient for HttpTransferClient {
    async fn fetch(&self, id: Uuid) -> Result<CollectionSnapshot, TransferError> {
        let url = self.build_http_url(&format!("/collections/{}", id));
        let request = self.authorized(self.client.get(&url));
        let response = self.send(request, format!("collection {}", id)).await?;

        response
            .json::<CollectionSnapshot>()
            .await
            .map_err(|e| TransferError::Decode(e.to_string()))
    }

    async fn push(&self, snapshot: &CollectionSnapshot) -> Result<(), TransferError> {
        let url = self.build_http_url(&format!("/collections/{}", snapshot.id));
        let request = self.authorized(self.client.post(&url).json(snapshot));
        self.send(request, format!("collection {}", snapshot.id))
            .await?;
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> Result<(), TransferError> {
        let url = self.build_http_url(&format!("/collections/{}", id));
        let request = self.authorized(self.client.delete(&url));
        self.send(request, format!("collection {}", id)).await?;
        Ok(())
    }

    async fn upload_image(&self, bytes: Vec<u8>) -> Result<String, TransferError> {
        let url = self.build_http_url("/images");
        let request = self.authorized(
            self.client
                .post(&url)
                .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
                .body(bytes),
        );
        let response = self.send(request, "image upload".to_string()).await?;

        let body: ImageUploadResponse = response
            .json()
            .await
            .map_err(|e| TransferError::Decode(e.to_string()))?;
        Ok(body.image_url)
    }

    async fn download_image(&self, url: &str) -> Result<Vec<u8>, TransferError> {
        let mut request = self.client.get(url);
        if self.is_own_url(url) {
            request = self.authorized(request);
        }
        let response = self.send(request, url.to_string()).await?;

        let bytes = response
            .bytes()
            .await
            .map_err(|e| TransferError::Http(e.to_string()))?;
        Ok(bytes.to_vec())
    }
}

/// Accepts `host:port`, `http(s)://...` and stray `ws(s)://` URLs.
fn normalize_base_url(server_url: &str) -> String {
    let base_url = if server_url.starts_with("ws://") {
        server_url.replacen("ws://", "http://", 1)
    } else if server_url.starts_with("wss://") {
        server_url.replacen("wss://", "https://", 1)
    } else if !server_url.starts_with("http://") && !server_url.starts_with("https://") {
        format!("http://{}", server_url)
    } else {
        server_url.to_string()
    };

    base_url.trim_end_matches('/').to_string()
}
