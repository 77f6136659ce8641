//! Reference remote store for Recipebox collections.
//!
//! # Endpoints
//!
//! - `GET /health`: Health check endpoint (no auth required)
//! - `GET /collections/{id}`: Latest snapshot of a collection
//! - `POST /collections/{id}`: Store a snapshot (upsert)
//! - `DELETE /collections/{id}`: Remove a collection
//! - `POST /images`: Store raw image bytes, returns `{ "imageURL": ... }`
//! - `GET /images/{name}`: Serve a stored image

pub mod storage;

pub use storage::{ServerStorage, ServerStorageError};

use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, Path, Request, State},
    http::{header, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use recipebox_core::{CollectionSnapshot, ImageUploadResponse, AUTH_HEADER};
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

/// Largest accepted image upload.
pub const MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;

/// Set of accepted API keys.
#[derive(Debug, Clone, Default)]
pub struct ApiKeyStore {
    keys: HashSet<String>,
}

impl ApiKeyStore {
    pub fn new(keys: impl IntoIterator<Item = String>) -> Self {
        Self {
            keys: keys
                .into_iter()
                .map(|k| k.trim().to_string())
                .filter(|k| !k.is_empty())
                .collect(),
        }
    }

    /// Parses a comma separated key list, as given in `RECIPEBOX_API_KEYS`.
    pub fn from_list(list: &str) -> Self {
        Self::new(list.split(',').map(str::to_string))
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    fn validate(&self, key: &str) -> bool {
        self.keys.contains(key)
    }
}

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub storage: Arc<ServerStorage>,
    pub api_keys: Arc<ApiKeyStore>,
    /// Base URL clients reach this server on, used to build image URLs.
    pub public_url: String,
}

impl AppState {
    pub fn new(storage: ServerStorage, api_keys: ApiKeyStore, public_url: &str) -> Self {
        Self {
            storage: Arc::new(storage),
            api_keys: Arc::new(api_keys),
            public_url: public_url.trim_end_matches('/').to_string(),
        }
    }
}

/// Error response body
#[derive(Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
}

fn error_response(status: StatusCode, error: &'static str, message: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorBody {
            error,
            message: message.into(),
        }),
    )
        .into_response()
}

/// Handler errors
#[derive(Debug)]
pub enum ApiError {
    NotFound(String),
    BadRequest(String),
    Storage(ServerStorageError),
}

impl From<ServerStorageError> for ApiError {
    fn from(e: ServerStorageError) -> Self {
        match e {
            ServerStorageError::InvalidName(name) => ApiError::BadRequest(format!("Invalid name: {}", name)),
            e => ApiError::Storage(e),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::NotFound(what) => error_response(StatusCode::NOT_FOUND, "not_found", what),
            ApiError::BadRequest(message) => {
                error_response(StatusCode::BAD_REQUEST, "bad_request", message)
            }
            ApiError::Storage(e) => {
                tracing::error!("Storage error: {}", e);
                error_response(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "storage_error",
                    "Internal storage error",
                )
            }
        }
    }
}

/// Authentication middleware
async fn auth_middleware(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let auth_header = request
        .headers()
        .get(AUTH_HEADER)
        .and_then(|h| h.to_str().ok());

    let api_key = match auth_header {
        Some(h) => match h.strip_prefix("Bearer ") {
            Some(key) => key,
            None => {
                return error_response(
                    StatusCode::UNAUTHORIZED,
                    "invalid_auth",
                    format!("{} header must use Bearer scheme", AUTH_HEADER),
                );
            }
        },
        None => {
            return error_response(
                StatusCode::UNAUTHORIZED,
                "missing_auth",
                format!("{} header required", AUTH_HEADER),
            );
        }
    };

    if state.api_keys.validate(api_key) {
        next.run(request).await
    } else {
        error_response(StatusCode::UNAUTHORIZED, "invalid_key", "Invalid API key")
    }
}

/// Health check response
#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

/// Health check endpoint (no auth required)
async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn get_collection(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<CollectionSnapshot>, ApiError> {
    state
        .storage
        .load_collection(id)?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Collection {} not found", id)))
}

async fn push_collection(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(snapshot): Json<CollectionSnapshot>,
) -> Result<StatusCode, ApiError> {
    if snapshot.id != id {
        return Err(ApiError::BadRequest(format!(
            "Snapshot id {} does not match path id {}",
            snapshot.id, id
        )));
    }
    state.storage.save_collection(&snapshot)?;
    tracing::info!("Stored collection {} at version {}", id, snapshot.version);
    Ok(StatusCode::NO_CONTENT)
}

async fn delete_collection(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    if state.storage.delete_collection(id)? {
        tracing::info!("Deleted collection {}", id);
    }
    Ok(StatusCode::NO_CONTENT)
}

async fn upload_image(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<ImageUploadResponse>, ApiError> {
    if body.is_empty() {
        return Err(ApiError::BadRequest("Empty image body".to_string()));
    }
    let name = state.storage.save_image(&body)?;
    tracing::debug!("Stored image {} ({} bytes)", name, body.len());
    Ok(Json(ImageUploadResponse {
        image_url: format!("{}/images/{}", state.public_url, name),
    }))
}

async fn get_image(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Response, ApiError> {
    let bytes = state
        .storage
        .load_image(&name)?
        .ok_or_else(|| ApiError::NotFound(format!("Image {} not found", name)))?;
    Ok(([(header::CONTENT_TYPE, "image/jpeg")], bytes).into_response())
}

/// Builds the full application router.
pub fn router(state: AppState) -> Router {
    // Public routes (no auth)
    let public_routes = Router::new().route("/health", get(health));

    // Protected routes (auth required)
    let protected_routes = Router::new()
        .route(
            "/collections/{id}",
            get(get_collection)
                .post(push_collection)
                .delete(delete_collection),
        )
        .route("/images", post(upload_image))
        .route("/images/{name}", get(get_image))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}
