//! HTTP routes for the mediadrop server.

pub mod form;
pub mod items;
pub mod upload;

use std::path::PathBuf;

use axum::extract::DefaultBodyLimit;
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::config::DEFAULT_MAX_UPLOAD_BYTES;
use crate::store::ItemStore;

/// Shared state of every handler.
#[derive(Debug, Clone)]
pub struct AppState {
    pub store: ItemStore,
    /// Static files; missing-picture defaults live in `images/` below it.
    pub public_dir: PathBuf,
    pub max_upload_bytes: usize,
}

impl AppState {
    pub fn new(store: ItemStore, public_dir: impl Into<PathBuf>) -> Self {
        Self {
            store,
            public_dir: public_dir.into(),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }

    pub fn with_max_upload_bytes(mut self, max_upload_bytes: usize) -> Self {
        self.max_upload_bytes = max_upload_bytes;
        self
    }
}

/// Creates the main router with all routes mounted.
pub fn create_router(state: AppState) -> Router {
    let media_dir = state.store.attachments().media_root().to_path_buf();
    let images_dir = state.public_dir.join("images");
    let body_limit = state.max_upload_bytes;

    Router::new()
        .nest("/upload", upload::router(state.clone()))
        .nest("/items", items::router(state))
        .nest_service("/media", ServeDir::new(media_dir))
        .nest_service("/images", ServeDir::new(images_dir))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}
