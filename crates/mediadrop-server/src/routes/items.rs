//! Item read and edit endpoints.

use std::collections::BTreeMap;

use axum::{
    extract::{Multipart, Path, State},
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use mediadrop_crypto::ContentDigest;
use serde::Serialize;
use uuid::Uuid;

use super::form::read_item_form;
use super::AppState;
use crate::attachment::Style;
use crate::error::AppError;
use crate::models::item::{Item, ItemChanges};
use crate::store::ItemStore;

/// JSON representation of an item.
#[derive(Debug, Serialize)]
pub struct ItemResponse {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    /// Picture metadata (null when the row has no attachment).
    pub picture: Option<PictureResponse>,
    /// URL per style; missing-picture URLs when there is no attachment.
    pub urls: BTreeMap<&'static str, String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct PictureResponse {
    pub file_name: String,
    pub content_type: String,
    pub file_size: i64,
    pub fingerprint: ContentDigest,
    pub updated_at: Option<DateTime<Utc>>,
}

impl ItemResponse {
    pub fn from_item(store: &ItemStore, item: Item) -> Self {
        let urls = Style::ALL
            .into_iter()
            .map(|style| (style.name(), store.url_for(&item, style)))
            .collect();
        let picture = item.picture().map(|p| PictureResponse {
            file_name: p.file_name,
            content_type: p.content_type,
            file_size: p.file_size,
            fingerprint: ContentDigest::sha256(p.fingerprint),
            updated_at: item.picture_updated_at,
        });

        Self {
            id: item.id,
            name: item.name,
            description: item.description,
            picture,
            urls,
            created_at: item.created_at,
            updated_at: item.updated_at,
        }
    }
}

/// Creates the items router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(list_items))
        .route("/{id}", get(show_item).patch(update_item))
        .with_state(state)
}

/// GET /items
///
/// Lists all items, newest first.
async fn list_items(State(state): State<AppState>) -> Result<Json<Vec<ItemResponse>>, AppError> {
    let items = state.store.list().await?;
    Ok(Json(
        items
            .into_iter()
            .map(|item| ItemResponse::from_item(&state.store, item))
            .collect(),
    ))
}

/// GET /items/{id}
async fn show_item(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ItemResponse>, AppError> {
    let item = state
        .store
        .find(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Item {} not found", id)))?;
    Ok(Json(ItemResponse::from_item(&state.store, item)))
}

/// PATCH /items/{id}
///
/// Accepts the same multipart fields as the upload endpoint; every field is
/// optional and only the fields present are changed.
async fn update_item(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    multipart: Multipart,
) -> Result<Json<ItemResponse>, AppError> {
    let form = read_item_form(multipart).await?;
    let changes = ItemChanges {
        name: form.name,
        description: form.description,
        picture: form.picture,
    };

    let item = state.store.update(id, changes).await?;
    Ok(Json(ItemResponse::from_item(&state.store, item)))
}
