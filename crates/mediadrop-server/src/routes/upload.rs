//! Upload endpoint: one multipart POST creates one item.

use axum::{
    extract::{Multipart, State},
    http::{header, StatusCode},
    routing::post,
    Json, Router,
};

use super::form::read_item_form;
use super::items::ItemResponse;
use super::AppState;
use crate::error::AppError;
use crate::models::item::NewItem;

/// Creates the upload router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", post(upload_item))
        .with_state(state)
}

/// POST /upload
///
/// Accepts a multipart form with `name`, `description` and `picture`.
/// Missing text fields default to empty strings; a missing or empty picture
/// is rejected with 422 and nothing is stored. The created item's location
/// is returned in the `Location` header.
async fn upload_item(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<(StatusCode, [(header::HeaderName, String); 1], Json<ItemResponse>), AppError> {
    let form = read_item_form(multipart).await?;
    let new_item = NewItem {
        name: form.name.unwrap_or_default(),
        description: form.description.unwrap_or_default(),
        picture: form.picture,
    };

    let item = state.store.create(new_item).await?;
    let location = item.url_path();
    Ok((
        StatusCode::CREATED,
        [(header::LOCATION, location)],
        Json(ItemResponse::from_item(&state.store, item)),
    ))
}
