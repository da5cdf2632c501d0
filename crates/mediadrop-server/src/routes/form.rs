//! Multipart form decoding shared by the upload and edit endpoints.

use axum::extract::multipart::{Multipart, MultipartError};
use axum::http::StatusCode;

use crate::attachment::PictureUpload;
use crate::error::AppError;

/// Fallback file name when the client sends the picture without one.
const DEFAULT_PICTURE_NAME: &str = "picture";

/// Fields of an item form. Absent fields stay `None`.
#[derive(Debug, Default)]
pub struct ItemForm {
    pub name: Option<String>,
    pub description: Option<String>,
    pub picture: Option<PictureUpload>,
}

/// Reads the `name`, `description` and `picture` fields of a multipart body.
/// Unknown fields are skipped.
pub async fn read_item_form(mut multipart: Multipart) -> Result<ItemForm, AppError> {
    let mut form = ItemForm::default();

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let field_name = field.name().unwrap_or_default().to_string();
        match field_name.as_str() {
            "name" => form.name = Some(field.text().await.map_err(multipart_error)?),
            "description" => form.description = Some(field.text().await.map_err(multipart_error)?),
            "picture" => {
                let file_name = field
                    .file_name()
                    .filter(|n| !n.is_empty())
                    .unwrap_or(DEFAULT_PICTURE_NAME)
                    .to_string();
                let content_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let bytes = field.bytes().await.map_err(multipart_error)?;
                form.picture = Some(PictureUpload {
                    file_name,
                    content_type,
                    bytes,
                });
            }
            other => {
                tracing::debug!("Ignoring unknown form field '{}'", other);
            }
        }
    }

    Ok(form)
}

fn multipart_error(e: MultipartError) -> AppError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge(e.body_text())
    } else {
        AppError::BadRequest(format!("Invalid multipart body: {}", e.body_text()))
    }
}
