//! Item model: one uploaded asset with its picture attachment.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::attachment::{PictureUpload, StoredPicture};

/// Represents an item stored in the database.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Item {
    /// Unique identifier for this item.
    pub id: Uuid,
    pub name: String,
    pub description: String,
    /// Original file name of the picture (null if no picture attached).
    pub picture_file_name: Option<String>,
    pub picture_content_type: Option<String>,
    pub picture_file_size: Option<i64>,
    /// SHA-256 hex of the original picture bytes.
    pub picture_fingerprint: Option<String>,
    pub picture_updated_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Item {
    /// Returns the attached picture, if the attachment columns are populated.
    ///
    /// Presence is only validated on write, so rows read back may lack one.
    pub fn picture(&self) -> Option<StoredPicture> {
        match (&self.picture_file_name, &self.picture_fingerprint) {
            (Some(file_name), Some(fingerprint)) => Some(StoredPicture {
                file_name: file_name.clone(),
                content_type: self
                    .picture_content_type
                    .clone()
                    .unwrap_or_else(|| "application/octet-stream".to_string()),
                file_size: self.picture_file_size.unwrap_or_default(),
                fingerprint: fingerprint.clone(),
            }),
            _ => None,
        }
    }

    /// Returns the URL path for this item.
    pub fn url_path(&self) -> String {
        format!("/items/{}", self.id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("Picture can't be blank")]
    PictureBlank,
}

/// Data required to create a new item.
#[derive(Debug, Clone, Default)]
pub struct NewItem {
    pub name: String,
    pub description: String,
    pub picture: Option<PictureUpload>,
}

impl NewItem {
    /// Checks the picture is present and non-empty. Any content type is accepted.
    pub fn validate(&self) -> Result<&PictureUpload, ValidationError> {
        match &self.picture {
            Some(picture) if !picture.is_empty() => Ok(picture),
            _ => Err(ValidationError::PictureBlank),
        }
    }
}

/// Partial update of an item. `None` fields are left unchanged.
#[derive(Debug, Clone, Default)]
pub struct ItemChanges {
    pub name: Option<String>,
    pub description: Option<String>,
    pub picture: Option<PictureUpload>,
}

impl ItemChanges {
    /// A replacement picture must not be empty.
    pub fn validate(&self) -> Result<(), ValidationError> {
        match &self.picture {
            Some(picture) if picture.is_empty() => Err(ValidationError::PictureBlank),
            _ => Ok(()),
        }
    }
}
