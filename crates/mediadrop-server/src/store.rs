//! Item store: persists items and hands their pictures to the attachment store.

use std::sync::Arc;

use sqlx::PgPool;
use uuid::Uuid;

use crate::attachment::{AttachmentStore, StoredPicture, Style};
use crate::error::AppError;
use crate::models::item::{Item, ItemChanges, NewItem};

const ITEM_COLUMNS: &str = "id, name, description, picture_file_name, picture_content_type, \
     picture_file_size, picture_fingerprint, picture_updated_at, created_at, updated_at";

#[derive(Debug, Clone)]
pub struct ItemStore {
    pool: PgPool,
    attachments: Arc<AttachmentStore>,
}

impl ItemStore {
    pub fn new(pool: PgPool, attachments: AttachmentStore) -> Self {
        Self {
            pool,
            attachments: Arc::new(attachments),
        }
    }

    pub fn attachments(&self) -> &AttachmentStore {
        &self.attachments
    }

    /// Creates an item from a validated upload.
    ///
    /// The picture and its variants are written before the row is inserted;
    /// if the insert fails the files are removed again, so an item either
    /// exists with all its files or not at all.
    pub async fn create(&self, new_item: NewItem) -> Result<Item, AppError> {
        let upload = new_item.validate()?;

        let id = Uuid::new_v4();
        let picture = self.attachments.store(id, upload).await?;

        match insert_item(&self.pool, id, &new_item, &picture).await {
            Ok(item) => {
                tracing::info!(item_id = %item.id, name = %item.name, "Created item");
                Ok(item)
            }
            Err(e) => {
                self.attachments.remove(id, &picture).await;
                Err(e)
            }
        }
    }

    pub async fn find(&self, id: Uuid) -> Result<Option<Item>, AppError> {
        let item = sqlx::query_as::<_, Item>(&format!(
            "SELECT {} FROM items WHERE id = $1",
            ITEM_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(item)
    }

    /// Lists all items, newest first.
    pub async fn list(&self) -> Result<Vec<Item>, AppError> {
        let items = sqlx::query_as::<_, Item>(&format!(
            "SELECT {} FROM items ORDER BY created_at DESC",
            ITEM_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(items)
    }

    /// Applies `changes` to an existing item.
    ///
    /// A replacement picture is stored first; the previous picture's files
    /// are only removed once the row points at the new one.
    pub async fn update(&self, id: Uuid, changes: ItemChanges) -> Result<Item, AppError> {
        changes.validate()?;

        let existing = self
            .find(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Item {} not found", id)))?;
        let previous = existing.picture();

        let replacement = match &changes.picture {
            Some(upload) => Some(self.attachments.store(id, upload).await?),
            None => None,
        };

        let updated = match update_item(&self.pool, id, &changes, replacement.as_ref()).await {
            Ok(item) => item,
            Err(e) => {
                if let Some(new) = &replacement {
                    if !previous.as_ref().is_some_and(|old| old.shares_files_with(new)) {
                        self.attachments.remove(id, new).await;
                    }
                }
                return Err(e);
            }
        };

        if let (Some(old), Some(new)) = (&previous, &replacement) {
            if !old.shares_files_with(new) {
                self.attachments.remove(id, old).await;
            }
        }

        tracing::info!(
            item_id = %id,
            picture_replaced = replacement.is_some(),
            "Updated item"
        );

        Ok(updated)
    }

    /// URL of `style` for the item's picture, or the missing-picture URL.
    pub fn url_for(&self, item: &Item, style: Style) -> String {
        self.attachments.url_for(item.id, item.picture().as_ref(), style)
    }
}

async fn insert_item(
    pool: &PgPool,
    id: Uuid,
    item: &NewItem,
    picture: &StoredPicture,
) -> Result<Item, AppError> {
    let row = sqlx::query_as::<_, Item>(&format!(
        r#"
        INSERT INTO items (
            id, name, description,
            picture_file_name, picture_content_type, picture_file_size,
            picture_fingerprint, picture_updated_at, created_at, updated_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, NOW(), NOW(), NOW())
        RETURNING {}
        "#,
        ITEM_COLUMNS
    ))
    .bind(id)
    .bind(&item.name)
    .bind(&item.description)
    .bind(&picture.file_name)
    .bind(&picture.content_type)
    .bind(picture.file_size)
    .bind(&picture.fingerprint)
    .fetch_one(pool)
    .await?;

    Ok(row)
}

async fn update_item(
    pool: &PgPool,
    id: Uuid,
    changes: &ItemChanges,
    picture: Option<&StoredPicture>,
) -> Result<Item, AppError> {
    let row = sqlx::query_as::<_, Item>(&format!(
        r#"
        UPDATE items SET
            name = COALESCE($2, name),
            description = COALESCE($3, description),
            picture_file_name = COALESCE($4, picture_file_name),
            picture_content_type = COALESCE($5, picture_content_type),
            picture_file_size = COALESCE($6, picture_file_size),
            picture_fingerprint = COALESCE($7, picture_fingerprint),
            picture_updated_at = CASE WHEN $4 IS NULL THEN picture_updated_at ELSE NOW() END,
            updated_at = NOW()
        WHERE id = $1
        RETURNING {}
        "#,
        ITEM_COLUMNS
    ))
    .bind(id)
    .bind(changes.name.as_deref())
    .bind(changes.description.as_deref())
    .bind(picture.map(|p| p.file_name.as_str()))
    .bind(picture.map(|p| p.content_type.as_str()))
    .bind(picture.map(|p| p.file_size))
    .bind(picture.map(|p| p.fingerprint.as_str()))
    .fetch_optional(pool)
    .await?;

    row.ok_or_else(|| AppError::NotFound(format!("Item {} not found", id)))
}
