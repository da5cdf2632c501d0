// HTTP transport for the mediadrop API
//
// One upload is one multipart POST to /upload with the fields `name`,
// `description` and `picture`.

use std::collections::BTreeMap;
use std::io::Cursor;
use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use mediadrop_crypto::ContentDigest;
use reqwest::blocking::multipart::{Form, Part};
use reqwest::blocking::{Client, Response};
use serde::Deserialize;
use uuid::Uuid;

use crate::progress::{ProgressFn, ProgressReader};

/// Payload of one upload request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadForm {
    pub name: String,
    pub description: String,
    /// Local path of the picture to send.
    pub picture: PathBuf,
    pub file_name: String,
}

/// Picture metadata returned by the server.
#[derive(Debug, Clone, Deserialize)]
pub struct PictureInfo {
    pub file_name: String,
    pub content_type: String,
    pub file_size: i64,
    pub fingerprint: ContentDigest,
}

/// An item as returned by the server.
#[derive(Debug, Clone, Deserialize)]
pub struct ItemInfo {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub picture: Option<PictureInfo>,
    #[serde(default)]
    pub urls: BTreeMap<String, String>,
    pub created_at: String,
}

/// Something that can deliver uploads to the server.
pub trait Transport: Sync {
    /// Sends one upload, reporting body progress through `on_progress`.
    fn upload(&self, form: &UploadForm, on_progress: ProgressFn) -> Result<ItemInfo>;
}

/// Blocking HTTP client for a mediadrop server.
pub struct HttpTransport {
    client: Client,
    base_url: String,
}

impl HttpTransport {
    pub fn new(base_url: &str) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("mediadrop/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// GET /items
    pub fn list_items(&self) -> Result<Vec<ItemInfo>> {
        let response = self
            .client
            .get(self.url("/items"))
            .send()
            .context("Failed to reach server")?;
        Ok(check_status(response)?.json()?)
    }

    /// GET /items/{id}
    pub fn get_item(&self, id: Uuid) -> Result<ItemInfo> {
        let response = self
            .client
            .get(self.url(&format!("/items/{}", id)))
            .send()
            .context("Failed to reach server")?;
        Ok(check_status(response)?.json()?)
    }
}

impl Transport for HttpTransport {
    fn upload(&self, form: &UploadForm, on_progress: ProgressFn) -> Result<ItemInfo> {
        let bytes = std::fs::read(&form.picture)
            .with_context(|| format!("Failed to read '{}'", form.picture.display()))?;
        let total = bytes.len() as u64;

        let picture = Part::reader_with_length(
            ProgressReader::new(Cursor::new(bytes), total, on_progress),
            total,
        )
        .file_name(form.file_name.clone());

        let multipart = Form::new()
            .text("name", form.name.clone())
            .text("description", form.description.clone())
            .part("picture", picture);

        tracing::debug!(file = %form.file_name, bytes = total, "POST /upload");
        let response = self
            .client
            .post(self.url("/upload"))
            .multipart(multipart)
            .send()
            .context("Failed to reach server")?;

        let item: ItemInfo = check_status(response)?.json()?;
        tracing::debug!(item_id = %item.id, "Upload accepted");
        Ok(item)
    }
}

/// Turns non-success responses into errors carrying the server's message.
fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().unwrap_or_default();
    let message = if body.trim().is_empty() {
        status.canonical_reason().unwrap_or("request failed").to_string()
    } else {
        body.trim().to_string()
    };
    Err(anyhow!("Server responded {}: {}", status.as_u16(), message))
}
