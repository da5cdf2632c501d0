//! Picture attachments: file storage, resized variants and public URLs.
//!
//! Files live under the media root following the path template
//! `:id/:style/:hash.:extension`; the same pieces build the public URL
//! `/media/:id/:style/:hash.:extension`. The `:hash` segment is a keyed
//! hash of the upload's fingerprint (see [`mediadrop_crypto::style_hash`]).

pub mod geometry;
pub mod variants;

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use bytes::Bytes;
use uuid::Uuid;

pub use geometry::Geometry;
pub use variants::Variant;

/// Public URL template for stored files.
pub const DEFAULT_URL_TEMPLATE: &str = "/media/:id/:style/:hash.:extension";

/// Path template relative to the media root.
pub const DEFAULT_PATH_TEMPLATE: &str = ":id/:style/:hash.:extension";

/// URL served when an item has no picture.
pub const DEFAULT_MISSING_URL: &str = "/images/:style/missing.png";

/// Extension used when neither the file name nor the content reveal one.
const FALLBACK_EXTENSION: &str = "bin";

/// Named rendition of an attachment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Style {
    Original,
    Medium,
    Thumb,
}

impl Style {
    pub const ALL: [Style; 3] = [Style::Original, Style::Medium, Style::Thumb];

    pub fn name(&self) -> &'static str {
        match self {
            Style::Original => "original",
            Style::Medium => "medium",
            Style::Thumb => "thumb",
        }
    }

    /// Resize constraint of this style; `None` keeps the upload as-is.
    pub fn geometry(&self) -> Option<Geometry> {
        match self {
            Style::Original => None,
            Style::Medium => Some(Geometry::shrink_to_fit(300, 300)),
            Style::Thumb => Some(Geometry::shrink_to_fit(100, 100)),
        }
    }
}

impl fmt::Display for Style {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Style {
    type Err = AttachmentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Style::ALL
            .into_iter()
            .find(|style| style.name() == s)
            .ok_or_else(|| AttachmentError::UnknownStyle(s.to_string()))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AttachmentError {
    #[error("Unknown style: '{0}'")]
    UnknownStyle(String),

    #[error("Failed to process picture: {0}")]
    Processing(String),

    #[error("Failed to write '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// A picture as received from the client.
#[derive(Debug, Clone)]
pub struct PictureUpload {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Bytes,
}

impl PictureUpload {
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Attachment columns of a stored picture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredPicture {
    pub file_name: String,
    pub content_type: String,
    pub file_size: i64,
    pub fingerprint: String,
}

impl StoredPicture {
    pub fn extension(&self) -> String {
        extension_of(&self.file_name).unwrap_or_else(|| FALLBACK_EXTENSION.to_string())
    }

    /// True when both pictures resolve to the same files on disk.
    pub fn shares_files_with(&self, other: &StoredPicture) -> bool {
        self.fingerprint == other.fingerprint && self.extension() == other.extension()
    }
}

/// The values substituted into URL and path templates.
#[derive(Debug, Clone, Copy)]
pub struct Interpolation<'a> {
    pub id: Uuid,
    pub style: Style,
    pub hash: &'a str,
    pub extension: &'a str,
}

/// Replaces `:id`, `:style`, `:hash` and `:extension` in `template`.
pub fn interpolate(template: &str, values: &Interpolation<'_>) -> String {
    template
        .replace(":style", values.style.name())
        .replace(":hash", values.hash)
        .replace(":id", &values.id.to_string())
        .replace(":extension", values.extension)
}

/// Lowercased extension of a file name, without the dot.
pub fn extension_of(file_name: &str) -> Option<String> {
    Path::new(file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .filter(|ext| !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(|ext| ext.to_ascii_lowercase())
}

/// Attachment settings for one attachment kind.
#[derive(Debug, Clone)]
pub struct AttachmentConfig {
    pub url_template: String,
    pub path_template: String,
    pub default_url: String,
    pub hash_secret: String,
    pub styles: Vec<Style>,
}

impl AttachmentConfig {
    /// Settings of the item `picture` attachment.
    pub fn picture(hash_secret: impl Into<String>) -> Self {
        Self {
            url_template: DEFAULT_URL_TEMPLATE.to_string(),
            path_template: DEFAULT_PATH_TEMPLATE.to_string(),
            default_url: DEFAULT_MISSING_URL.to_string(),
            hash_secret: hash_secret.into(),
            styles: Style::ALL.to_vec(),
        }
    }
}

/// Filesystem-backed attachment storage.
#[derive(Debug, Clone)]
pub struct AttachmentStore {
    config: AttachmentConfig,
    media_root: PathBuf,
}

impl AttachmentStore {
    pub fn new(config: AttachmentConfig, media_root: impl Into<PathBuf>) -> Self {
        Self {
            config,
            media_root: media_root.into(),
        }
    }

    pub fn media_root(&self) -> &Path {
        &self.media_root
    }

    /// Hash segment for one style of a stored picture.
    pub fn hash_for(&self, picture: &StoredPicture, style: Style) -> String {
        mediadrop_crypto::style_hash(&self.config.hash_secret, style.name(), &picture.fingerprint)
    }

    /// Public URL of `style`, or the default URL when there is no picture.
    pub fn url_for(&self, id: Uuid, picture: Option<&StoredPicture>, style: Style) -> String {
        match picture {
            Some(picture) => {
                let hash = self.hash_for(picture, style);
                let extension = picture.extension();
                interpolate(
                    &self.config.url_template,
                    &Interpolation {
                        id,
                        style,
                        hash: &hash,
                        extension: &extension,
                    },
                )
            }
            None => self.config.default_url.replace(":style", style.name()),
        }
    }

    /// Filesystem path of `style` for a stored picture.
    pub fn path_for(&self, id: Uuid, picture: &StoredPicture, style: Style) -> PathBuf {
        let hash = self.hash_for(picture, style);
        let extension = picture.extension();
        let relative = interpolate(
            &self.config.path_template,
            &Interpolation {
                id,
                style,
                hash: &hash,
                extension: &extension,
            },
        );
        self.media_root.join(relative)
    }

    /// Stores the original upload and its variants for item `id`.
    ///
    /// Files already present at their content-addressed path are kept as
    /// they are. Either every style ends up on disk or the files created by
    /// this call are removed again before the error is returned.
    pub async fn store(
        &self,
        id: Uuid,
        upload: &PictureUpload,
    ) -> Result<StoredPicture, AttachmentError> {
        let fingerprint = mediadrop_crypto::fingerprint(&upload.bytes);
        let picture = StoredPicture {
            file_name: normalized_file_name(upload),
            content_type: upload.content_type.clone(),
            file_size: upload.bytes.len() as i64,
            fingerprint: fingerprint.value,
        };

        let bytes = upload.bytes.clone();
        let styles = self.config.styles.clone();
        let variants = tokio::task::spawn_blocking(move || variants::render(&bytes, &styles))
            .await
            .map_err(|e| AttachmentError::Processing(format!("Variant task failed: {}", e)))??;

        let mut created = Vec::with_capacity(variants.len());
        for variant in &variants {
            let path = self.path_for(id, &picture, variant.style);
            match write_new_file(&path, &variant.bytes).await {
                Ok(true) => created.push(path),
                Ok(false) => {
                    tracing::debug!(path = %path.display(), "Keeping existing file");
                }
                Err(e) => {
                    remove_files(&created).await;
                    return Err(e);
                }
            }
        }

        tracing::info!(
            item_id = %id,
            file_name = %picture.file_name,
            size = picture.file_size,
            styles = variants.len(),
            "Stored picture"
        );

        Ok(picture)
    }

    /// Deletes every style of a stored picture. Missing files are ignored.
    pub async fn remove(&self, id: Uuid, picture: &StoredPicture) {
        let paths: Vec<PathBuf> = self
            .config
            .styles
            .iter()
            .map(|&style| self.path_for(id, picture, style))
            .collect();
        remove_files(&paths).await;
    }
}

async fn remove_files(paths: &[PathBuf]) {
    for path in paths {
        match tokio::fs::remove_file(path).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!("Failed to remove {}: {}", path.display(), e),
        }
    }
}

/// Keeps the client's file name, appending the detected image extension
/// when the name has none.
fn normalized_file_name(upload: &PictureUpload) -> String {
    if extension_of(&upload.file_name).is_some() {
        return upload.file_name.clone();
    }
    match variants::detect_format(&upload.bytes).and_then(|f| f.extensions_str().first()) {
        Some(ext) => format!("{}.{}", upload.file_name, ext),
        None => upload.file_name.clone(),
    }
}

/// Writes `bytes` to `path` unless something is already there.
///
/// The content goes to a sibling temp file first and is renamed into place,
/// so `path` never holds a partial file. Returns whether a file was created.
async fn write_new_file(path: &Path, bytes: &[u8]) -> Result<bool, AttachmentError> {
    let io_err = |source| AttachmentError::Io {
        path: path.to_path_buf(),
        source,
    };
    if tokio::fs::try_exists(path).await.map_err(io_err)? {
        return Ok(false);
    }
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await.map_err(io_err)?;
    }

    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let temp = path.with_file_name(format!(".{}.{}.part", file_name, Uuid::new_v4()));
    if let Err(e) = tokio::fs::write(&temp, bytes).await {
        remove_files(std::slice::from_ref(&temp)).await;
        return Err(io_err(e));
    }
    if let Err(e) = tokio::fs::rename(&temp, path).await {
        remove_files(std::slice::from_ref(&temp)).await;
        return Err(io_err(e));
    }
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_id() -> Uuid {
        Uuid::parse_str("550e8400-e29b-41d4-a716-446655440000").unwrap()
    }

    fn stored(file_name: &str, content: &[u8]) -> StoredPicture {
        StoredPicture {
            file_name: file_name.to_string(),
            content_type: "image/png".to_string(),
            file_size: content.len() as i64,
            fingerprint: mediadrop_crypto::sha256_hex(content),
        }
    }

    fn upload(file_name: &str, bytes: &[u8]) -> PictureUpload {
        PictureUpload {
            file_name: file_name.to_string(),
            content_type: "application/octet-stream".to_string(),
            bytes: Bytes::copy_from_slice(bytes),
        }
    }

    #[test]
    fn test_style_round_trips_through_name() {
        for style in Style::ALL {
            assert_eq!(style.name().parse::<Style>().unwrap(), style);
        }
        assert!("large".parse::<Style>().is_err());
    }

    #[test]
    fn test_style_geometries() {
        assert_eq!(Style::Original.geometry(), None);
        assert_eq!(Style::Medium.geometry().unwrap().to_string(), "300x300>");
        assert_eq!(Style::Thumb.geometry().unwrap().to_string(), "100x100>");
    }

    #[test]
    fn test_interpolate_url_template() {
        let url = interpolate(
            DEFAULT_URL_TEMPLATE,
            &Interpolation {
                id: test_id(),
                style: Style::Thumb,
                hash: "abc",
                extension: "jpg",
            },
        );
        assert_eq!(url, "/media/550e8400-e29b-41d4-a716-446655440000/thumb/abc.jpg");
    }

    #[test]
    fn test_url_for_without_picture_uses_default() {
        let store = AttachmentStore::new(AttachmentConfig::picture("tamtam"), "/tmp/media");
        assert_eq!(
            store.url_for(test_id(), None, Style::Thumb),
            "/images/thumb/missing.png"
        );
        assert_eq!(
            store.url_for(test_id(), None, Style::Medium),
            "/images/medium/missing.png"
        );
    }

    #[test]
    fn test_url_for_with_picture_differs_from_default() {
        let store = AttachmentStore::new(AttachmentConfig::picture("tamtam"), "/tmp/media");
        let picture = stored("dora.PNG", b"content");
        for style in Style::ALL {
            let url = store.url_for(test_id(), Some(&picture), style);
            assert_ne!(url, store.url_for(test_id(), None, style));
            assert!(url.starts_with(&format!("/media/{}/{}/", test_id(), style)));
            assert!(url.ends_with(".png"));
        }
    }

    #[test]
    fn test_identical_content_gets_identical_urls() {
        let store = AttachmentStore::new(AttachmentConfig::picture("tamtam"), "/tmp/media");
        let a = stored("a.png", b"same bytes");
        let b = stored("a.png", b"same bytes");
        let c = stored("a.png", b"same bytez");
        assert_eq!(
            store.url_for(test_id(), Some(&a), Style::Medium),
            store.url_for(test_id(), Some(&b), Style::Medium)
        );
        assert_ne!(
            store.url_for(test_id(), Some(&a), Style::Medium),
            store.url_for(test_id(), Some(&c), Style::Medium)
        );
    }

    #[test]
    fn test_shares_files_with() {
        let a = stored("a.png", b"bytes");
        let renamed = stored("b.PNG", b"bytes");
        let other_ext = stored("a.jpg", b"bytes");
        assert!(a.shares_files_with(&renamed));
        assert!(!a.shares_files_with(&other_ext));
        assert!(!a.shares_files_with(&stored("a.png", b"other")));
    }

    #[test]
    fn test_extension_fallback() {
        assert_eq!(stored("notes", b"x").extension(), "bin");
        assert_eq!(stored("photo.JPeG", b"x").extension(), "jpeg");
        assert_eq!(extension_of("archive.tar.gz").as_deref(), Some("gz"));
    }

    #[tokio::test]
    async fn test_store_writes_every_style() {
        let dir = tempfile::tempdir().unwrap();
        let store = AttachmentStore::new(AttachmentConfig::picture("tamtam"), dir.path());

        let picture = store.store(test_id(), &upload("notes.txt", b"hello")).await.unwrap();
        assert_eq!(picture.file_size, 5);
        assert_eq!(picture.fingerprint, mediadrop_crypto::sha256_hex(b"hello"));

        for style in Style::ALL {
            let path = store.path_for(test_id(), &picture, style);
            assert!(path.starts_with(dir.path()));
            assert_eq!(std::fs::read(&path).unwrap(), b"hello");
        }

        store.remove(test_id(), &picture).await;
        for style in Style::ALL {
            assert!(!store.path_for(test_id(), &picture, style).exists());
        }
    }

    #[tokio::test]
    async fn test_failed_restore_keeps_existing_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = AttachmentStore::new(AttachmentConfig::picture("tamtam"), dir.path());
        let first = store.store(test_id(), &upload("notes.txt", b"hello")).await.unwrap();

        // Turn the thumb directory into a plain file so the thumb cannot be written.
        let thumb = store.path_for(test_id(), &first, Style::Thumb);
        let thumb_dir = thumb.parent().unwrap().to_path_buf();
        std::fs::remove_dir_all(&thumb_dir).unwrap();
        std::fs::write(&thumb_dir, b"in the way").unwrap();

        let second = store.store(test_id(), &upload("notes.txt", b"hello")).await;
        assert!(matches!(second, Err(AttachmentError::Io { .. })));

        for style in [Style::Original, Style::Medium] {
            let path = store.path_for(test_id(), &first, style);
            assert_eq!(std::fs::read(&path).unwrap(), b"hello");
        }
    }

    #[tokio::test]
    async fn test_failed_store_removes_only_its_own_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = AttachmentStore::new(AttachmentConfig::picture("tamtam"), dir.path());
        let picture = stored("notes.txt", b"fresh");

        let thumb_dir = store
            .path_for(test_id(), &picture, Style::Thumb)
            .parent()
            .unwrap()
            .to_path_buf();
        std::fs::create_dir_all(thumb_dir.parent().unwrap()).unwrap();
        std::fs::write(&thumb_dir, b"in the way").unwrap();

        let result = store.store(test_id(), &upload("notes.txt", b"fresh")).await;
        assert!(result.is_err());
        for style in [Style::Original, Style::Medium] {
            assert!(!store.path_for(test_id(), &picture, style).exists());
        }
    }

    #[test]
    fn test_extension_cannot_inject_placeholders() {
        let store = AttachmentStore::new(AttachmentConfig::picture("tamtam"), "/tmp/media");
        let picture = stored("x.:id", b"content");
        assert_eq!(picture.extension(), "bin");

        let url = store.url_for(test_id(), Some(&picture), Style::Thumb);
        assert!(url.ends_with(".bin"));
        assert_eq!(url.matches(&test_id().to_string()).count(), 1);

        let url = interpolate(
            DEFAULT_URL_TEMPLATE,
            &Interpolation {
                id: test_id(),
                style: Style::Thumb,
                hash: "abc",
                extension: ":id",
            },
        );
        assert!(url.ends_with("/abc.:id"));
    }

    #[test]
    fn test_normalized_file_name_appends_detected_extension() {
        let png = {
            let img = image::RgbImage::new(2, 2);
            let mut out = std::io::Cursor::new(Vec::new());
            image::DynamicImage::ImageRgb8(img)
                .write_to(&mut out, image::ImageFormat::Png)
                .unwrap();
            out.into_inner()
        };
        assert_eq!(normalized_file_name(&upload("blob", &png)), "blob.png");
        assert_eq!(normalized_file_name(&upload("pic.gif", &png)), "pic.gif");
        assert_eq!(normalized_file_name(&upload("blob", b"text")), "blob");
    }
}
