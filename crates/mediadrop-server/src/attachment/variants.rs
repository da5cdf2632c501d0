//! Variant generation for uploaded pictures.

use std::io::Cursor;

use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, ImageFormat};

use super::{AttachmentError, Style};

/// One rendered file of an attachment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Variant {
    pub style: Style,
    pub bytes: Vec<u8>,
}

/// Detects the image format of `bytes`, if they look like an image.
pub fn detect_format(bytes: &[u8]) -> Option<ImageFormat> {
    image::guess_format(bytes).ok()
}

/// Renders the original and every resized style of an upload.
///
/// Content that cannot be decoded as an image is accepted as-is: each
/// variant is a copy of the original bytes. The same holds for a style
/// whose format can be decoded but not encoded again. Variants that
/// already fit their geometry are stored unchanged.
pub fn render(bytes: &[u8], styles: &[Style]) -> Result<Vec<Variant>, AttachmentError> {
    let decoded = detect_format(bytes)
        .and_then(|format| image::load_from_memory_with_format(bytes, format).ok().map(|img| (img, format)));

    let (img, format) = match decoded {
        Some(decoded) => decoded,
        None => {
            tracing::debug!("Upload is not a decodable image, storing copies of the original");
            return Ok(styles
                .iter()
                .map(|&style| Variant {
                    style,
                    bytes: bytes.to_vec(),
                })
                .collect());
        }
    };

    let (width, height) = img.dimensions();
    let mut variants = Vec::with_capacity(styles.len());

    for &style in styles {
        let target = match style.geometry() {
            Some(geometry) => geometry.fit(width, height),
            None => (width, height),
        };

        let bytes = if target == (width, height) {
            bytes.to_vec()
        } else {
            tracing::debug!(
                style = style.name(),
                from = ?(width, height),
                to = ?target,
                "Resizing picture"
            );
            let resized = img.resize_exact(target.0, target.1, FilterType::Lanczos3);
            encode_or_copy(&resized, format, bytes)
        };

        variants.push(Variant { style, bytes });
    }

    Ok(variants)
}

/// Encodes `img`, or falls back to `original` when `format` has no encoder.
fn encode_or_copy(img: &DynamicImage, format: ImageFormat, original: &[u8]) -> Vec<u8> {
    match encode(img, format) {
        Ok(encoded) => encoded,
        Err(e) => {
            tracing::debug!("{}, storing a copy of the original", e);
            original.to_vec()
        }
    }
}

fn encode(img: &DynamicImage, format: ImageFormat) -> Result<Vec<u8>, AttachmentError> {
    let mut out = Cursor::new(Vec::new());
    let result = match format {
        // JPEG has no alpha channel.
        ImageFormat::Jpeg => DynamicImage::ImageRgb8(img.to_rgb8()).write_to(&mut out, format),
        _ => img.write_to(&mut out, format),
    };
    result.map_err(|e| AttachmentError::Processing(format!("Failed to encode {:?}: {}", format, e)))?;
    Ok(out.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = RgbImage::from_pixel(width, height, Rgb([200, 10, 10]));
        let mut out = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(img)
            .write_to(&mut out, ImageFormat::Png)
            .unwrap();
        out.into_inner()
    }

    fn variant<'a>(variants: &'a [Variant], style: Style) -> &'a Variant {
        variants.iter().find(|v| v.style == style).unwrap()
    }

    #[test]
    fn test_large_image_is_shrunk_preserving_aspect_ratio() {
        let original = png_bytes(600, 400);
        let variants = render(&original, &Style::ALL).unwrap();

        let medium = image::load_from_memory(&variant(&variants, Style::Medium).bytes).unwrap();
        assert_eq!(medium.dimensions(), (300, 200));

        let thumb = image::load_from_memory(&variant(&variants, Style::Thumb).bytes).unwrap();
        assert_eq!(thumb.dimensions(), (100, 67));

        assert_eq!(variant(&variants, Style::Original).bytes, original);
    }

    #[test]
    fn test_small_image_is_not_upscaled() {
        let original = png_bytes(80, 60);
        let variants = render(&original, &Style::ALL).unwrap();

        for v in &variants {
            assert_eq!(v.bytes, original, "style {:?} should be unchanged", v.style);
        }
    }

    #[test]
    fn test_between_thumb_and_medium() {
        let original = png_bytes(200, 150);
        let variants = render(&original, &Style::ALL).unwrap();

        assert_eq!(variant(&variants, Style::Medium).bytes, original);
        let thumb = image::load_from_memory(&variant(&variants, Style::Thumb).bytes).unwrap();
        assert_eq!(thumb.dimensions(), (100, 75));
    }

    #[test]
    fn test_non_image_is_copied() {
        let original = b"%PDF-1.4 not an image".to_vec();
        let variants = render(&original, &Style::ALL).unwrap();

        assert_eq!(variants.len(), 3);
        assert!(variants.iter().all(|v| v.bytes == original));
    }

    #[test]
    fn test_format_without_encoder_falls_back_to_original() {
        let img = DynamicImage::ImageRgb8(RgbImage::new(4, 4));
        let original = b"decodable but not encodable".to_vec();

        assert!(encode(&img, ImageFormat::Dds).is_err());
        assert_eq!(encode_or_copy(&img, ImageFormat::Dds, &original), original);

        let png = encode_or_copy(&img, ImageFormat::Png, &original);
        assert_eq!(detect_format(&png), Some(ImageFormat::Png));
    }

    #[test]
    fn test_detect_format() {
        assert_eq!(detect_format(&png_bytes(2, 2)), Some(ImageFormat::Png));
        assert_eq!(detect_format(b"plain text"), None);
    }
}
