//! Derivative generation for uploaded images.
//!
//! One source image yields up to three renditions: the original (kept as
//! uploaded when the browser can display it, transcoded to JPEG
//! otherwise), a square cover-fit thumbnail and a preview bounded by its
//! longest edge. The original is mandatory; thumbnail and preview are
//! best effort and are left out when they cannot be encoded.
//!
//! Everything here is synchronous and CPU bound. Async callers go through
//! [`generate_blocking`].

use std::io::Cursor;

use bytes::Bytes;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, ImageFormat, Rgb, RgbImage};
use tracing::warn;

use crate::{Result, ShelfError};

/// Mimetypes accepted for upload.
pub const SUPPORTED_MIME_TYPES: &[&str] = &[
    "image/jpeg",
    "image/jpg",
    "image/png",
    "image/gif",
    "image/webp",
    "image/bmp",
    "image/tiff",
];

/// Formats stored as uploaded.
pub const DIRECTLY_SERVABLE: &[ImageFormat] = &[ImageFormat::Jpeg, ImageFormat::Png, ImageFormat::WebP];

/// Check a declared mimetype against the allow-list.
///
/// Parameters such as `; charset=` are ignored.
pub fn is_supported_mime(mimetype: &str) -> bool {
    let essence = mimetype.split(';').next().unwrap_or("").trim();
    SUPPORTED_MIME_TYPES
        .iter()
        .any(|m| m.eq_ignore_ascii_case(essence))
}

/// Sizes and qualities for generated renditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DerivativeConfig {
    pub thumbnail_size: u32,
    pub thumbnail_quality: u8,
    pub preview_max_edge: u32,
    pub preview_quality: u8,
    pub normalize_quality: u8,
}

impl Default for DerivativeConfig {
    fn default() -> Self {
        Self {
            thumbnail_size: 300,
            thumbnail_quality: 80,
            preview_max_edge: 1920,
            preview_quality: 85,
            normalize_quality: 90,
        }
    }
}

/// One encoded rendition ready to be stored.
#[derive(Debug, Clone)]
pub struct Rendition {
    pub data: Bytes,
    pub mimetype: &'static str,
    pub extension: &'static str,
    pub width: u32,
    pub height: u32,
}

impl Rendition {
    /// Encoded size in bytes.
    pub fn size(&self) -> i64 {
        self.data.len() as i64
    }
}

/// All renditions generated for one source image.
#[derive(Debug, Clone)]
pub struct Derivatives {
    /// Original as it will be stored.
    pub original: Rendition,
    /// The original was re-encoded because its format is not servable.
    pub transcoded: bool,
    pub thumbnail: Option<Rendition>,
    pub preview: Option<Rendition>,
}

fn format_mime(format: ImageFormat) -> (&'static str, &'static str) {
    match format {
        ImageFormat::Jpeg => ("image/jpeg", "jpg"),
        ImageFormat::Png => ("image/png", "png"),
        ImageFormat::WebP => ("image/webp", "webp"),
        _ => ("image/jpeg", "jpg"),
    }
}

/// Composite transparent pixels onto white and drop the alpha channel.
fn flatten(img: &DynamicImage) -> RgbImage {
    if !img.color().has_alpha() {
        return img.to_rgb8();
    }
    let rgba = img.to_rgba8();
    let mut out = RgbImage::new(rgba.width(), rgba.height());
    for (x, y, px) in rgba.enumerate_pixels() {
        let [r, g, b, a] = px.0;
        let a = a as u32;
        let blend = |c: u8| ((c as u32 * a + 255 * (255 - a)) / 255) as u8;
        out.put_pixel(x, y, Rgb([blend(r), blend(g), blend(b)]));
    }
    out
}

/// Encode an image as baseline JPEG.
pub fn encode_jpeg(img: &DynamicImage, quality: u8) -> Result<Rendition> {
    let rgb = DynamicImage::ImageRgb8(flatten(img));
    let mut buf = Vec::new();
    rgb.write_with_encoder(JpegEncoder::new_with_quality(&mut buf, quality))?;
    Ok(Rendition {
        data: Bytes::from(buf),
        mimetype: "image/jpeg",
        extension: "jpg",
        width: rgb.width(),
        height: rgb.height(),
    })
}

/// Square cover-fit thumbnail.
pub fn thumbnail(img: &DynamicImage, cfg: &DerivativeConfig) -> Result<Rendition> {
    let size = cfg.thumbnail_size;
    let thumb = img.resize_to_fill(size, size, FilterType::Lanczos3);
    encode_jpeg(&thumb, cfg.thumbnail_quality)
}

/// Preview bounded by `preview_max_edge`, never upscaled.
pub fn preview(img: &DynamicImage, cfg: &DerivativeConfig) -> Result<Rendition> {
    let (w, h) = img.dimensions();
    let max = cfg.preview_max_edge;
    if w.max(h) > max {
        encode_jpeg(&img.resize(max, max, FilterType::Lanczos3), cfg.preview_quality)
    } else {
        encode_jpeg(img, cfg.preview_quality)
    }
}

/// Generate every rendition for `source`.
///
/// Fails when the bytes are not a decodable image or the original cannot
/// be normalized. Thumbnail and preview failures are logged and the
/// rendition is omitted.
pub fn generate(source: &Bytes, cfg: &DerivativeConfig) -> Result<Derivatives> {
    let format = image::guess_format(source)
        .map_err(|_| ShelfError::Processing("unrecognized image data".to_string()))?;
    let img = image::load(Cursor::new(source.as_ref()), format)?;
    let (width, height) = img.dimensions();

    let (original, transcoded) = if DIRECTLY_SERVABLE.contains(&format) {
        let (mimetype, extension) = format_mime(format);
        (
            Rendition {
                data: source.clone(),
                mimetype,
                extension,
                width,
                height,
            },
            false,
        )
    } else {
        (encode_jpeg(&img, cfg.normalize_quality)?, true)
    };

    let thumbnail = thumbnail(&img, cfg)
        .map_err(|e| warn!(error = %e, "Thumbnail generation failed"))
        .ok();
    let preview = preview(&img, cfg)
        .map_err(|e| warn!(error = %e, "Preview generation failed"))
        .ok();

    Ok(Derivatives {
        original,
        transcoded,
        thumbnail,
        preview,
    })
}

/// Run [`generate`] on the blocking thread pool.
pub async fn generate_blocking(source: Bytes, cfg: DerivativeConfig) -> Result<Derivatives> {
    tokio::task::spawn_blocking(move || generate(&source, &cfg))
        .await
        .map_err(|e| ShelfError::Processing(format!("image worker failed: {e}")))?
}
