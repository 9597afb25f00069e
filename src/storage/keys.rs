//! Key layout for stored renditions.
//!
//! Every rendition of an image lives under its folder's prefix:
//! `{folder_id}/{stem}-{uuid}.{ext}` for the original and
//! `{folder_id}/thumb-…` / `{folder_id}/preview-…` for derivatives.

use uuid::Uuid;

use crate::{Result, ShelfError};

const MAX_STEM_LEN: usize = 64;

/// Prefix shared by all renditions of a folder.
pub fn folder_prefix(folder_id: i64) -> String {
    folder_id.to_string()
}

/// Reduce a client filename to a safe key stem.
///
/// Drops any directory part and the extension, replaces everything outside
/// `[A-Za-z0-9_-]` with `_` and caps the length.
pub fn sanitize_stem(filename: &str) -> String {
    let base = filename.rsplit(['/', '\\']).next().unwrap_or(filename);
    let stem = match base.rfind('.') {
        Some(idx) if idx > 0 => &base[..idx],
        _ => base,
    };

    let cleaned: String = stem
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .take(MAX_STEM_LEN)
        .collect();

    if cleaned.trim_matches('_').is_empty() {
        "image".to_string()
    } else {
        cleaned
    }
}

/// Reject keys that could escape the storage root.
pub fn validate_key(key: &str) -> Result<()> {
    let bad = key.is_empty()
        || key.starts_with('/')
        || key.contains('\\')
        || key.contains('\0')
        || key.split('/').any(|seg| seg.is_empty() || seg == "." || seg == "..");
    if bad {
        return Err(ShelfError::Storage(format!("invalid storage key: {key:?}")));
    }
    Ok(())
}

/// Keys for the three renditions of one upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenditionKeys {
    pub original: String,
    pub thumbnail: String,
    pub preview: String,
}

impl RenditionKeys {
    /// Generate fresh keys for a file uploaded into `folder_id`.
    ///
    /// `original_ext` is the extension of the stored original, which may
    /// differ from the client filename when the image was transcoded.
    pub fn generate(folder_id: i64, filename: &str, original_ext: &str) -> Self {
        let prefix = folder_prefix(folder_id);
        let base = format!("{}-{}", sanitize_stem(filename), Uuid::new_v4().simple());
        Self {
            original: format!("{prefix}/{base}.{original_ext}"),
            thumbnail: format!("{prefix}/thumb-{base}.jpg"),
            preview: format!("{prefix}/preview-{base}.jpg"),
        }
    }
}
