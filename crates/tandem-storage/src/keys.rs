//! Blob id generation shared by all backends.
//!
//! Ids are flat: `{uuid}.{extension}`, with the extension derived from the
//! content type so the local backend can serve files with a sensible suffix.

use uuid::Uuid;

pub fn extension_for(content_type: &str) -> &'static str {
    let essence = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_lowercase();
    match essence.as_str() {
        "video/mp4" => "mp4",
        "video/webm" => "webm",
        "image/webp" => "webp",
        "image/jpeg" | "image/jpg" => "jpeg",
        "image/png" => "png",
        _ => "bin",
    }
}

pub fn generate_blob_id(content_type: &str) -> String {
    format!("{}.{}", Uuid::new_v4().simple(), extension_for(content_type))
}

/// Ids never contain path separators or parent references.
pub fn validate_blob_id(id: &str) -> bool {
    !id.is_empty()
        && !id.contains("..")
        && !id.contains('/')
        && !id.contains('\\')
        && !id.starts_with('.')
}
