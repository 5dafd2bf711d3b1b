//! Content-type detection for the upload pre-step.
//!
//! Images are identified by their magic bytes; videos fall back to the
//! file extension since the tools accept only a handful of containers.

use std::path::Path;

use image::ImageFormat;
use studio_core::error::CoreError;

/// Video containers accepted by the tools, keyed by extension.
const VIDEO_TYPES: &[(&str, &str)] = &[
    ("mp4", "video/mp4"),
    ("m4v", "video/mp4"),
    ("mov", "video/quicktime"),
    ("webm", "video/webm"),
];

/// Determine the MIME type to declare for an upload.
///
/// `head` is the beginning of the file (a few dozen bytes suffice).
pub fn detect_content_type(path: &Path, head: &[u8]) -> Result<&'static str, CoreError> {
    if let Ok(format) = image::guess_format(head) {
        let mime = match format {
            ImageFormat::Png => Some("image/png"),
            ImageFormat::Jpeg => Some("image/jpeg"),
            ImageFormat::WebP => Some("image/webp"),
            ImageFormat::Gif => Some("image/gif"),
            _ => None,
        };
        if let Some(mime) = mime {
            return Ok(mime);
        }
    }

    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();

    VIDEO_TYPES
        .iter()
        .find(|(known, _)| *known == ext)
        .map(|(_, mime)| *mime)
        .ok_or_else(|| {
            CoreError::Validation(format!(
                "Unsupported file type for '{}'. Upload a PNG, JPEG, WebP, GIF, MP4, MOV, or WebM file",
                path.display()
            ))
        })
}

/// Best-effort file name to declare for an upload.
pub fn upload_filename(path: &Path) -> String {
    path.file_name()
        .and_then(|n| n.to_str())
        .filter(|n| !n.is_empty())
        .unwrap_or("upload")
        .to_string()
}
