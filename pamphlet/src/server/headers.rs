//! Response header policy.

use std::time::Duration;

use axum::http::HeaderName;

/// Cache status header (`HIT` / `MISS`).
pub static X_CACHE: HeaderName = HeaderName::from_static("x-cache");

/// Tiles are content addressed and never change.
pub const TILE_CACHE_CONTROL: &str = "public, max-age=31536000, immutable";

/// Default metadata freshness window.
pub const DEFAULT_METADATA_MAX_AGE: Duration = Duration::from_secs(60);

/// Short-lived, revalidate-friendly cache policy for metadata.
pub fn metadata_cache_control(max_age: Duration) -> String {
    format!("public, max-age={}, must-revalidate", max_age.as_secs())
}

/// Entity tag for a metadata version.
pub fn metadata_etag(version: u64) -> String {
    format!("\"v{}\"", version)
}

/// MIME type for a tile body, sniffed from its magic bytes.
pub fn tile_content_type(body: &[u8]) -> &'static str {
    image::guess_format(body)
        .map(|format| format.to_mime_type())
        .unwrap_or("application/octet-stream")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metadata_cache_control() {
        assert_eq!(
            metadata_cache_control(Duration::from_secs(30)),
            "public, max-age=30, must-revalidate"
        );
    }

    #[test]
    fn test_tile_content_type() {
        assert_eq!(tile_content_type(&[0xFF, 0xD8, 0xFF, 0xE0, 0, 0]), "image/jpeg");
        assert_eq!(
            tile_content_type(b"\x89PNG\r\n\x1a\n\0\0\0\0"),
            "image/png"
        );
        assert_eq!(tile_content_type(b"plain"), "application/octet-stream");
    }

    #[test]
    fn test_etag_changes_with_version() {
        assert_ne!(metadata_etag(1), metadata_etag(2));
        assert_eq!(metadata_etag(7), "\"v7\"");
    }
}
