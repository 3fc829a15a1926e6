//! Decoded tile images.

use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use image::RgbaImage;

use super::error::LoadError;

/// A fetched tile: the encoded bytes plus the decoded RGBA pixels.
///
/// Cheap to clone; both halves are reference counted.
#[derive(Clone)]
pub struct TileImage {
    bytes: Bytes,
    pixels: Arc<RgbaImage>,
}

impl TileImage {
    /// Decode an encoded tile.
    pub fn decode(bytes: Bytes) -> Result<Self, LoadError> {
        let pixels = image::load_from_memory(&bytes)
            .map_err(|e| LoadError::Decode(e.to_string()))?
            .to_rgba8();
        Ok(Self {
            bytes,
            pixels: Arc::new(pixels),
        })
    }

    /// Build from already-decoded parts.
    pub fn from_parts(bytes: Bytes, pixels: RgbaImage) -> Self {
        Self {
            bytes,
            pixels: Arc::new(pixels),
        }
    }

    pub fn bytes(&self) -> &Bytes {
        &self.bytes
    }

    pub fn pixels(&self) -> &RgbaImage {
        &self.pixels
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }
}

impl fmt::Debug for TileImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TileImage")
            .field("bytes", &self.bytes.len())
            .field("width", &self.width())
            .field("height", &self.height())
            .finish()
    }
}
