//! Image tiling engine.
//!
//! Turns a full page image into a grid of independently encoded,
//! content-addressed tiles. Edge tiles are cropped to the image bounds
//! rather than padded, so two pages that share a region at the same grid
//! alignment produce byte-identical tiles and the blob is stored once.

use std::io::Cursor;

use bytes::Bytes;
use image::codecs::jpeg::JpegEncoder;
use image::{imageops, RgbImage};
use thiserror::Error;

use crate::model::{ContentHash, Metadata, ModelError, Page, TileRef};

/// Default tile edge length in pixels.
pub const DEFAULT_TILE_SIZE: u32 = 256;

/// Default JPEG quality.
pub const DEFAULT_QUALITY: u8 = 80;

/// Errors raised while tiling an image.
#[derive(Debug, Error)]
pub enum TilingError {
    #[error("tile size must be greater than zero")]
    ZeroTileSize,

    #[error("quality must be between 1 and 100, got {0}")]
    InvalidQuality(u8),

    #[error("failed to decode source image: {0}")]
    Decode(String),

    #[error("failed to encode tile ({x},{y}): {reason}")]
    Encode { x: u32, y: u32, reason: String },

    #[error(transparent)]
    Document(#[from] ModelError),
}

/// One encoded tile.
#[derive(Debug, Clone)]
pub struct EncodedTile {
    pub x: u32,
    pub y: u32,
    pub hash: ContentHash,
    pub bytes: Bytes,
}

/// A page image cut into tiles.
#[derive(Debug, Clone)]
pub struct TiledImage {
    pub width: u32,
    pub height: u32,
    pub tile_size: u32,
    pub tiles: Vec<EncodedTile>,
}

impl TiledImage {
    /// The metadata page describing this image.
    pub fn to_page(&self, page_number: u32) -> Page {
        Page {
            page_number,
            width: self.width,
            height: self.height,
            tiles: self
                .tiles
                .iter()
                .map(|t| TileRef::new(t.x, t.y, t.hash.clone()))
                .collect(),
        }
    }
}

/// Image tiling collaborator.
pub trait TilingEngine: Send + Sync {
    /// Decode `image` and cut it into `tile_size` squares encoded at
    /// `quality`.
    fn tile(&self, image: &[u8], tile_size: u32, quality: u8) -> Result<TiledImage, TilingError>;

    /// Content hash of encoded tile bytes.
    fn hash(&self, bytes: &[u8]) -> ContentHash {
        ContentHash::of(bytes)
    }

    /// Render the metadata JSON document for a list of pages.
    ///
    /// The version is left at zero; the server assigns it at publish time.
    fn render_metadata_document(&self, pages: &[Page], tile_size: u32) -> Result<String, TilingError> {
        let metadata = Metadata::new(0, tile_size, pages.to_vec());
        let json = metadata.to_json()?;
        Ok(String::from_utf8_lossy(&json).into_owned())
    }
}

/// Tiling engine backed by the `image` crate, emitting JPEG tiles.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImageTiler;

impl ImageTiler {
    pub fn new() -> Self {
        Self
    }

    fn encode(tile: &RgbImage, quality: u8) -> image::ImageResult<Vec<u8>> {
        let mut buf = Cursor::new(Vec::new());
        JpegEncoder::new_with_quality(&mut buf, quality).encode_image(tile)?;
        Ok(buf.into_inner())
    }
}

impl TilingEngine for ImageTiler {
    fn tile(&self, image: &[u8], tile_size: u32, quality: u8) -> Result<TiledImage, TilingError> {
        if tile_size == 0 {
            return Err(TilingError::ZeroTileSize);
        }
        if !(1..=100).contains(&quality) {
            return Err(TilingError::InvalidQuality(quality));
        }

        let source = image::load_from_memory(image)
            .map_err(|e| TilingError::Decode(e.to_string()))?
            .to_rgb8();
        let (width, height) = source.dimensions();

        let columns = width.div_ceil(tile_size);
        let rows = height.div_ceil(tile_size);
        let mut tiles = Vec::with_capacity((columns * rows) as usize);

        for y in 0..rows {
            for x in 0..columns {
                let left = x * tile_size;
                let top = y * tile_size;
                let w = tile_size.min(width - left);
                let h = tile_size.min(height - top);

                let cropped = imageops::crop_imm(&source, left, top, w, h).to_image();
                let bytes = Self::encode(&cropped, quality).map_err(|e| TilingError::Encode {
                    x,
                    y,
                    reason: e.to_string(),
                })?;

                tiles.push(EncodedTile {
                    x,
                    y,
                    hash: self.hash(&bytes),
                    bytes: Bytes::from(bytes),
                });
            }
        }

        Ok(TiledImage {
            width,
            height,
            tile_size,
            tiles,
        })
    }
}
