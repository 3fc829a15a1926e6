//! Viewport culling.
//!
//! Maps the on-screen view of a page onto the tile grid and splits a page's
//! tiles into those inside the view (fetched first) and those outside it
//! (prefetched in the background).
//!
//! All functions here are pure.

use std::fmt;

use thiserror::Error;

use crate::model::{TileCoord, TileRef};

// =============================================================================
// Priority
// =============================================================================

/// Priority value for tiles inside the viewport.
pub const PRIORITY_VISIBLE: i32 = 100;

/// Priority value for tiles outside the viewport.
pub const PRIORITY_PREFETCH: i32 = 0;

/// Fetch priority of a tile. Higher values are serviced first.
///
/// # Example
///
/// ```
/// use pamphlet::viewport::Priority;
///
/// assert!(Priority::VISIBLE > Priority::PREFETCH);
/// assert!(Priority(50) > Priority::PREFETCH);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Priority(pub i32);

impl Priority {
    /// Tiles the user is looking at.
    pub const VISIBLE: Priority = Priority(PRIORITY_VISIBLE);

    /// Nearby tiles that may scroll into view.
    pub const PREFETCH: Priority = Priority(PRIORITY_PREFETCH);

    pub fn value(&self) -> i32 {
        self.0
    }
}

impl Default for Priority {
    fn default() -> Self {
        Self::PREFETCH
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::VISIBLE => write!(f, "Visible(100)"),
            Self::PREFETCH => write!(f, "Prefetch(0)"),
            Self(v) => write!(f, "Priority({})", v),
        }
    }
}

// =============================================================================
// Geometry
// =============================================================================

/// Errors raised by viewport computations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CullError {
    #[error("tile size must be greater than zero")]
    ZeroTileSize,

    #[error("scale must be a positive finite number, got {0}")]
    InvalidScale(f64),

    #[error("viewport rectangle must be finite with non-negative size")]
    InvalidRect,
}

/// A rectangle in screen pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PixelRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl PixelRect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// A rectangle anchored at the page origin.
    pub fn from_size(width: f64, height: f64) -> Self {
        Self::new(0.0, 0.0, width, height)
    }

    fn is_valid(&self) -> bool {
        [self.x, self.y, self.width, self.height]
            .iter()
            .all(|v| v.is_finite())
            && self.width >= 0.0
            && self.height >= 0.0
    }
}

/// Visible range of the tile grid. `min_*` inclusive, `max_*` exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ViewportBounds {
    pub min_x: u32,
    pub max_x: u32,
    pub min_y: u32,
    pub max_y: u32,
}

impl ViewportBounds {
    pub fn new(min_x: u32, max_x: u32, min_y: u32, max_y: u32) -> Self {
        Self {
            min_x,
            max_x,
            min_y,
            max_y,
        }
    }

    pub fn contains(&self, coord: TileCoord) -> bool {
        coord.x >= self.min_x && coord.x < self.max_x && coord.y >= self.min_y && coord.y < self.max_y
    }

    pub fn is_empty(&self) -> bool {
        self.min_x >= self.max_x || self.min_y >= self.max_y
    }
}

/// Grid index for a pixel position, clamped into `u32`.
fn grid_index(value: f64) -> u32 {
    value.clamp(0.0, u32::MAX as f64) as u32
}

/// Tile-grid bounds covering a viewport rectangle.
///
/// `rect` is in screen pixels; `scale` is screen pixels per page pixel.
/// Positions left of or above the page clamp to zero.
pub fn compute_visible(rect: PixelRect, tile_size: u32, scale: f64) -> Result<ViewportBounds, CullError> {
    if tile_size == 0 {
        return Err(CullError::ZeroTileSize);
    }
    if !scale.is_finite() || scale <= 0.0 {
        return Err(CullError::InvalidScale(scale));
    }
    if !rect.is_valid() {
        return Err(CullError::InvalidRect);
    }

    let unit = scale * f64::from(tile_size);
    Ok(ViewportBounds {
        min_x: grid_index((rect.x / unit).floor()),
        max_x: grid_index(((rect.x + rect.width) / unit).ceil()),
        min_y: grid_index((rect.y / unit).floor()),
        max_y: grid_index(((rect.y + rect.height) / unit).ceil()),
    })
}

/// Tiles inside `bounds`, in input order.
pub fn select_visible(tiles: &[TileRef], bounds: &ViewportBounds) -> Vec<TileRef> {
    tiles
        .iter()
        .filter(|t| bounds.contains(t.coord()))
        .cloned()
        .collect()
}

/// Tiles outside `bounds`, in input order.
pub fn select_prefetch(tiles: &[TileRef], bounds: &ViewportBounds) -> Vec<TileRef> {
    tiles
        .iter()
        .filter(|t| !bounds.contains(t.coord()))
        .cloned()
        .collect()
}

/// Every tile paired with its fetch priority, visible tiles first.
pub fn prioritize(tiles: &[TileRef], bounds: &ViewportBounds) -> Vec<(TileRef, Priority)> {
    let visible = select_visible(tiles, bounds)
        .into_iter()
        .map(|t| (t, Priority::VISIBLE));
    let prefetch = select_prefetch(tiles, bounds)
        .into_iter()
        .map(|t| (t, Priority::PREFETCH));
    visible.chain(prefetch).collect()
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use proptest::prelude::*;

    use super::*;
    use crate::model::ContentHash;

    fn grid(columns: u32, rows: u32) -> Vec<TileRef> {
        let mut tiles = Vec::new();
        for y in 0..rows {
            for x in 0..columns {
                tiles.push(TileRef::new(x, y, ContentHash::of(&[x as u8, y as u8])));
            }
        }
        tiles
    }

    fn coords(tiles: &[TileRef]) -> Vec<(u32, u32)> {
        tiles.iter().map(|t| (t.x, t.y)).collect()
    }

    #[test]
    fn test_two_by_two_scenario() {
        let tiles = grid(2, 2);
        let bounds = ViewportBounds::new(0, 1, 0, 1);

        assert_eq!(coords(&select_visible(&tiles, &bounds)), vec![(0, 0)]);
        assert_eq!(
            coords(&select_prefetch(&tiles, &bounds)),
            vec![(1, 0), (0, 1), (1, 1)]
        );
    }

    #[test]
    fn test_compute_visible_full_page() {
        let bounds = compute_visible(PixelRect::from_size(512.0, 512.0), 256, 1.0).unwrap();
        assert_eq!(bounds, ViewportBounds::new(0, 2, 0, 2));
    }

    #[test]
    fn test_compute_visible_partial_tile_rounds_out() {
        let bounds = compute_visible(PixelRect::new(100.0, 300.0, 200.0, 10.0), 256, 1.0).unwrap();
        assert_eq!(bounds, ViewportBounds::new(0, 2, 1, 2));
    }

    #[test]
    fn test_compute_visible_scale() {
        // Zoomed in 2x: a 512px screen covers 256 page pixels
        let zoomed = compute_visible(PixelRect::from_size(512.0, 512.0), 256, 2.0).unwrap();
        assert_eq!(zoomed, ViewportBounds::new(0, 1, 0, 1));

        // Zoomed out: 512px covers 1024 page pixels
        let wide = compute_visible(PixelRect::from_size(512.0, 512.0), 256, 0.5).unwrap();
        assert_eq!(wide, ViewportBounds::new(0, 4, 0, 4));
    }

    #[test]
    fn test_negative_origin_clamps() {
        let bounds = compute_visible(PixelRect::new(-300.0, -10.0, 400.0, 100.0), 256, 1.0).unwrap();
        assert_eq!(bounds.min_x, 0);
        assert_eq!(bounds.min_y, 0);
        assert_eq!(bounds.max_x, 1);
    }

    #[test]
    fn test_rejects_bad_inputs() {
        let rect = PixelRect::from_size(100.0, 100.0);
        assert_eq!(compute_visible(rect, 0, 1.0), Err(CullError::ZeroTileSize));
        assert_eq!(compute_visible(rect, 256, 0.0), Err(CullError::InvalidScale(0.0)));
        assert!(matches!(
            compute_visible(rect, 256, f64::NAN),
            Err(CullError::InvalidScale(_))
        ));
        assert_eq!(
            compute_visible(PixelRect::from_size(-1.0, 10.0), 256, 1.0),
            Err(CullError::InvalidRect)
        );
    }

    #[test]
    fn test_prioritize_orders_visible_first() {
        let tiles = grid(2, 2);
        let ordered = prioritize(&tiles, &ViewportBounds::new(1, 2, 1, 2));
        assert_eq!((ordered[0].0.x, ordered[0].0.y), (1, 1));
        assert_eq!(ordered[0].1, Priority::VISIBLE);
        assert!(ordered[1..].iter().all(|(_, p)| *p == Priority::PREFETCH));
    }

    #[test]
    fn test_priority_ordering() {
        assert!(Priority::VISIBLE > Priority::PREFETCH);
        assert_eq!(Priority::default(), Priority::PREFETCH);
        assert_eq!(Priority::VISIBLE.to_string(), "Visible(100)");
    }

    proptest! {
        #[test]
        fn prop_visible_and_prefetch_partition_tiles(
            columns in 0u32..8,
            rows in 0u32..8,
            min_x in 0u32..10,
            span_x in 0u32..10,
            min_y in 0u32..10,
            span_y in 0u32..10,
        ) {
            let tiles = grid(columns, rows);
            let bounds = ViewportBounds::new(min_x, min_x + span_x, min_y, min_y + span_y);

            let visible: HashSet<_> = coords(&select_visible(&tiles, &bounds)).into_iter().collect();
            let prefetch: HashSet<_> = coords(&select_prefetch(&tiles, &bounds)).into_iter().collect();
            let all: HashSet<_> = coords(&tiles).into_iter().collect();

            prop_assert!(visible.is_disjoint(&prefetch));
            let union: HashSet<_> = visible.union(&prefetch).cloned().collect();
            prop_assert_eq!(union, all);
        }

        #[test]
        fn prop_bounds_cover_rect(
            x in 0.0f64..5000.0,
            y in 0.0f64..5000.0,
            w in 1.0f64..3000.0,
            h in 1.0f64..3000.0,
            tile_size in 1u32..1024,
            scale in 0.1f64..4.0,
        ) {
            let bounds = compute_visible(PixelRect::new(x, y, w, h), tile_size, scale).unwrap();
            prop_assert!(bounds.min_x <= bounds.max_x);
            prop_assert!(bounds.min_y <= bounds.max_y);

            // The tile holding the rect origin is always visible
            let unit = scale * tile_size as f64;
            let origin = TileCoord::new((x / unit).floor() as u32, (y / unit).floor() as u32);
            prop_assert!(bounds.contains(origin));
        }
    }
}
