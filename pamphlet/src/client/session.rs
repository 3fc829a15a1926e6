//! A viewer's session on one page.
//!
//! Ties a page of metadata to a viewport and a [`TileLoader`]. Each
//! viewport change starts a new loader epoch, so tiles still queued for a
//! view the user already left are never fetched.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use super::error::{LoadError, LoadResult};
use super::fetcher::TileFetcher;
use super::tile_image::TileImage;
use super::loader::TileLoader;
use crate::model::{Metadata, Page, PamphletId, TileCoord, TileRef};
use crate::viewport::{
    compute_visible, prioritize, select_prefetch, select_visible, CullError, PixelRect, Priority,
    ViewportBounds,
};

/// One page being viewed.
pub struct PageView<F> {
    loader: TileLoader<F>,
    pamphlet_id: PamphletId,
    metadata: Arc<Metadata>,
    page_number: u32,
    page_index: usize,
    bounds: Option<ViewportBounds>,
}

impl<F: TileFetcher> PageView<F> {
    pub fn new(
        loader: TileLoader<F>,
        pamphlet_id: PamphletId,
        metadata: Arc<Metadata>,
        page_number: u32,
    ) -> LoadResult<Self> {
        let page_index = metadata
            .pages
            .iter()
            .position(|p| p.page_number == page_number)
            .ok_or(LoadError::PageNotFound(page_number))?;
        Ok(Self {
            loader,
            pamphlet_id,
            metadata,
            page_number,
            page_index,
            bounds: None,
        })
    }

    fn page(&self) -> &Page {
        &self.metadata.pages[self.page_index]
    }

    pub fn page_number(&self) -> u32 {
        self.page_number
    }

    pub fn bounds(&self) -> Option<ViewportBounds> {
        self.bounds
    }

    /// Move the viewport. Starts a new loader epoch.
    pub fn set_viewport(&mut self, rect: PixelRect, scale: f64) -> Result<ViewportBounds, CullError> {
        let bounds = compute_visible(rect, self.metadata.tile_size, scale)?;
        let epoch = self.loader.advance_epoch();
        debug!(page = self.page_number, epoch, ?bounds, "Viewport moved");
        self.bounds = Some(bounds);
        Ok(bounds)
    }

    /// Tiles inside the current viewport. Every tile when none is set.
    pub fn visible_tiles(&self) -> Vec<TileRef> {
        match &self.bounds {
            Some(bounds) => select_visible(&self.page().tiles, bounds),
            None => self.page().tiles.clone(),
        }
    }

    /// Tiles outside the current viewport.
    pub fn prefetch_tiles(&self) -> Vec<TileRef> {
        match &self.bounds {
            Some(bounds) => select_prefetch(&self.page().tiles, bounds),
            None => Vec::new(),
        }
    }

    /// Load every tile of the page, visible ones at high priority.
    pub async fn load(&self) -> HashMap<TileCoord, TileImage> {
        let requests = match &self.bounds {
            Some(bounds) => prioritize(&self.page().tiles, bounds),
            None => prioritize(
                &self.page().tiles,
                &ViewportBounds::new(0, u32::MAX, 0, u32::MAX),
            ),
        };
        self.loader
            .load_prioritized(&self.pamphlet_id, &requests)
            .await
    }

    /// Load only the visible tiles.
    pub async fn load_visible(&self) -> HashMap<TileCoord, TileImage> {
        let visible = self.visible_tiles();
        self.loader
            .load_tiles(&self.pamphlet_id, &visible, Priority::VISIBLE)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::fetcher::tests::MockFetcher;
    use crate::client::loader::LoaderConfig;
    use crate::model::ContentHash;

    fn metadata() -> Arc<Metadata> {
        let tiles = (0..2)
            .flat_map(|y| (0..2).map(move |x| TileRef::new(x, y, ContentHash::of(&[x as u8, y as u8]))))
            .collect();
        Arc::new(Metadata::new(
            1,
            256,
            vec![Page {
                page_number: 0,
                width: 512,
                height: 512,
                tiles,
            }],
        ))
    }

    fn view() -> PageView<MockFetcher> {
        PageView::new(
            TileLoader::new(MockFetcher::default(), LoaderConfig::default()),
            PamphletId::new("p1").unwrap(),
            metadata(),
            0,
        )
        .unwrap()
    }

    #[test]
    fn test_missing_page_rejected() {
        let result = PageView::new(
            TileLoader::new(MockFetcher::default(), LoaderConfig::default()),
            PamphletId::new("p1").unwrap(),
            metadata(),
            7,
        );
        assert!(matches!(result, Err(LoadError::PageNotFound(7))));
    }

    #[tokio::test]
    async fn test_viewport_splits_tiles() {
        let mut view = view();
        let bounds = view
            .set_viewport(PixelRect::from_size(200.0, 200.0), 1.0)
            .unwrap();

        assert_eq!(bounds, ViewportBounds::new(0, 1, 0, 1));
        assert_eq!(view.visible_tiles().len(), 1);
        assert_eq!(view.prefetch_tiles().len(), 3);
    }

    #[tokio::test]
    async fn test_each_viewport_change_advances_epoch() {
        let mut view = view();
        view.set_viewport(PixelRect::from_size(200.0, 200.0), 1.0).unwrap();
        view.set_viewport(PixelRect::new(256.0, 0.0, 200.0, 200.0), 1.0).unwrap();
        assert_eq!(view.loader.epoch(), 2);
    }

    #[tokio::test]
    async fn test_load_fetches_visible_first() {
        let mut view = view();
        view.set_viewport(PixelRect::new(256.0, 256.0, 10.0, 10.0), 1.0).unwrap();

        let images = view.load().await;
        assert_eq!(images.len(), 4);

        let calls = view.loader.fetcher().calls();
        let first_hash = ContentHash::of(&[1, 1]);
        assert!(calls[0].ends_with(first_hash.as_str()));
    }

    #[tokio::test]
    async fn test_load_visible_only() {
        let mut view = view();
        view.set_viewport(PixelRect::from_size(10.0, 10.0), 1.0).unwrap();

        let images = view.load_visible().await;
        assert_eq!(images.len(), 1);
        assert!(images.contains_key(&TileCoord::new(0, 0)));
    }

    #[test]
    fn test_invalid_scale() {
        let mut view = view();
        assert!(view.set_viewport(PixelRect::from_size(10.0, 10.0), 0.0).is_err());
        assert!(view.bounds().is_none());
    }
}
