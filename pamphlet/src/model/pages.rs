//! Paged views of a metadata document.
//!
//! Long pamphlets can be fetched a slice at a time with `?pages=A-B`
//! (inclusive, zero-based) or `?pages=N`. The response keeps the metadata
//! shape and adds navigation hints.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::error::ModelError;
use super::types::{Metadata, Page};

/// An inclusive range of page indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRange {
    pub start: usize,
    pub end: usize,
}

impl PageRange {
    pub fn new(start: usize, end: usize) -> Result<Self, ModelError> {
        if start > end {
            return Err(ModelError::InvalidPageRange(format!("{}-{}", start, end)));
        }
        Ok(Self { start, end })
    }

    /// Range covering a single page.
    pub fn single(index: usize) -> Self {
        Self {
            start: index,
            end: index,
        }
    }
}

impl FromStr for PageRange {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ModelError::InvalidPageRange(s.to_string());
        let parse = |part: &str| part.trim().parse::<usize>().map_err(|_| invalid());

        match s.split_once('-') {
            Some((start, end)) => Self::new(parse(start)?, parse(end)?).map_err(|_| invalid()),
            None => Ok(Self::single(parse(s)?)),
        }
    }
}

impl fmt::Display for PageRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.start == self.end {
            write!(f, "{}", self.start)
        } else {
            write!(f, "{}-{}", self.start, self.end)
        }
    }
}

/// A slice of a metadata document plus navigation hints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataPage {
    pub version: u64,
    pub tile_size: u32,
    pub pages: Vec<Page>,
    pub total_pages: usize,
    pub has_more: bool,
    pub has_previous: bool,
}

impl MetadataPage {
    /// Cut the requested range out of a full document.
    ///
    /// The end of the range is clamped to the last page. A range that starts
    /// past the end yields no pages.
    pub fn slice(metadata: &Metadata, range: PageRange) -> Self {
        let total_pages = metadata.pages.len();
        let start = range.start.min(total_pages);
        let end = range.end.saturating_add(1).min(total_pages);
        let pages = if start < end {
            metadata.pages[start..end].to_vec()
        } else {
            Vec::new()
        };

        Self {
            version: metadata.version,
            tile_size: metadata.tile_size,
            pages,
            total_pages,
            has_more: end < total_pages,
            has_previous: start > 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metadata(pages: u32) -> Metadata {
        Metadata::new(
            3,
            256,
            (0..pages)
                .map(|n| Page {
                    page_number: n,
                    width: 256,
                    height: 256,
                    tiles: vec![],
                })
                .collect(),
        )
    }

    #[test]
    fn test_parse_single() {
        assert_eq!("4".parse::<PageRange>().unwrap(), PageRange::single(4));
    }

    #[test]
    fn test_parse_range() {
        assert_eq!(
            "2-5".parse::<PageRange>().unwrap(),
            PageRange { start: 2, end: 5 }
        );
        assert_eq!("2-5".parse::<PageRange>().unwrap().to_string(), "2-5");
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!("".parse::<PageRange>().is_err());
        assert!("a-b".parse::<PageRange>().is_err());
        assert!("5-2".parse::<PageRange>().is_err());
        assert!("-3".parse::<PageRange>().is_err());
    }

    #[test]
    fn test_slice_middle() {
        let page = MetadataPage::slice(&metadata(10), PageRange::new(2, 4).unwrap());
        assert_eq!(page.pages.len(), 3);
        assert_eq!(page.pages[0].page_number, 2);
        assert_eq!(page.total_pages, 10);
        assert!(page.has_more);
        assert!(page.has_previous);
        assert_eq!(page.version, 3);
    }

    #[test]
    fn test_slice_clamps_end() {
        let page = MetadataPage::slice(&metadata(3), PageRange::new(0, 99).unwrap());
        assert_eq!(page.pages.len(), 3);
        assert!(!page.has_more);
        assert!(!page.has_previous);
    }

    #[test]
    fn test_slice_past_end_is_empty() {
        let page = MetadataPage::slice(&metadata(3), PageRange::single(7));
        assert!(page.pages.is_empty());
        assert!(!page.has_more);
        assert!(page.has_previous);
    }
}
