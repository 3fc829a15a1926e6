//! Typed HTTP client for the pamphlet API.

use std::time::Duration;

use bytes::Bytes;
use serde::de::DeserializeOwned;

use super::error::LoadError;
use super::fetcher::{build_client, get_bytes, send_bytes, DEFAULT_FETCH_TIMEOUT};
use super::tile_url;
use crate::invalidation::{DeletionReport, InvalidationResult};
use crate::model::{ContentHash, Metadata, MetadataPage, PageRange, PamphletId};

/// Client for the metadata and tile endpoints.
#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self, LoadError> {
        Self::with_timeout(base_url, DEFAULT_FETCH_TIMEOUT)
    }

    pub fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> Result<Self, LoadError> {
        Ok(Self::with_client(build_client(timeout)?, base_url))
    }

    pub fn with_client(http: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// The underlying HTTP client, for sharing with a tile fetcher.
    pub fn http(&self) -> &reqwest::Client {
        &self.http
    }

    pub fn metadata_url(&self, id: &PamphletId) -> String {
        format!("{}/pamphlet/{}/metadata", self.base_url, id)
    }

    pub fn tile_url(&self, id: &PamphletId, hash: &ContentHash) -> String {
        tile_url(&self.base_url, id, hash)
    }

    /// Fetch the full metadata document.
    pub async fn fetch_metadata(&self, id: &PamphletId) -> Result<Metadata, LoadError> {
        self.get_json(&self.metadata_url(id)).await
    }

    /// Fetch a range of pages.
    pub async fn fetch_metadata_pages(
        &self,
        id: &PamphletId,
        range: PageRange,
    ) -> Result<MetadataPage, LoadError> {
        let url = format!("{}?pages={}", self.metadata_url(id), range);
        self.get_json(&url).await
    }

    /// Fetch raw tile bytes.
    pub async fn fetch_tile(&self, id: &PamphletId, hash: &ContentHash) -> Result<Bytes, LoadError> {
        get_bytes(&self.http, &self.tile_url(id, hash)).await
    }

    /// Ask the server to bump the pamphlet's version.
    pub async fn invalidate(&self, id: &PamphletId) -> Result<InvalidationResult, LoadError> {
        let url = format!("{}/pamphlet/{}/invalidate", self.base_url, id);
        let body = send_bytes(self.http.post(&url), &url).await?;
        decode_json(&body)
    }

    /// Ask the server to delete the pamphlet.
    pub async fn delete(&self, id: &PamphletId) -> Result<DeletionReport, LoadError> {
        let url = format!("{}/pamphlet/{}", self.base_url, id);
        let body = send_bytes(self.http.delete(&url), &url).await?;
        decode_json(&body)
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, LoadError> {
        decode_json(&get_bytes(&self.http, url).await?)
    }
}

fn decode_json<T: DeserializeOwned>(body: &[u8]) -> Result<T, LoadError> {
    serde_json::from_slice(body).map_err(|e| LoadError::Decode(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_urls() {
        let client = ApiClient::new("http://localhost:8787/").unwrap();
        let id = PamphletId::new("p1").unwrap();
        let hash = ContentHash::of(b"x");

        assert_eq!(client.base_url(), "http://localhost:8787");
        assert_eq!(
            client.metadata_url(&id),
            "http://localhost:8787/pamphlet/p1/metadata"
        );
        assert_eq!(
            client.tile_url(&id, &hash),
            format!("http://localhost:8787/pamphlet/p1/tile/{}", hash)
        );
    }
}
