//! Tile fetch abstraction for testability.

use std::time::Duration;

use bytes::Bytes;
use reqwest::StatusCode;

use super::error::LoadError;
use super::tile_image::TileImage;
use crate::cache::BoxFuture;

/// Default request timeout for tile fetches.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Fetches and decodes one tile.
///
/// The loader owns scheduling; implementations only perform the request.
pub trait TileFetcher: Send + Sync + 'static {
    fn fetch(&self, url: &str) -> BoxFuture<'_, Result<TileImage, LoadError>>;
}

/// Perform a GET and return the body, mapping status codes onto
/// [`LoadError`].
pub(crate) async fn get_bytes(client: &reqwest::Client, url: &str) -> Result<Bytes, LoadError> {
    send_bytes(client.get(url), url).await
}

/// Send a prepared request and return the body.
pub(crate) async fn send_bytes(
    request: reqwest::RequestBuilder,
    url: &str,
) -> Result<Bytes, LoadError> {
    let response = request.send().await.map_err(|e| LoadError::Transport {
        url: url.to_string(),
        reason: e.to_string(),
    })?;

    let status = response.status();
    if status == StatusCode::NOT_FOUND {
        return Err(LoadError::NotFound(url.to_string()));
    }
    if !status.is_success() {
        return Err(LoadError::Http {
            url: url.to_string(),
            status: status.as_u16(),
        });
    }

    response.bytes().await.map_err(|e| LoadError::Transport {
        url: url.to_string(),
        reason: e.to_string(),
    })
}

pub(crate) fn build_client(timeout: Duration) -> Result<reqwest::Client, LoadError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| LoadError::Transport {
            url: String::new(),
            reason: format!("failed to create HTTP client: {}", e),
        })
}

/// Tile fetcher using reqwest. Decoding runs on the blocking pool.
#[derive(Clone)]
pub struct HttpTileFetcher {
    client: reqwest::Client,
}

impl HttpTileFetcher {
    pub fn new() -> Result<Self, LoadError> {
        Self::with_timeout(DEFAULT_FETCH_TIMEOUT)
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self, LoadError> {
        Ok(Self {
            client: build_client(timeout)?,
        })
    }

    /// Share an existing client.
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl TileFetcher for HttpTileFetcher {
    fn fetch(&self, url: &str) -> BoxFuture<'_, Result<TileImage, LoadError>> {
        let url = url.to_string();
        Box::pin(async move {
            let bytes = get_bytes(&self.client, &url).await?;
            tokio::task::spawn_blocking(move || TileImage::decode(bytes))
                .await
                .map_err(|e| LoadError::Decode(e.to_string()))?
        })
    }
}
