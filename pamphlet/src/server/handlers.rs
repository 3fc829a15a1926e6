//! Request handlers.

use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, instrument};

use super::error::ApiError;
use super::headers::{
    metadata_cache_control, metadata_etag, tile_content_type, TILE_CACHE_CONTROL, X_CACHE,
};
use super::state::AppState;
use crate::invalidation::{DeletionReport, InvalidationResult};
use crate::model::{ContentHash, MetadataPage, PageRange, PamphletId};

#[derive(Debug, Deserialize)]
pub struct MetadataQuery {
    pages: Option<String>,
}

fn parse_id(raw: &str) -> Result<PamphletId, ApiError> {
    PamphletId::new(raw).map_err(|_| ApiError::BadRequest(format!("Invalid pamphlet id '{}'", raw)))
}

/// `GET /`
pub async fn health() -> Json<serde_json::Value> {
    Json(json!({
        "name": "pamphlet",
        "version": crate::VERSION,
        "status": "ok",
    }))
}

/// `GET /pamphlet/:id/tile/:hash`
#[instrument(skip(state))]
pub async fn get_tile(
    State(state): State<AppState>,
    Path((id, hash)): Path<(String, String)>,
) -> Result<Response, ApiError> {
    let id = parse_id(&id)?;
    // No stored tile can have a malformed hash
    let hash = ContentHash::parse(&hash)
        .map_err(|_| ApiError::NotFound("Tile not found".to_string()))?;

    let tile = state.gateway.get_current_tile(&id, &hash).await?;
    debug!(status = %tile.status, version = tile.version, "Serving tile");

    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static(tile_content_type(&tile.body)),
    );
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static(TILE_CACHE_CONTROL));
    headers.insert(X_CACHE.clone(), HeaderValue::from_static(tile.status.as_str()));

    Ok((headers, tile.body).into_response())
}

/// `GET /pamphlet/:id/metadata[?pages=N|A-B]`
#[instrument(skip(state, request_headers))]
pub async fn get_metadata(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<MetadataQuery>,
    request_headers: HeaderMap,
) -> Result<Response, ApiError> {
    let id = parse_id(&id)?;
    let range = query
        .pages
        .as_deref()
        .map(str::parse::<PageRange>)
        .transpose()?;

    let response = state.gateway.get_metadata(&id).await?;
    let etag = metadata_etag(response.metadata.version);

    let mut headers = HeaderMap::new();
    headers.insert(
        header::CACHE_CONTROL,
        header_value(&metadata_cache_control(state.metadata_max_age))?,
    );
    headers.insert(header::ETAG, header_value(&etag)?);
    headers.insert(X_CACHE.clone(), HeaderValue::from_static(response.status.as_str()));

    let not_modified = request_headers
        .get(header::IF_NONE_MATCH)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.split(',').any(|tag| tag.trim() == etag));
    if not_modified {
        return Ok((StatusCode::NOT_MODIFIED, headers).into_response());
    }

    match range {
        Some(range) => {
            let page = MetadataPage::slice(&response.metadata, range);
            Ok((headers, Json(page)).into_response())
        }
        None => {
            headers.insert(
                header::CONTENT_TYPE,
                HeaderValue::from_static("application/json"),
            );
            Ok((headers, response.body).into_response())
        }
    }
}

fn header_value(value: &str) -> Result<HeaderValue, ApiError> {
    HeaderValue::from_str(value).map_err(|e| ApiError::Internal(e.to_string()))
}

/// `POST /pamphlet/:id/invalidate`
#[instrument(skip(state))]
pub async fn invalidate(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<InvalidationResult>, ApiError> {
    let id = parse_id(&id)?;
    Ok(Json(state.coordinator.invalidate(&id).await?))
}

/// `DELETE /pamphlet/:id`
#[instrument(skip(state))]
pub async fn delete_pamphlet(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<DeletionReport>, ApiError> {
    let id = parse_id(&id)?;
    Ok(Json(state.coordinator.delete_pamphlet(&id).await?))
}

/// Fallback for unknown routes.
pub async fn not_found() -> ApiError {
    ApiError::NotFound("Not found".to_string())
}
