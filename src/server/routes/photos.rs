//! `GET /photos/places/:placeId/photos/:photoId?maxWidthPx=N` (spec §4.7).
//! The upstream credential is injected server-side and never echoed back.

use axum::body::Body;
use axum::extract::{Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use lazy_static::lazy_static;
use regex::Regex;
use serde::Deserialize;

use crate::server::app::AppState;

lazy_static! {
    static ref PHOTO_ID_RE: Regex = Regex::new(r"^[A-Za-z0-9_-]+$").unwrap();
}

const MIN_WIDTH_PX: u32 = 100;
const MAX_WIDTH_PX: u32 = 1600;

#[derive(Debug, Deserialize)]
pub struct PhotoQuery {
    #[serde(rename = "maxWidthPx")]
    max_width_px: Option<u32>,
}

fn clamp_width(requested: Option<u32>) -> u32 {
    requested.unwrap_or(MAX_WIDTH_PX).clamp(MIN_WIDTH_PX, MAX_WIDTH_PX)
}

pub async fn get_photo(
    State(state): State<AppState>,
    Path((place_id, photo_id)): Path<(String, String)>,
    Query(query): Query<PhotoQuery>,
) -> Result<Response, StatusCode> {
    if !PHOTO_ID_RE.is_match(&place_id) || !PHOTO_ID_RE.is_match(&photo_id) {
        return Err(StatusCode::NOT_FOUND);
    }

    if state.config.places_api_key.is_empty() {
        return Err(StatusCode::SERVICE_UNAVAILABLE);
    }

    let width = clamp_width(query.max_width_px);
    let photo_reference = format!("places/{place_id}/photos/{photo_id}");
    let upstream_url = format!(
        "https://places.googleapis.com/v1/{photo_reference}/media?maxWidthPx={width}&key={}",
        state.config.places_api_key
    );

    let response = state
        .http_client
        .get(&upstream_url)
        .send()
        .await
        .map_err(|_| StatusCode::SERVICE_UNAVAILABLE)?;

    let status = response.status();
    if status == StatusCode::NOT_FOUND {
        return Err(StatusCode::NOT_FOUND);
    }
    if status.is_server_error() {
        return Err(StatusCode::BAD_GATEWAY);
    }
    if !status.is_success() {
        return Err(StatusCode::BAD_GATEWAY);
    }

    let content_type = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string();
    if !content_type.starts_with("image/") {
        return Err(StatusCode::BAD_GATEWAY);
    }

    let bytes = response.bytes().await.map_err(|_| StatusCode::BAD_GATEWAY)?;

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, content_type),
            (header::CACHE_CONTROL, "public, max-age=86400, immutable".to_string()),
            (
                header::HeaderName::from_static("cross-origin-resource-policy"),
                "cross-origin".to_string(),
            ),
        ],
        Body::from(bytes),
    )
        .into_response())
}
