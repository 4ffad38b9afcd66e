//! Tile and TileJSON handlers for one mount.
//!
//! # Responsibilities
//! - Parse `/{z}/{x}/{y}[@{n}x].{ext}` and fetch the tile
//! - Serve `/index.json` with a `tiles` template for this host and prefix
//! - Decline (fall through) on paths that are not tile requests
//!
//! # Design Decisions
//! - The source handle is resolved per request through the registry, so
//!   the handle cache decides reuse
//! - A parsable request for a missing tile is answered with 404 and ends
//!   dispatch; only unparsable paths fall through

use std::sync::Arc;
use std::time::Instant;

use axum::extract::{Path, State};
use axum::http::header::{CONTENT_ENCODING, CONTENT_TYPE, HOST};
use axum::http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Extension, Json, Router};
use url::Url;

use crate::observability::metrics;
use crate::routing::{unmatched, MountPrefix};
use crate::source::{SourceError, SourceRegistry, Tile, TileCoord, TileFormat};

pub const TILEJSON_VERSION: &str = "2.1.0";

#[derive(Debug, Clone)]
pub struct TileState {
    uri: Arc<Url>,
    registry: Arc<SourceRegistry>,
    mount: Arc<str>,
}

impl TileState {
    pub fn new(uri: Url, registry: Arc<SourceRegistry>, mount: &str) -> Self {
        Self {
            uri: Arc::new(uri),
            registry,
            mount: Arc::from(mount),
        }
    }
}

pub fn router(state: TileState) -> Router {
    Router::new()
        .route("/index.json", get(tilejson))
        .route("/{z}/{x}/{tile}", get(tile))
        .fallback(|| async { unmatched() })
        .with_state(state)
}

/// A parsed tile path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TileRequest {
    pub z: u8,
    pub x: u32,
    pub y: u32,
    pub scale: u8,
    pub extension: String,
}

impl TileRequest {
    /// Parse the three trailing path segments. `None` if they do not look
    /// like a tile path at all.
    pub fn parse(z: &str, x: &str, tile: &str) -> Option<Self> {
        let (stem, extension) = tile.split_once('.')?;
        if extension.is_empty() {
            return None;
        }
        let (y, scale) = match stem.split_once('@') {
            Some((y, scale)) => (y, scale.strip_suffix('x')?.parse().ok()?),
            None => (stem, 1),
        };
        Some(Self {
            z: z.parse().ok()?,
            x: x.parse().ok()?,
            y: y.parse().ok()?,
            scale,
            extension: extension.to_string(),
        })
    }
}

async fn tile(State(state): State<TileState>, Path((z, x, tile)): Path<(String, String, String)>) -> Response {
    let Some(request) = TileRequest::parse(&z, &x, &tile) else {
        return unmatched();
    };

    let start = Instant::now();
    let response = match fetch(&state, &request).await {
        Ok(Some(tile)) if tile.format.accepts_extension(&request.extension) => tile_response(tile),
        Ok(_) => StatusCode::NOT_FOUND.into_response(),
        Err(SourceError::InvalidCoord(reason)) => {
            tracing::debug!(mount = %state.mount, reason = %reason, "Tile outside grid");
            StatusCode::NOT_FOUND.into_response()
        }
        Err(e) => {
            tracing::error!(mount = %state.mount, z = request.z, x = request.x, y = request.y, error = %e, "Tile fetch failed");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    };
    metrics::record_tile_request(&state.mount, response.status().as_u16(), start);
    response
}

async fn fetch(state: &TileState, request: &TileRequest) -> Result<Option<Tile>, SourceError> {
    let coord = TileCoord::with_scale(request.z, request.x, request.y, request.scale)?;
    let source = state.registry.load(&state.uri).await?;
    source.get_tile(coord).await
}

fn tile_response(tile: Tile) -> Response {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static(tile.format.content_type()));
    if let Some(encoding) = tile.content_encoding {
        headers.insert(CONTENT_ENCODING, HeaderValue::from_static(encoding));
    }
    for (name, value) in &tile.headers {
        if let (Ok(name), Ok(value)) = (HeaderName::from_bytes(name.as_bytes()), HeaderValue::from_str(value)) {
            headers.insert(name, value);
        }
    }
    (StatusCode::OK, headers, tile.data).into_response()
}

async fn tilejson(
    State(state): State<TileState>,
    prefix: Option<Extension<MountPrefix>>,
    headers: HeaderMap,
) -> Response {
    let info = match state.registry.load(&state.uri).await {
        Ok(source) => source.get_info().await,
        Err(e) => Err(e),
    };
    let info = match info {
        Ok(info) => info,
        Err(e) => {
            tracing::error!(mount = %state.mount, error = %e, "Source info failed");
            return (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response();
        }
    };

    let prefix = prefix.map(|Extension(MountPrefix(p))| p).unwrap_or_else(|| Arc::from(""));
    let format = info.format.clone().unwrap_or(TileFormat::Png);
    let template = format!("{}{prefix}/{{z}}/{{x}}/{{y}}.{}", origin(&headers), format.extension());

    let mut document = match serde_json::to_value(&info) {
        Ok(serde_json::Value::Object(map)) => map,
        _ => serde_json::Map::new(),
    };
    document.insert("tilejson".into(), TILEJSON_VERSION.into());
    document.insert("scheme".into(), "xyz".into());
    document.insert("format".into(), format.extension().into());
    document.insert("tiles".into(), vec![template].into());
    Json(serde_json::Value::Object(document)).into_response()
}

fn origin(headers: &HeaderMap) -> String {
    let scheme = headers
        .get("x-forwarded-proto")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("http");
    match headers.get(HOST).and_then(|v| v.to_str().ok()) {
        Some(host) => format!("{scheme}://{host}"),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_and_scaled_tiles() {
        assert_eq!(
            TileRequest::parse("3", "2", "1.png"),
            Some(TileRequest { z: 3, x: 2, y: 1, scale: 1, extension: "png".into() })
        );
        assert_eq!(
            TileRequest::parse("3", "2", "1@2x.png"),
            Some(TileRequest { z: 3, x: 2, y: 1, scale: 2, extension: "png".into() })
        );
    }

    #[test]
    fn rejects_non_tile_paths() {
        assert_eq!(TileRequest::parse("a", "2", "1.png"), None);
        assert_eq!(TileRequest::parse("3", "2", "1"), None);
        assert_eq!(TileRequest::parse("3", "2", "1."), None);
        assert_eq!(TileRequest::parse("3", "2", "1@2.png"), None);
        assert_eq!(TileRequest::parse("3", "2", "style.css"), None);
    }

    #[test]
    fn origin_uses_forwarded_proto() {
        let mut headers = HeaderMap::new();
        assert_eq!(origin(&headers), "");
        headers.insert(HOST, HeaderValue::from_static("tiles.example"));
        assert_eq!(origin(&headers), "http://tiles.example");
        headers.insert("x-forwarded-proto", HeaderValue::from_static("https"));
        assert_eq!(origin(&headers), "https://tiles.example");
    }
}
