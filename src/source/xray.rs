//! Inspection transform (`xray+<inner uri>`).
//!
//! Serves the inner source's tiles through a second code path: vector tiles
//! are decoded just far enough to read their layer table, and the summary is
//! attached as the `x-tessera-inspect` header (`name:features,...`). The data
//! itself is never re-sourced.

use std::borrow::Cow;
use std::io::Read;
use std::sync::Arc;

use async_trait::async_trait;
use flate2::read::GzDecoder;
use prost::Message;
use url::Url;

use crate::source::registry::{strip_transform, SourceFactory, SourceRegistry};
use crate::source::{SharedSource, SourceError, SourceInfo, Tile, TileCoord, TileSource};

/// Scheme prefix of the inspection transform.
pub const INSPECT_TRANSFORM: &str = "xray";

pub const INSPECT_HEADER: &str = "x-tessera-inspect";

/// The inspection URI for a source: same data, `xray+` prefix applied.
pub fn inspection_uri(uri: &Url) -> Result<Url, SourceError> {
    let derived = format!("{INSPECT_TRANSFORM}+{uri}");
    Url::parse(&derived).map_err(|e| SourceError::InvalidUri {
        uri: derived,
        reason: e.to_string(),
    })
}

#[derive(Debug)]
pub struct XraySource {
    inner: SharedSource,
}

impl XraySource {
    pub fn new(inner: SharedSource) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl TileSource for XraySource {
    async fn get_tile(&self, coord: TileCoord) -> Result<Option<Tile>, SourceError> {
        let Some(tile) = self.inner.get_tile(coord).await? else {
            return Ok(None);
        };
        if !tile.format.is_vector() {
            return Ok(Some(tile));
        }
        match summarize_layers(&tile.data) {
            Some(layers) if !layers.is_empty() => {
                let summary = format_summary(&layers);
                Ok(Some(tile.with_header(INSPECT_HEADER, summary)))
            }
            Some(_) => Ok(Some(tile)),
            None => {
                tracing::warn!(tile = %coord, "Vector tile could not be decoded for inspection");
                Ok(Some(tile))
            }
        }
    }

    async fn get_info(&self) -> Result<SourceInfo, SourceError> {
        let mut info = self.inner.get_info().await?;
        info.name = Some(match info.name.take() {
            Some(name) => format!("{name} (inspect)"),
            None => "inspect".to_string(),
        });
        Ok(info)
    }
}

pub struct XrayFactory;

#[async_trait]
impl SourceFactory for XrayFactory {
    async fn open(&self, uri: &Url, registry: &SourceRegistry) -> Result<SharedSource, SourceError> {
        let inner_uri = strip_transform(uri, INSPECT_TRANSFORM)?;
        let inner = registry.load(&inner_uri).await?;
        Ok(Arc::new(XraySource::new(inner)))
    }
}

/// Layer table of a Mapbox vector tile. Geometry, keys and values are
/// skipped by the decoder.
#[derive(Clone, PartialEq, Message)]
struct VectorTile {
    #[prost(message, repeated, tag = "3")]
    layers: Vec<VectorLayer>,
}

#[derive(Clone, PartialEq, Message)]
struct VectorLayer {
    #[prost(string, tag = "1")]
    name: String,
    #[prost(message, repeated, tag = "2")]
    features: Vec<VectorFeature>,
}

#[derive(Clone, PartialEq, Message)]
struct VectorFeature {
    #[prost(uint64, optional, tag = "1")]
    id: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayerSummary {
    pub name: String,
    pub features: usize,
}

/// Read the layer table of a (possibly gzipped) vector tile.
/// Returns `None` when the bytes are not a well-formed tile.
pub fn summarize_layers(data: &[u8]) -> Option<Vec<LayerSummary>> {
    let raw: Cow<'_, [u8]> = if data.starts_with(&[0x1F, 0x8B]) {
        let mut decoded = Vec::new();
        GzDecoder::new(data).read_to_end(&mut decoded).ok()?;
        Cow::Owned(decoded)
    } else {
        Cow::Borrowed(data)
    };

    let tile = VectorTile::decode(raw.as_ref()).ok()?;
    Some(
        tile.layers
            .into_iter()
            .map(|layer| LayerSummary {
                name: layer.name,
                features: layer.features.len(),
            })
            .collect(),
    )
}

pub fn format_summary(layers: &[LayerSummary]) -> String {
    layers
        .iter()
        .map(|l| format!("{}:{}", l.name, l.features))
        .collect::<Vec<_>>()
        .join(",")
}
