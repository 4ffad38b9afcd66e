//! Tile source subsystem.
//!
//! # Data Flow
//! ```text
//! SourceSpec (URI or locator)
//!     → registry.rs (scheme lookup, handle cache)
//!     → factory opens Arc<dyn TileSource>
//!     → cache.rs wraps it with the shared tile cache
//!     → tile handlers call get_tile / get_info
//! ```
//!
//! # Design Decisions
//! - Sources are read-only once opened and shared via Arc
//! - Transforms (`xray+...`) wrap an inner source instead of opening a new data source
//! - A missing tile is `Ok(None)`, not an error

pub mod cache;
pub mod file;
pub mod registry;
pub mod xray;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Bytes;
use serde::{Deserialize, Serialize};

pub use registry::{SourceFactory, SourceRegistry};

/// Errors raised while opening or reading a tile source.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("no source registered for scheme '{0}'")]
    UnsupportedScheme(String),

    #[error("invalid source uri '{uri}': {reason}")]
    InvalidUri { uri: String, reason: String },

    #[error("tile coordinate out of range: {0}")]
    InvalidCoord(String),

    #[error("tile format could not be determined for {0}")]
    UnknownFormat(String),

    #[error("source metadata is invalid: {0}")]
    Metadata(#[from] serde_json::Error),

    #[error("source I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("source backend failed: {0}")]
    Backend(String),
}

/// A tile address. `scale` is the retina multiplier (`@2x` → 2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TileCoord {
    pub z: u8,
    pub x: u32,
    pub y: u32,
    pub scale: u8,
}

impl TileCoord {
    pub const MAX_ZOOM: u8 = 30;

    pub fn new(z: u8, x: u32, y: u32) -> Result<Self, SourceError> {
        Self::with_scale(z, x, y, 1)
    }

    /// Build a coordinate, rejecting x/y outside the `2^z` grid.
    pub fn with_scale(z: u8, x: u32, y: u32, scale: u8) -> Result<Self, SourceError> {
        let coord = Self { z, x, y, scale };
        if z > Self::MAX_ZOOM || scale == 0 {
            return Err(SourceError::InvalidCoord(coord.to_string()));
        }
        let dim = 1u64 << z;
        if u64::from(x) >= dim || u64::from(y) >= dim {
            return Err(SourceError::InvalidCoord(coord.to_string()));
        }
        Ok(coord)
    }
}

impl fmt::Display for TileCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.z, self.x, self.y)?;
        if self.scale > 1 {
            write!(f, "@{}x", self.scale)?;
        }
        Ok(())
    }
}

/// Native encoding of a source's tiles.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TileFormat {
    Png,
    Jpg,
    Webp,
    /// Mapbox vector tile (protobuf).
    Pbf,
    Other(String),
}

impl TileFormat {
    pub fn from_extension(ext: &str) -> Self {
        match ext.to_ascii_lowercase().as_str() {
            "png" => TileFormat::Png,
            "jpg" | "jpeg" => TileFormat::Jpg,
            "webp" => TileFormat::Webp,
            "pbf" | "mvt" => TileFormat::Pbf,
            other => TileFormat::Other(other.to_string()),
        }
    }

    pub fn extension(&self) -> &str {
        match self {
            TileFormat::Png => "png",
            TileFormat::Jpg => "jpg",
            TileFormat::Webp => "webp",
            TileFormat::Pbf => "pbf",
            TileFormat::Other(ext) => ext,
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            TileFormat::Png => "image/png",
            TileFormat::Jpg => "image/jpeg",
            TileFormat::Webp => "image/webp",
            TileFormat::Pbf => "application/x-protobuf",
            TileFormat::Other(_) => "application/octet-stream",
        }
    }

    pub fn is_vector(&self) -> bool {
        matches!(self, TileFormat::Pbf)
    }

    /// Whether a request extension (`png`, `jpeg`, `mvt`...) names this format.
    pub fn accepts_extension(&self, ext: &str) -> bool {
        TileFormat::from_extension(ext) == *self
    }

    /// Guess the format from leading magic bytes. Gzip payloads are assumed
    /// to be compressed vector tiles.
    pub fn sniff(data: &[u8]) -> Option<Self> {
        match data {
            [0x89, b'P', b'N', b'G', ..] => Some(TileFormat::Png),
            [0xFF, 0xD8, 0xFF, ..] => Some(TileFormat::Jpg),
            [b'R', b'I', b'F', b'F', _, _, _, _, b'W', b'E', b'B', b'P', ..] => Some(TileFormat::Webp),
            [0x1F, 0x8B, ..] => Some(TileFormat::Pbf),
            _ => None,
        }
    }
}

impl From<String> for TileFormat {
    fn from(value: String) -> Self {
        TileFormat::from_extension(&value)
    }
}

impl From<TileFormat> for String {
    fn from(value: TileFormat) -> Self {
        value.extension().to_string()
    }
}

impl fmt::Display for TileFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// Encoded tile bytes plus the headers needed to serve them.
#[derive(Debug, Clone)]
pub struct Tile {
    pub data: Bytes,
    pub format: TileFormat,
    pub content_encoding: Option<&'static str>,
    pub headers: Vec<(&'static str, String)>,
}

impl Tile {
    pub fn new(data: impl Into<Bytes>, format: TileFormat) -> Self {
        let data = data.into();
        let content_encoding = data.starts_with(&[0x1F, 0x8B]).then_some("gzip");
        Self {
            data,
            format,
            content_encoding,
            headers: Vec::new(),
        }
    }

    pub fn with_header(mut self, name: &'static str, value: impl Into<String>) -> Self {
        self.headers.push((name, value.into()));
        self
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// TileJSON-shaped source metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceInfo {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attribution: Option<String>,
    /// `None` until the backend has reported its format.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<TileFormat>,
    pub minzoom: u8,
    pub maxzoom: u8,
    pub bounds: [f64; 4],
    #[serde(skip_serializing_if = "Option::is_none")]
    pub center: Option<[f64; 3]>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub vector_layers: Vec<serde_json::Value>,
}

impl Default for SourceInfo {
    fn default() -> Self {
        Self {
            name: None,
            description: None,
            attribution: None,
            format: None,
            minzoom: 0,
            maxzoom: 22,
            bounds: [-180.0, -85.0511, 180.0, 85.0511],
            center: None,
            vector_layers: Vec::new(),
        }
    }
}

/// A backend that produces encoded tiles.
#[async_trait]
pub trait TileSource: Send + Sync + fmt::Debug {
    /// Fetch one tile. `Ok(None)` means the tile does not exist.
    async fn get_tile(&self, coord: TileCoord) -> Result<Option<Tile>, SourceError>;

    /// Report source metadata, including its native tile format.
    async fn get_info(&self) -> Result<SourceInfo, SourceError>;
}

pub type SharedSource = Arc<dyn TileSource>;
