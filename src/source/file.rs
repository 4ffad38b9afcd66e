//! Directory-backed tile source (`file:///path/to/tiles`).
//!
//! Layout is `{root}/{z}/{x}/{y}.{ext}`, with `{y}@{n}x.{ext}` for scaled
//! tiles and an optional TileJSON `metadata.json` at the root. The format
//! comes from the `format` query parameter, then metadata, then the first
//! tile file found.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use url::Url;

use crate::source::registry::{SourceFactory, SourceRegistry};
use crate::source::{SharedSource, SourceError, SourceInfo, Tile, TileCoord, TileFormat, TileSource};

const METADATA_FILE: &str = "metadata.json";

#[derive(Debug)]
pub struct FileSource {
    root: PathBuf,
    format: TileFormat,
    info: SourceInfo,
}

impl FileSource {
    pub async fn open(root: impl Into<PathBuf>, format_hint: Option<TileFormat>) -> Result<Self, SourceError> {
        let root = root.into();
        let meta = tokio::fs::metadata(&root).await?;
        if !meta.is_dir() {
            return Err(SourceError::InvalidUri {
                uri: root.display().to_string(),
                reason: "not a directory".to_string(),
            });
        }

        let mut info = match tokio::fs::read(root.join(METADATA_FILE)).await {
            Ok(raw) => serde_json::from_slice::<SourceInfo>(&raw)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => SourceInfo::default(),
            Err(e) => return Err(e.into()),
        };

        let format = match format_hint.or_else(|| info.format.clone()) {
            Some(format) => format,
            None => detect_format(&root)
                .await?
                .ok_or_else(|| SourceError::UnknownFormat(root.display().to_string()))?,
        };
        info.format = Some(format.clone());
        if info.name.is_none() {
            info.name = root.file_name().map(|n| n.to_string_lossy().into_owned());
        }

        Ok(Self { root, format, info })
    }

    fn tile_path(&self, coord: TileCoord) -> PathBuf {
        let file = if coord.scale > 1 {
            format!("{}@{}x.{}", coord.y, coord.scale, self.format.extension())
        } else {
            format!("{}.{}", coord.y, self.format.extension())
        };
        self.root
            .join(coord.z.to_string())
            .join(coord.x.to_string())
            .join(file)
    }
}

#[async_trait]
impl TileSource for FileSource {
    async fn get_tile(&self, coord: TileCoord) -> Result<Option<Tile>, SourceError> {
        match tokio::fs::read(self.tile_path(coord)).await {
            Ok(data) => Ok(Some(Tile::new(data, self.format.clone()))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn get_info(&self) -> Result<SourceInfo, SourceError> {
        Ok(self.info.clone())
    }
}

/// Walk `{z}/{x}/` to the first tile file and read its extension.
async fn detect_format(root: &Path) -> Result<Option<TileFormat>, SourceError> {
    let Some(z_dir) = first_entry(root, true, is_numeric).await? else {
        return Ok(None);
    };
    let Some(x_dir) = first_entry(&z_dir, true, is_numeric).await? else {
        return Ok(None);
    };
    let tile = first_entry(&x_dir, false, |p| p.extension().is_some()).await?;
    Ok(tile
        .as_deref()
        .and_then(Path::extension)
        .map(|ext| TileFormat::from_extension(&ext.to_string_lossy())))
}

async fn first_entry(
    dir: &Path,
    want_dir: bool,
    accept: impl Fn(&Path) -> bool,
) -> Result<Option<PathBuf>, SourceError> {
    let mut entries = tokio::fs::read_dir(dir).await?;
    let mut found: Vec<PathBuf> = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let file_type = entry.file_type().await?;
        let path = entry.path();
        if file_type.is_dir() == want_dir && (want_dir || file_type.is_file()) && accept(&path) {
            found.push(path);
        }
    }
    found.sort();
    Ok(found.into_iter().next())
}

fn is_numeric(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| !n.is_empty() && n.bytes().all(|b| b.is_ascii_digit()))
}

pub struct FileSourceFactory;

#[async_trait]
impl SourceFactory for FileSourceFactory {
    async fn open(&self, uri: &Url, _registry: &SourceRegistry) -> Result<SharedSource, SourceError> {
        let root = uri.to_file_path().map_err(|_| SourceError::InvalidUri {
            uri: uri.to_string(),
            reason: "not a local file path".to_string(),
        })?;
        let format_hint = uri
            .query_pairs()
            .find(|(k, _)| k == "format")
            .map(|(_, v)| TileFormat::from_extension(&v));
        Ok(Arc::new(FileSource::open(root, format_hint).await?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write_tile(root: &Path, z: u8, x: u32, name: &str, data: &[u8]) {
        let dir = root.join(z.to_string()).join(x.to_string());
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(name), data).unwrap();
    }

    #[tokio::test]
    async fn format_from_first_tile() {
        let dir = tempfile::tempdir().unwrap();
        write_tile(dir.path(), 0, 0, "0.png", b"\x89PNG");

        let source = FileSource::open(dir.path(), None).await.unwrap();
        let info = source.get_info().await.unwrap();
        assert_eq!(info.format, Some(TileFormat::Png));
        assert!(info.name.is_some());
    }

    #[tokio::test]
    async fn metadata_overrides_detection() {
        let dir = tempfile::tempdir().unwrap();
        write_tile(dir.path(), 0, 0, "0.png", b"\x89PNG");
        fs::write(
            dir.path().join(METADATA_FILE),
            r#"{"name":"roads","format":"pbf","maxzoom":14}"#,
        )
        .unwrap();

        let source = FileSource::open(dir.path(), None).await.unwrap();
        let info = source.get_info().await.unwrap();
        assert_eq!(info.name.as_deref(), Some("roads"));
        assert_eq!(info.format, Some(TileFormat::Pbf));
        assert_eq!(info.maxzoom, 14);
    }

    #[tokio::test]
    async fn empty_directory_has_unknown_format() {
        let dir = tempfile::tempdir().unwrap();
        let err = FileSource::open(dir.path(), None).await.unwrap_err();
        assert!(matches!(err, SourceError::UnknownFormat(_)));
    }

    #[tokio::test]
    async fn missing_directory_fails_to_open() {
        let dir = tempfile::tempdir().unwrap();
        let err = FileSource::open(dir.path().join("nope"), None).await.unwrap_err();
        assert!(matches!(err, SourceError::Io(_)));
    }

    #[tokio::test]
    async fn reads_tiles_and_reports_missing() {
        let dir = tempfile::tempdir().unwrap();
        write_tile(dir.path(), 1, 1, "0.png", b"\x89PNGone");
        write_tile(dir.path(), 1, 1, "0@2x.png", b"\x89PNGtwo");

        let source = FileSource::open(dir.path(), None).await.unwrap();
        let tile = source.get_tile(TileCoord::new(1, 1, 0).unwrap()).await.unwrap().unwrap();
        assert_eq!(&tile.data[..], b"\x89PNGone");

        let retina = source
            .get_tile(TileCoord::with_scale(1, 1, 0, 2).unwrap())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(&retina.data[..], b"\x89PNGtwo");

        assert!(source.get_tile(TileCoord::new(1, 0, 0).unwrap()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn factory_honours_format_query() {
        let dir = tempfile::tempdir().unwrap();
        let mut uri = Url::from_directory_path(dir.path()).unwrap();
        uri.set_query(Some("format=webp"));

        let registry = SourceRegistry::new(0, None);
        let source = FileSourceFactory.open(&uri, &registry).await.unwrap();
        assert_eq!(source.get_info().await.unwrap().format, Some(TileFormat::Webp));
    }
}
