//! Configuration schema definitions.
//!
//! `ServerConfig` is the startup configuration (CLI + environment).
//! `MountTableConfig` is the prefix → mount mapping read from the config
//! file, kept in document order.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use serde::de::{MapAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize};
use url::Url;

use crate::routing::MountFlags;
use crate::source::SourceError;

/// Root startup configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind host (e.g., "0.0.0.0").
    pub bind: String,

    /// Listen port. `PORT` overrides it.
    pub port: u16,

    /// Tile cache capacity in MiB. `CACHE_SIZE` overrides it.
    pub cache_size: u64,

    /// Number of opened source handles kept for reuse. `SOURCE_CACHE_SIZE` overrides it.
    pub source_cache_size: usize,

    /// Source mounted at the root.
    pub uri: Option<SourceSpec>,

    /// Path to the prefix → mount mapping file.
    pub config: Option<PathBuf>,

    /// Static asset directories mounted alongside every source.
    pub assets: AssetConfig,

    /// Log every request through the trace layer.
    pub request_log: bool,

    /// Upper bound on connection draining at shutdown.
    pub grace_period_secs: u64,

    /// Prometheus exporter bind address; disabled when unset.
    pub metrics_address: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".to_string(),
            port: 8080,
            cache_size: 10,
            source_cache_size: 6,
            uri: None,
            config: None,
            assets: AssetConfig::default(),
            request_log: true,
            grace_period_secs: 10,
            metrics_address: None,
        }
    }
}

impl ServerConfig {
    pub fn listen_address(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }

    pub fn grace_period(&self) -> Duration {
        Duration::from_secs(self.grace_period_secs)
    }
}

/// Static asset roots.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AssetConfig {
    /// Distributed public assets (preview page, styles).
    pub public_dir: PathBuf,

    /// Third-party vendor components.
    pub vendor_dir: PathBuf,
}

impl Default for AssetConfig {
    fn default() -> Self {
        Self {
            public_dir: PathBuf::from("public"),
            vendor_dir: PathBuf::from("vendor"),
        }
    }
}

/// Names a tile source: a URI string, or a structured locator.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum SourceSpec {
    Uri(String),
    Locator(SourceLocator),
}

/// Structured form of a source URI.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct SourceLocator {
    /// Scheme, with or without the trailing colon (`file`, `file:`).
    pub protocol: String,
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub query: BTreeMap<String, String>,
}

impl SourceSpec {
    /// Resolve to a URL. A bare filesystem path becomes a `file://` URL.
    pub fn to_url(&self) -> Result<Url, SourceError> {
        match self {
            SourceSpec::Uri(raw) => parse_uri(raw),
            SourceSpec::Locator(locator) => locator.to_url(),
        }
    }
}

impl fmt::Display for SourceSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_url() {
            Ok(url) => write!(f, "{url}"),
            Err(_) => match self {
                SourceSpec::Uri(raw) => f.write_str(raw),
                SourceSpec::Locator(locator) => write!(f, "{}:{}", locator.protocol, locator.path),
            },
        }
    }
}

impl From<&str> for SourceSpec {
    fn from(value: &str) -> Self {
        SourceSpec::Uri(value.to_string())
    }
}

impl SourceLocator {
    fn to_url(&self) -> Result<Url, SourceError> {
        let scheme = self.protocol.trim_end_matches(':');
        let host = self.host.as_deref().unwrap_or_default();
        let raw = format!("{scheme}://{host}{}", self.path);
        let mut url = parse_uri(&raw)?;
        if !self.query.is_empty() {
            url.query_pairs_mut().extend_pairs(self.query.iter());
        }
        Ok(url)
    }
}

fn parse_uri(raw: &str) -> Result<Url, SourceError> {
    let invalid = |reason: String| SourceError::InvalidUri {
        uri: raw.to_string(),
        reason,
    };
    if raw.contains("://") {
        return Url::parse(raw).map_err(|e| invalid(e.to_string()));
    }
    let path = std::path::Path::new(raw);
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map_err(|e| invalid(e.to_string()))?
            .join(path)
    };
    Url::from_file_path(&absolute).map_err(|_| invalid("not an absolute path".to_string()))
}

/// One entry of the mount mapping: a bare source, or a source plus flags.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum MountSpec {
    Detailed(MountOptions),
    Source(SourceSpec),
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct MountOptions {
    pub source: SourceSpec,

    /// Attach the response-timing header.
    #[serde(default = "default_true")]
    pub timing: bool,

    /// Attach CORS headers.
    #[serde(default = "default_true")]
    pub cors: bool,

    /// Probe the source and mount an inspection view at `<prefix>/_` for vector sources.
    #[serde(default)]
    pub inspect: bool,
}

fn default_true() -> bool {
    true
}

impl MountSpec {
    pub fn source(&self) -> &SourceSpec {
        match self {
            MountSpec::Detailed(options) => &options.source,
            MountSpec::Source(source) => source,
        }
    }

    pub fn flags(&self) -> MountFlags {
        match self {
            MountSpec::Detailed(options) => MountFlags {
                timing: options.timing,
                cors: options.cors,
            },
            MountSpec::Source(_) => MountFlags::default(),
        }
    }

    pub fn inspect(&self) -> bool {
        matches!(self, MountSpec::Detailed(options) if options.inspect)
    }
}

/// Prefix → mount mapping in file order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MountTableConfig {
    entries: Vec<(String, MountSpec)>,
}

impl MountTableConfig {
    pub fn from_entries(entries: Vec<(String, MountSpec)>) -> Self {
        Self { entries }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &MountSpec)> {
        self.entries.iter().map(|(prefix, spec)| (prefix.as_str(), spec))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<'de> Deserialize<'de> for MountTableConfig {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct OrderedVisitor;

        impl<'de> Visitor<'de> for OrderedVisitor {
            type Value = MountTableConfig;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of URL prefix to tile source")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
                let mut entries = Vec::with_capacity(map.size_hint().unwrap_or(0));
                while let Some((prefix, spec)) = map.next_entry::<String, MountSpec>()? {
                    entries.push((prefix, spec));
                }
                Ok(MountTableConfig { entries })
            }
        }

        deserializer.deserialize_map(OrderedVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_cli_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.listen_address(), "0.0.0.0:8080");
        assert_eq!(config.cache_size, 10);
        assert_eq!(config.source_cache_size, 6);
        assert_eq!(config.grace_period(), Duration::from_secs(10));
        assert!(config.request_log);
    }

    #[test]
    fn mount_spec_forms() {
        let table: MountTableConfig = serde_json::from_str(
            r#"{
                "/raster": "file:///srv/raster",
                "/vector": {"source": "file:///srv/vector", "cors": false, "inspect": true},
                "/located": {"source": {"protocol": "file:", "path": "/srv/located", "query": {"format": "png"}}}
            }"#,
        )
        .unwrap();
        let entries: Vec<_> = table.iter().collect();

        assert_eq!(entries[0].1.flags(), MountFlags { timing: true, cors: true });
        assert!(!entries[0].1.inspect());

        assert_eq!(entries[1].1.flags(), MountFlags { timing: true, cors: false });
        assert!(entries[1].1.inspect());

        let url = entries[2].1.source().to_url().unwrap();
        assert_eq!(url.as_str(), "file:///srv/located?format=png");
    }

    #[test]
    fn json_mapping_keeps_document_order() {
        let table: MountTableConfig =
            serde_json::from_str(r#"{"/z": "file:///z", "/a": "file:///a", "/m": "file:///m"}"#).unwrap();
        let prefixes: Vec<&str> = table.iter().map(|(p, _)| p).collect();
        assert_eq!(prefixes, vec!["/z", "/a", "/m"]);
    }

    #[test]
    fn toml_mapping_keeps_document_order() {
        let table: MountTableConfig = toml::from_str(
            r#"
            "/z" = "file:///z"
            "/a" = { source = "file:///a", timing = false }
            "/m" = "file:///m"
            "#,
        )
        .unwrap();
        let prefixes: Vec<&str> = table.iter().map(|(p, _)| p).collect();
        assert_eq!(prefixes, vec!["/z", "/a", "/m"]);
        assert!(!table.iter().nth(1).unwrap().1.flags().timing);
    }

    #[test]
    fn bare_paths_become_file_urls() {
        let url = SourceSpec::from("/srv/tiles").to_url().unwrap();
        assert_eq!(url.scheme(), "file");
        assert_eq!(url.path(), "/srv/tiles");
    }

    #[test]
    fn malformed_uri_is_rejected() {
        assert!(SourceSpec::from("file://[bad").to_url().is_err());
    }
}
