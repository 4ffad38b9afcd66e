//! Shared fixtures for integration tests.
#![allow(dead_code)]

use std::collections::HashMap;
use std::io::Write;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tempfile::NamedTempFile;
use tokio::task::JoinHandle;
use url::Url;

use tessera::config::{AssetConfig, ServerConfig, SourceSpec};
use tessera::lifecycle::{self, ShutdownOutcome, StartupError, Supervisor};
use tessera::source::{SharedSource, SourceError, SourceFactory, SourceInfo, SourceRegistry, Tile, TileCoord, TileFormat, TileSource};
use tessera::HttpServer;

pub const PNG_BYTES: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0];

/// One vector layer "water" with one feature.
pub const PBF_BYTES: &[u8] = &[
    0x1A, 0x0B, // layer
    0x0A, 0x05, b'w', b'a', b't', b'e', b'r', // name
    0x12, 0x02, 0x08, 0x01, // feature
];

/// In-memory tile source with injectable latency and failures.
#[derive(Debug, Clone)]
pub struct MemorySource {
    name: String,
    format: TileFormat,
    tiles: HashMap<(u8, u32, u32), &'static [u8]>,
    info_delay: Duration,
    info_fails: bool,
    tile_delay: Duration,
    stall_tiles: bool,
}

impl MemorySource {
    pub fn raster(name: &str) -> Self {
        Self::with_format(name, TileFormat::Png, PNG_BYTES)
    }

    pub fn vector(name: &str) -> Self {
        Self::with_format(name, TileFormat::Pbf, PBF_BYTES)
    }

    fn with_format(name: &str, format: TileFormat, tile: &'static [u8]) -> Self {
        Self {
            name: name.to_string(),
            format,
            tiles: HashMap::from([((0, 0, 0), tile)]),
            info_delay: Duration::ZERO,
            info_fails: false,
            tile_delay: Duration::ZERO,
            stall_tiles: false,
        }
    }

    pub fn info_delay(mut self, delay: Duration) -> Self {
        self.info_delay = delay;
        self
    }

    pub fn failing_info(mut self) -> Self {
        self.info_fails = true;
        self
    }

    pub fn tile_delay(mut self, delay: Duration) -> Self {
        self.tile_delay = delay;
        self
    }

    /// Tile requests never complete.
    pub fn stalling(mut self) -> Self {
        self.stall_tiles = true;
        self
    }
}

#[async_trait]
impl TileSource for MemorySource {
    async fn get_tile(&self, coord: TileCoord) -> Result<Option<Tile>, SourceError> {
        if self.stall_tiles {
            std::future::pending::<()>().await;
        }
        tokio::time::sleep(self.tile_delay).await;
        Ok(self
            .tiles
            .get(&(coord.z, coord.x, coord.y))
            .map(|data| Tile::new(*data, self.format.clone())))
    }

    async fn get_info(&self) -> Result<SourceInfo, SourceError> {
        tokio::time::sleep(self.info_delay).await;
        if self.info_fails {
            return Err(SourceError::Backend(format!("{} has no metadata", self.name)));
        }
        Ok(SourceInfo {
            name: Some(self.name.clone()),
            format: Some(self.format.clone()),
            ..SourceInfo::default()
        })
    }
}

/// Serves `mem://<name>` from a fixed set of sources.
#[derive(Debug, Default)]
pub struct MemoryFactory {
    sources: HashMap<String, Arc<MemorySource>>,
}

#[async_trait]
impl SourceFactory for MemoryFactory {
    async fn open(&self, uri: &Url, _registry: &SourceRegistry) -> Result<SharedSource, SourceError> {
        let name = uri.host_str().unwrap_or_default();
        match self.sources.get(name) {
            Some(source) => Ok(source.clone() as SharedSource),
            None => Err(SourceError::Backend(format!("no memory source named '{name}'"))),
        }
    }
}

pub fn registry(sources: Vec<MemorySource>) -> SourceRegistry {
    let factory = MemoryFactory {
        sources: sources
            .into_iter()
            .map(|s| (s.name.clone(), Arc::new(s)))
            .collect(),
    };
    let mut registry = SourceRegistry::with_builtins(6, None);
    registry.register("mem", factory);
    registry
}

/// Loopback config on an ephemeral port with no static assets.
pub fn config() -> ServerConfig {
    ServerConfig {
        bind: "127.0.0.1".to_string(),
        port: 0,
        request_log: false,
        assets: AssetConfig {
            public_dir: PathBuf::from("/nonexistent/tessera/public"),
            vendor_dir: PathBuf::from("/nonexistent/tessera/vendor"),
        },
        ..ServerConfig::default()
    }
}

/// A loopback port that was free a moment ago.
pub fn free_port() -> u16 {
    std::net::TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port()
}

pub async fn refuses_connections(port: u16) -> bool {
    tokio::net::TcpStream::connect(("127.0.0.1", port)).await.is_err()
}

pub fn single_uri(uri: &str) -> ServerConfig {
    ServerConfig {
        uri: Some(SourceSpec::from(uri)),
        ..config()
    }
}

/// Write a JSON mount mapping; keep the handle alive for the test.
pub fn mapping(config: &mut ServerConfig, json: &str) -> NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
    file.write_all(json.as_bytes()).unwrap();
    config.config = Some(file.path().to_path_buf());
    file
}

pub struct TestServer {
    pub addr: SocketAddr,
    pub server: HttpServer,
    pub supervisor: Supervisor,
    pub handle: JoinHandle<ShutdownOutcome>,
}

impl TestServer {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub async fn outcome(self) -> ShutdownOutcome {
        tokio::time::timeout(Duration::from_secs(15), self.handle)
            .await
            .expect("server did not stop")
            .unwrap()
    }
}

pub async fn try_spawn(
    config: ServerConfig,
    registry: SourceRegistry,
    supervisor: Supervisor,
) -> Result<TestServer, StartupError> {
    let running = lifecycle::start_with(&config, registry, supervisor).await?;
    let addr = running.local_addr();
    let server = running.server().clone();
    let supervisor = running.supervisor().clone();
    let handle = tokio::spawn(running.serve());
    Ok(TestServer {
        addr,
        server,
        supervisor,
        handle,
    })
}

pub async fn spawn(config: ServerConfig, registry: SourceRegistry) -> TestServer {
    try_spawn(config, registry, Supervisor::new(Duration::from_secs(5)))
        .await
        .unwrap()
}

pub fn client() -> reqwest::Client {
    reqwest::Client::builder().no_proxy().build().unwrap()
}

/// Poll until `condition` holds or two seconds pass.
pub async fn eventually<F: Fn() -> bool>(condition: F) -> bool {
    for _ in 0..100 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    condition()
}
