//! Tessera tile server.
//!
//! Serves map tiles, TileJSON and static preview assets from one tile
//! source mounted at `/`, or many sources mounted at the prefixes of a
//! mapping file.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request     ┌──────────┐    ┌───────────┐    ┌─────────────────────┐
//!     ──────────────────▶│   net    │───▶│   http    │───▶│  routing (mounts,   │
//!                        │ listener │    │  server   │    │  first match wins)  │
//!                        └──────────┘    └───────────┘    └──────────┬──────────┘
//!                                                                    │
//!                                         ┌──────────────────────────┼──────────┐
//!                                         ▼                          ▼          ▼
//!                                  timing / CORS            static assets   tile handler
//!                                                                               │
//!                                                                               ▼
//!                                                                  source registry + caches
//!
//!     SIGINT / SIGTERM ──▶ lifecycle supervisor ──▶ stop accepting ──▶ drain (grace) ──▶ exit
//! ```
//!
//! Exit codes: 0 clean shutdown, 1 forced shutdown or startup failure.

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;

use tessera::config::{AssetConfig, EnvOverrides, ServerConfig, SourceSpec};
use tessera::lifecycle::{self, SignalListener, Supervisor};
use tessera::observability::{logging, metrics};
use tessera::source::cache::TileCache;
use tessera::source::SourceRegistry;

#[derive(Debug, Parser)]
#[command(name = "tessera", version, about = "Serve map tiles from one or more tile sources")]
struct Cli {
    /// Tile source to mount at `/` (URI, or a path to a tile directory)
    uri: Option<String>,

    /// Mapping file of prefix → source (JSON, or TOML by extension)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Listen port (`PORT` overrides)
    #[arg(short, long, default_value_t = 8080)]
    port: u16,

    /// Bind host
    #[arg(short, long, default_value = "0.0.0.0")]
    bind: String,

    /// Tile cache size in MiB, 0 disables (`CACHE_SIZE` overrides)
    #[arg(short = 'C', long, default_value_t = 10)]
    cache_size: u64,

    /// Source handles kept open (`SOURCE_CACHE_SIZE` overrides)
    #[arg(short = 'S', long, default_value_t = 6)]
    source_cache_size: usize,

    #[arg(long, default_value = "public")]
    public_dir: PathBuf,

    #[arg(long, default_value = "vendor")]
    vendor_dir: PathBuf,

    /// Disable per-request logging
    #[arg(long)]
    no_request_log: bool,

    /// Seconds to wait for open connections at shutdown
    #[arg(long, default_value_t = 10)]
    grace_period: u64,

    /// Serve Prometheus metrics on this address
    #[arg(long)]
    metrics_address: Option<String>,
}

impl Cli {
    fn into_config(self) -> ServerConfig {
        ServerConfig {
            bind: self.bind,
            port: self.port,
            cache_size: self.cache_size,
            source_cache_size: self.source_cache_size,
            uri: self.uri.map(SourceSpec::Uri),
            config: self.config,
            assets: AssetConfig {
                public_dir: self.public_dir,
                vendor_dir: self.vendor_dir,
            },
            request_log: !self.no_request_log,
            grace_period_secs: self.grace_period,
            metrics_address: self.metrics_address,
        }
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let env = EnvOverrides::from_env()?;

    let mut config = cli.into_config();
    env.apply(&mut config);

    let blocking_threads = env.blocking_threads(num_cpus::get());
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .max_blocking_threads(blocking_threads)
        .build()
        .context("failed to build runtime")?;

    let exit_code = runtime.block_on(run(config, blocking_threads))?;

    // Forced shutdown leaves connection tasks behind; do not wait for them.
    runtime.shutdown_background();
    std::process::exit(exit_code);
}

async fn run(config: ServerConfig, blocking_threads: usize) -> anyhow::Result<i32> {
    logging::init();
    tracing::info!(version = env!("CARGO_PKG_VERSION"), blocking_threads, "tessera starting");

    if let Some(address) = &config.metrics_address {
        let address: SocketAddr = address
            .parse()
            .with_context(|| format!("invalid metrics address '{address}'"))?;
        metrics::init_metrics(address).context("failed to start metrics exporter")?;
    }

    tracing::info!(
        listen = %config.listen_address(),
        cache_size_mib = config.cache_size,
        source_cache_size = config.source_cache_size,
        uri = ?config.uri.as_ref().map(ToString::to_string),
        config = ?config.config,
        "Configuration loaded"
    );

    let supervisor = Supervisor::new(config.grace_period());
    let signals = SignalListener::install().context("failed to install signal handlers")?;
    tokio::spawn(signals.run(supervisor.clone()));

    let registry = SourceRegistry::with_builtins(config.source_cache_size, TileCache::from_megabytes(config.cache_size));
    let running = lifecycle::start_with(&config, registry, supervisor).await?;

    let outcome = running.serve().await;
    Ok(outcome.exit_code())
}
