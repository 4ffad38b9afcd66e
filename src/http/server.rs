//! HTTP server setup and the accept loop.
//!
//! # Responsibilities
//! - Build each mount's service (static assets, tile handler, middleware)
//! - Register mounts with the mount table
//! - Accept connections and serve HTTP/1.1 and HTTP/2 on them
//! - Stop accepting and hand the open connections to the supervisor's
//!   drain when shutdown begins
//!
//! # Design Decisions
//! - Own accept loop instead of `axum::serve`, so the listener can be
//!   dropped the moment draining starts and the open connection count is
//!   visible to the supervisor
//! - Static assets are consulted before the tile handler; each falls
//!   through to the next on a miss

use std::sync::Arc;
use std::time::Duration;

use axum::extract::Request;
use axum::Router;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto;
use hyper_util::server::graceful::GracefulShutdown;
use hyper_util::service::TowerToHyperService;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::config::AssetConfig;
use crate::http::{middleware, tiles};
use crate::lifecycle::{ShutdownOutcome, Supervisor};
use crate::net::Listener;
use crate::routing::{MountTable, RouteBinding};
use crate::source::{SourceError, SourceRegistry};

/// HTTP front-end over a mount table. Cloning shares the table.
#[derive(Debug, Clone)]
pub struct HttpServer {
    registry: Arc<SourceRegistry>,
    table: MountTable,
    assets: AssetConfig,
    request_log: bool,
}

impl HttpServer {
    pub fn new(registry: Arc<SourceRegistry>, assets: AssetConfig, request_log: bool) -> Self {
        Self {
            registry,
            table: MountTable::new(),
            assets,
            request_log,
        }
    }

    pub fn registry(&self) -> &Arc<SourceRegistry> {
        &self.registry
    }

    pub fn table(&self) -> &MountTable {
        &self.table
    }

    /// Build the binding's service and append it to the mount table.
    pub fn mount(&self, binding: &RouteBinding) -> Result<(), SourceError> {
        let state = tiles::TileState::new(binding.url()?, Arc::clone(&self.registry), binding.display_prefix());

        let vendor = ServeDir::new(&self.assets.vendor_dir)
            .call_fallback_on_method_not_allowed(true)
            .fallback(tiles::router(state));
        let assets = ServeDir::new(&self.assets.public_dir)
            .call_fallback_on_method_not_allowed(true)
            .fallback(vendor);

        let service = middleware::apply(Router::new().fallback_service(assets), binding.flags);
        self.table.register(binding, service);
        Ok(())
    }

    /// Top-level application: mount dispatch plus request logging.
    pub fn app(&self) -> Router {
        let table = self.table.clone();
        let router = Router::new().fallback(move |request: Request| {
            let table = table.clone();
            async move { table.dispatch(request).await }
        });

        if self.request_log {
            router.layer(TraceLayer::new_for_http())
        } else {
            router
        }
    }

    /// Serve until the supervisor starts draining, then drop the listener
    /// and drain the open connections.
    pub async fn serve(&self, listener: Listener, supervisor: Supervisor) -> ShutdownOutcome {
        let app = self.app();
        let builder = auto::Builder::new(TokioExecutor::new());
        let graceful = GracefulShutdown::new();

        tracing::info!(address = %listener.local_addr(), mounts = self.table.len(), "HTTP server accepting connections");

        let draining = supervisor.draining();
        tokio::pin!(draining);

        loop {
            tokio::select! {
                biased;
                _ = &mut draining => break,
                accepted = listener.accept() => {
                    let (stream, peer) = match accepted {
                        Ok(accepted) => accepted,
                        Err(e) => {
                            tracing::warn!(error = %e, "Accept failed");
                            tokio::time::sleep(Duration::from_millis(50)).await;
                            continue;
                        }
                    };

                    let guard = supervisor.connections().track();
                    let service = TowerToHyperService::new(app.clone());
                    let connection = builder
                        .serve_connection_with_upgrades(TokioIo::new(stream), service)
                        .into_owned();
                    let connection = graceful.watch(connection);

                    tokio::spawn(async move {
                        if let Err(e) = connection.await {
                            tracing::debug!(peer_addr = %peer, connection_id = %guard.id(), error = %e, "Connection ended with error");
                        }
                        drop(guard);
                    });
                }
            }
        }

        drop(listener);
        tracing::info!("Listener closed, no longer accepting connections");

        supervisor.drain(graceful.shutdown()).await
    }
}
