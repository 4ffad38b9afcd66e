//! Startup orchestration.
//!
//! # Responsibilities
//! - Load the mount mapping and build route bindings
//! - Load every source before the socket is bound
//! - Register mounts, probe source formats, mount inspection views for
//!   vector sources
//! - Bind the listener and enter Listening
//!
//! # Design Decisions
//! - Fail fast: load, probe and bind errors are fatal and leave no listener
//! - An inspection mount is registered only after its probe succeeds; the
//!   probe completes before bind, so no request ever sees the gap
//! - Listeners start last (traffic only when mounts are registered)

use std::net::SocketAddr;
use std::sync::Arc;

use crate::config::{load_mounts, ConfigError, ServerConfig};
use crate::http::HttpServer;
use crate::lifecycle::supervisor::{ShutdownOutcome, Supervisor};
use crate::net::{Listener, ListenerError};
use crate::routing::{RouteBinding, RouteTableBuilder};
use crate::source::{SourceError, SourceRegistry};

#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("failed to load source for '{prefix}': {source}")]
    Source {
        prefix: String,
        #[source]
        source: SourceError,
    },

    #[error("format probe for '{prefix}' failed: {source}")]
    Probe {
        prefix: String,
        #[source]
        source: SourceError,
    },

    #[error(transparent)]
    Listener(#[from] ListenerError),
}

/// A bound, listening server.
#[derive(Debug)]
pub struct Running {
    server: HttpServer,
    listener: Listener,
    supervisor: Supervisor,
}

impl Running {
    pub fn local_addr(&self) -> SocketAddr {
        self.listener.local_addr()
    }

    pub fn server(&self) -> &HttpServer {
        &self.server
    }

    pub fn supervisor(&self) -> &Supervisor {
        &self.supervisor
    }

    /// Serve until shutdown completes.
    pub async fn serve(self) -> ShutdownOutcome {
        let Running { server, listener, supervisor } = self;
        server.serve(listener, supervisor).await
    }
}

/// Start under an existing supervisor (signal handlers may already be
/// attached to it).
pub async fn start_with(
    config: &ServerConfig,
    registry: SourceRegistry,
    supervisor: Supervisor,
) -> Result<Running, StartupError> {
    let mounts = config.config.as_deref().map(load_mounts).transpose()?;
    let bindings = RouteTableBuilder::from_config(config, mounts).build();

    let registry = Arc::new(registry);
    for binding in &bindings {
        let source_error = |source| StartupError::Source {
            prefix: binding.display_prefix().to_string(),
            source,
        };
        let uri = binding.url().map_err(source_error)?;
        registry.load(&uri).await.map_err(source_error)?;
    }

    let server = HttpServer::new(Arc::clone(&registry), config.assets.clone(), config.request_log);
    for binding in &bindings {
        server.mount(binding).map_err(|source| StartupError::Source {
            prefix: binding.display_prefix().to_string(),
            source,
        })?;
    }

    for binding in bindings.iter().filter(|b| b.probe_format) {
        match probe(&server, binding).await {
            Ok(Some(inspection)) => {
                tracing::info!(prefix = %inspection.display_prefix(), "Inspection view mounted");
            }
            Ok(None) => {
                tracing::debug!(prefix = binding.display_prefix(), "Source is not vector, no inspection view");
            }
            Err(source) => {
                return Err(StartupError::Probe {
                    prefix: binding.display_prefix().to_string(),
                    source,
                });
            }
        }
    }

    let listener = Listener::bind(&config.listen_address()).await?;
    if supervisor.mark_listening() {
        tracing::info!(address = %listener.local_addr(), mounts = server.table().len(), "Listening");
    }

    Ok(Running {
        server,
        listener,
        supervisor,
    })
}

async fn probe(server: &HttpServer, binding: &RouteBinding) -> Result<Option<RouteBinding>, SourceError> {
    let source = server.registry().load(&binding.url()?).await?;
    let info = source.get_info().await?;

    match info.format {
        Some(format) if format.is_vector() => {
            let inspection = binding.inspection()?;
            server.registry().load(&inspection.url()?).await?;
            server.mount(&inspection)?;
            Ok(Some(inspection))
        }
        _ => Ok(None),
    }
}
