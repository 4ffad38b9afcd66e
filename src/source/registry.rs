//! Source registry: a capability table from URI scheme to factory.
//!
//! # Responsibilities
//! - Map schemes (`file`, `xray`, ...) to factories, populated at startup
//! - Resolve `transform+inner://` URIs to the transform's factory
//! - Keep a bounded set of opened source handles for reuse
//!
//! # Design Decisions
//! - Exact scheme match first, then the part before the first `+`
//! - Handle cache is least-recently-used, bounded by `source_cache_size`;
//!   hits only stamp a use counter, no lock is shared across sources
//! - Opening happens outside the cache; concurrent opens of the same URI
//!   may race and the last one is kept

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use url::Url;

use crate::source::cache::{CachedSource, TileCache};
use crate::source::file::FileSourceFactory;
use crate::source::xray::{XrayFactory, INSPECT_TRANSFORM};
use crate::source::{SharedSource, SourceError};

/// Opens sources for one scheme.
#[async_trait]
pub trait SourceFactory: Send + Sync {
    /// Open the source named by `uri`. Transform factories may call back
    /// into `registry` to open their inner source.
    async fn open(&self, uri: &Url, registry: &SourceRegistry) -> Result<SharedSource, SourceError>;
}

struct Handle {
    source: SharedSource,
    last_used: AtomicU64,
}

struct HandleCache {
    capacity: usize,
    entries: DashMap<String, Handle>,
    clock: AtomicU64,
}

impl HandleCache {
    fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: DashMap::new(),
            clock: AtomicU64::new(0),
        }
    }

    fn tick(&self) -> u64 {
        self.clock.fetch_add(1, Ordering::Relaxed)
    }

    fn get(&self, key: &str) -> Option<SharedSource> {
        let entry = self.entries.get(key)?;
        entry.last_used.store(self.tick(), Ordering::Relaxed);
        Some(entry.source.clone())
    }

    fn insert(&self, key: String, source: SharedSource) {
        if self.capacity == 0 {
            return;
        }
        let handle = Handle {
            source,
            last_used: AtomicU64::new(self.tick()),
        };
        self.entries.insert(key, handle);

        while self.entries.len() > self.capacity {
            let oldest = self
                .entries
                .iter()
                .min_by_key(|entry| entry.last_used.load(Ordering::Relaxed))
                .map(|entry| entry.key().clone());
            let Some(oldest) = oldest else { break };
            if self.entries.remove(&oldest).is_some() {
                tracing::debug!(source = %oldest, "Evicted source handle");
            }
        }
    }
}

/// Registry of source factories plus the caches shared by every source.
pub struct SourceRegistry {
    factories: HashMap<String, Arc<dyn SourceFactory>>,
    handles: HandleCache,
    tiles: Option<Arc<TileCache>>,
}

impl SourceRegistry {
    /// An empty registry. `source_cache_size` bounds reused handles;
    /// `tiles` is the shared tile cache, if any.
    pub fn new(source_cache_size: usize, tiles: Option<TileCache>) -> Self {
        Self {
            factories: HashMap::new(),
            handles: HandleCache::new(source_cache_size),
            tiles: tiles.map(Arc::new),
        }
    }

    /// A registry with the built-in `file` source and `xray` transform.
    pub fn with_builtins(source_cache_size: usize, tiles: Option<TileCache>) -> Self {
        let mut registry = Self::new(source_cache_size, tiles);
        registry
            .register("file", FileSourceFactory)
            .register(INSPECT_TRANSFORM, XrayFactory);
        registry
    }

    pub fn register(&mut self, scheme: impl Into<String>, factory: impl SourceFactory + 'static) -> &mut Self {
        let scheme = scheme.into().to_ascii_lowercase();
        tracing::debug!(scheme = %scheme, "Registered source factory");
        self.factories.insert(scheme, Arc::new(factory));
        self
    }

    pub fn schemes(&self) -> Vec<&str> {
        let mut schemes: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        schemes.sort_unstable();
        schemes
    }

    pub fn tile_cache(&self) -> Option<&Arc<TileCache>> {
        self.tiles.as_ref()
    }

    /// Number of opened handles currently kept for reuse.
    pub fn cached_handles(&self) -> usize {
        self.handles.entries.len()
    }

    fn factory_for(&self, uri: &Url) -> Result<Arc<dyn SourceFactory>, SourceError> {
        let scheme = uri.scheme();
        if let Some(factory) = self.factories.get(scheme) {
            return Ok(factory.clone());
        }
        scheme
            .split_once('+')
            .and_then(|(transform, _)| self.factories.get(transform))
            .cloned()
            .ok_or_else(|| SourceError::UnsupportedScheme(scheme.to_string()))
    }

    /// Open (or reuse) the source named by `uri`.
    pub async fn load(&self, uri: &Url) -> Result<SharedSource, SourceError> {
        let key = uri.as_str();
        if let Some(source) = self.handles.get(key) {
            return Ok(source);
        }

        let factory = self.factory_for(uri)?;
        let opened = factory.open(uri, self).await?;
        let source: SharedSource = match &self.tiles {
            Some(cache) => Arc::new(CachedSource::new(key, opened, cache.clone())),
            None => opened,
        };
        tracing::info!(source = %uri, "Source loaded");

        self.handles.insert(key.to_string(), source.clone());
        Ok(source)
    }
}

impl fmt::Debug for SourceRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceRegistry")
            .field("schemes", &self.schemes())
            .field("cached_handles", &self.cached_handles())
            .field("tile_cache", &self.tiles)
            .finish()
    }
}

/// Strip a `transform+` prefix, returning the inner URI.
pub fn strip_transform(uri: &Url, transform: &str) -> Result<Url, SourceError> {
    let inner = uri
        .as_str()
        .strip_prefix(transform)
        .and_then(|rest| rest.strip_prefix('+'))
        .ok_or_else(|| SourceError::InvalidUri {
            uri: uri.to_string(),
            reason: format!("expected a '{transform}+' prefix"),
        })?;
    Url::parse(inner).map_err(|e| SourceError::InvalidUri {
        uri: inner.to_string(),
        reason: e.to_string(),
    })
}
