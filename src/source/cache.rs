//! Shared tile cache.
//!
//! # Responsibilities
//! - Keep recently served tiles in memory up to a byte budget
//! - Wrap opened sources so cache hits never reach the backend
//!
//! # Design Decisions
//! - One budget shared by every source, keyed by (source id, coordinate)
//! - Oldest-inserted entries are evicted first
//! - Missing tiles and errors are never cached

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use dashmap::DashMap;

use crate::observability::metrics;
use crate::source::{SharedSource, SourceError, SourceInfo, Tile, TileCoord, TileSource};

type TileKey = (Arc<str>, TileCoord);

#[derive(Debug, Default)]
struct Eviction {
    order: VecDeque<TileKey>,
    bytes: usize,
}

/// Byte-budgeted tile cache. Lookups only touch the concurrent map;
/// the eviction queue is locked on insert.
#[derive(Debug)]
pub struct TileCache {
    budget: usize,
    entries: DashMap<TileKey, Tile>,
    eviction: Mutex<Eviction>,
}

impl TileCache {
    pub fn new(budget_bytes: usize) -> Self {
        Self {
            budget: budget_bytes,
            entries: DashMap::new(),
            eviction: Mutex::new(Eviction::default()),
        }
    }

    /// Cache sized in MiB, as configured by `cache_size`. Zero disables caching.
    pub fn from_megabytes(megabytes: u64) -> Option<Self> {
        if megabytes == 0 {
            return None;
        }
        let bytes = usize::try_from(megabytes.saturating_mul(1024 * 1024)).unwrap_or(usize::MAX);
        Some(Self::new(bytes))
    }

    pub fn budget(&self) -> usize {
        self.budget
    }

    pub fn get(&self, source: &Arc<str>, coord: TileCoord) -> Option<Tile> {
        self.entries
            .get(&(source.clone(), coord))
            .map(|entry| entry.value().clone())
    }

    pub fn insert(&self, source: &Arc<str>, coord: TileCoord, tile: Tile) {
        if tile.len() > self.budget {
            return;
        }
        let mut eviction = self.eviction.lock().unwrap_or_else(PoisonError::into_inner);
        let key = (source.clone(), coord);
        let size = tile.len();
        match self.entries.insert(key.clone(), tile) {
            Some(previous) => eviction.bytes -= previous.len(),
            None => eviction.order.push_back(key),
        }
        eviction.bytes += size;

        while eviction.bytes > self.budget {
            let Some(oldest) = eviction.order.pop_front() else { break };
            if let Some((_, evicted)) = self.entries.remove(&oldest) {
                eviction.bytes -= evicted.len();
            }
        }
        metrics::record_tile_cache_bytes(eviction.bytes);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn size_bytes(&self) -> usize {
        self.eviction.lock().unwrap_or_else(PoisonError::into_inner).bytes
    }
}

/// A source whose tiles go through the shared cache.
#[derive(Debug)]
pub struct CachedSource {
    id: Arc<str>,
    inner: SharedSource,
    cache: Arc<TileCache>,
}

impl CachedSource {
    pub fn new(id: impl Into<Arc<str>>, inner: SharedSource, cache: Arc<TileCache>) -> Self {
        Self {
            id: id.into(),
            inner,
            cache,
        }
    }
}

#[async_trait]
impl TileSource for CachedSource {
    async fn get_tile(&self, coord: TileCoord) -> Result<Option<Tile>, SourceError> {
        if let Some(tile) = self.cache.get(&self.id, coord) {
            tracing::trace!(source = %self.id, tile = %coord, "Tile cache hit");
            return Ok(Some(tile));
        }
        let tile = self.inner.get_tile(coord).await?;
        if let Some(tile) = &tile {
            self.cache.insert(&self.id, coord, tile.clone());
        }
        Ok(tile)
    }

    async fn get_info(&self) -> Result<SourceInfo, SourceError> {
        self.inner.get_info().await
    }
}
