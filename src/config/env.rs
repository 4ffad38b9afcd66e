//! Process environment overrides.
//!
//! `PORT`, `CACHE_SIZE` and `SOURCE_CACHE_SIZE` win over CLI values.
//! `TESSERA_THREADPOOL_SIZE` sizes the blocking pool used by tile I/O and
//! must be read before the runtime starts. An empty value counts as unset.

use serde::Deserialize;

use crate::config::loader::ConfigError;
use crate::config::schema::ServerConfig;

/// Minimum blocking pool size when `TESSERA_THREADPOOL_SIZE` is unset.
pub const MIN_BLOCKING_THREADS: usize = 4;

#[derive(Debug, Default, Deserialize, PartialEq)]
pub struct EnvOverrides {
    pub port: Option<u16>,
    pub cache_size: Option<u64>,
    pub source_cache_size: Option<usize>,
    pub tessera_threadpool_size: Option<usize>,
}

impl EnvOverrides {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_pairs(std::env::vars())
    }

    pub fn from_pairs<I>(pairs: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let set = pairs.into_iter().filter(|(_, value)| !value.trim().is_empty());
        envy::from_iter(set).map_err(ConfigError::Env)
    }

    pub fn apply(&self, config: &mut ServerConfig) {
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(cache_size) = self.cache_size {
            config.cache_size = cache_size;
        }
        if let Some(source_cache_size) = self.source_cache_size {
            config.source_cache_size = source_cache_size;
        }
    }

    /// Explicit value if set, else `ceil(max(4, 1.5 × cpus))`.
    pub fn blocking_threads(&self, cpus: usize) -> usize {
        self.tessera_threadpool_size
            .filter(|n| *n > 0)
            .unwrap_or_else(|| (cpus * 3).div_ceil(2).max(MIN_BLOCKING_THREADS))
    }
}
