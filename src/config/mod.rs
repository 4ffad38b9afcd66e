//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! CLI flags (clap) → ServerConfig defaults overridden
//!     → env.rs (PORT, CACHE_SIZE, SOURCE_CACHE_SIZE win)
//!     → ServerConfig (immutable)
//!
//! mount mapping file (JSON/TOML)
//!     → loader.rs (parse, document order kept)
//!     → validation.rs (semantic checks)
//!     → MountTableConfig → routing::RouteTableBuilder
//! ```
//!
//! # Design Decisions
//! - Config is read once at startup; there is no reload
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod env;
pub mod loader;
pub mod schema;
pub mod validation;

pub use env::EnvOverrides;
pub use loader::{load_mounts, ConfigError};
pub use schema::{AssetConfig, MountOptions, MountSpec, MountTableConfig, ServerConfig, SourceLocator, SourceSpec};
