//! Tessera tile server library.

pub mod config;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod routing;
pub mod source;

pub use config::ServerConfig;
pub use http::HttpServer;
pub use lifecycle::{ShutdownOutcome, Supervisor};
pub use source::SourceRegistry;
