//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (hyper auto builder, HTTP/1.1 + HTTP/2)
//!     → TraceLayer (request log, optional)
//!     → routing::MountTable (prefix dispatch)
//!     → middleware.rs (timing, CORS per mount)
//!     → static assets (public, then vendor)
//!     → tiles.rs (tile bytes, TileJSON)
//!     → Send to client
//! ```

pub mod middleware;
pub mod server;
pub mod tiles;

pub use server::HttpServer;
