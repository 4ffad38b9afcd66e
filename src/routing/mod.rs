//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Route Table Construction (at startup):
//!     single URI + mount mapping
//!     → builder.rs (ordered RouteBindings with flags)
//!     → http::server mounts each binding into router.rs
//!
//! Incoming Request (path):
//!     → router.rs (scan mounts in registration order)
//!     → matcher.rs (segment-aligned prefix strip)
//!     → mount service answers, or declines with Unmatched
//!     → next mount, or 404
//! ```
//!
//! # Design Decisions
//! - Registration order is precedence; no longest-prefix resolution
//! - Deterministic: same table and path always reach the same mount
//! - Inspection mounts are appended at runtime after a format probe

pub mod binding;
pub mod builder;
pub mod matcher;
pub mod router;

pub use binding::{MountFlags, MountKind, RouteBinding};
pub use builder::RouteTableBuilder;
pub use matcher::PathPrefixMatcher;
pub use router::{unmatched, MountPrefix, MountTable, Unmatched};
