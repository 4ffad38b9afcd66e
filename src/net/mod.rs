//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming TCP connection
//!     → listener.rs (accept)
//!     → connection.rs (lifetime tracking)
//!     → Hand off to HTTP layer
//! ```
//!
//! # Design Decisions
//! - Each connection tracked for drain reporting
//! - Dropping the listener is the only way to stop accepting

pub mod connection;
pub mod listener;

pub use connection::{ConnectionGuard, ConnectionTracker};
pub use listener::{Listener, ListenerError};
