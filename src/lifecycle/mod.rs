//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Load mounts → Build bindings → Load sources → Mount
//!     → Probe formats → Inspection mounts → Bind → Listening
//!
//! Shutdown (supervisor.rs):
//!     Signal received → Draining → Stop accepting → Drain connections
//!     → Stopped (clean | forced at grace deadline)
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Supervisor::begin_drain
//! ```
//!
//! # Design Decisions
//! - Ordered startup: config first, then sources, then listener
//! - Ordered shutdown: stop accept, drain, stop
//! - Shutdown has timeout: forced exit after the grace period

pub mod signals;
pub mod startup;
pub mod state;
pub mod supervisor;

pub use signals::SignalListener;
pub use startup::{start_with, Running, StartupError};
pub use state::LifecycleState;
pub use supervisor::{ShutdownOutcome, Supervisor};
