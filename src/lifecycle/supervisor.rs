//! Lifecycle supervision: state, drain, and shutdown outcome.
//!
//! # Responsibilities
//! - Own the lifecycle state and publish transitions
//! - Start the drain exactly once, however many signals arrive
//! - Bound the drain by the grace period, measured from drain start
//! - Report whether shutdown was clean or forced
//!
//! # Design Decisions
//! - State is an atomic checked with compare-and-swap before acting, so a
//!   second signal can never restart the drain or extend the deadline
//! - Cloning shares one supervisor

use std::future::Future;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::Instant;

use crate::lifecycle::state::LifecycleState;
use crate::net::ConnectionTracker;
use crate::observability::metrics;

/// How shutdown ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShutdownOutcome {
    /// Every connection closed within the grace period.
    Clean,
    /// The grace period elapsed with connections still open.
    Forced { open: usize },
}

impl ShutdownOutcome {
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Clean => 0,
            Self::Forced { .. } => 1,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Clean => "clean",
            Self::Forced { .. } => "forced",
        }
    }
}

#[derive(Debug)]
struct Inner {
    state: AtomicU8,
    changes: watch::Sender<LifecycleState>,
    drain_started: OnceLock<Instant>,
    outcome: OnceLock<ShutdownOutcome>,
    connections: ConnectionTracker,
    grace: Duration,
}

#[derive(Debug, Clone)]
pub struct Supervisor {
    inner: Arc<Inner>,
}

impl Supervisor {
    pub fn new(grace: Duration) -> Self {
        let (changes, _rx) = watch::channel(LifecycleState::Starting);
        Self {
            inner: Arc::new(Inner {
                state: AtomicU8::new(LifecycleState::Starting as u8),
                changes,
                drain_started: OnceLock::new(),
                outcome: OnceLock::new(),
                connections: ConnectionTracker::new(),
                grace,
            }),
        }
    }

    pub fn state(&self) -> LifecycleState {
        LifecycleState::from_u8(self.inner.state.load(Ordering::SeqCst))
    }

    fn subscribe(&self) -> watch::Receiver<LifecycleState> {
        self.inner.changes.subscribe()
    }

    pub fn connections(&self) -> &ConnectionTracker {
        &self.inner.connections
    }

    /// The recorded outcome, once stopped.
    pub fn outcome(&self) -> Option<ShutdownOutcome> {
        self.inner.outcome.get().cloned()
    }

    fn transition(&self, from: LifecycleState, to: LifecycleState) -> bool {
        let swapped = self
            .inner
            .state
            .compare_exchange(from as u8, to as u8, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok();
        if swapped {
            self.inner.changes.send_replace(to);
        }
        swapped
    }

    /// Starting → Listening. False if a drain already began.
    pub fn mark_listening(&self) -> bool {
        self.transition(LifecycleState::Starting, LifecycleState::Listening)
    }

    /// Enter Draining. Only the first call wins; later calls are logged
    /// and ignored.
    pub fn begin_drain(&self) -> bool {
        let entered = self.transition(LifecycleState::Listening, LifecycleState::Draining)
            || self.transition(LifecycleState::Starting, LifecycleState::Draining);

        if !entered {
            tracing::warn!(state = %self.state(), "Shutdown already in progress, ignoring");
            return false;
        }

        let _ = self.inner.drain_started.set(Instant::now());
        tracing::info!(
            open_connections = self.inner.connections.active_count(),
            grace_period_secs = self.inner.grace.as_secs_f64(),
            "Draining connections"
        );
        true
    }

    /// Resolves once the drain has begun.
    pub async fn draining(&self) {
        let mut rx = self.subscribe();
        let _ = rx.wait_for(|state| *state >= LifecycleState::Draining).await;
    }

    /// Wait for `connections_closed` up to the grace deadline, then stop.
    pub async fn drain<F>(&self, connections_closed: F) -> ShutdownOutcome
    where
        F: Future<Output = ()>,
    {
        let started = *self.inner.drain_started.get_or_init(Instant::now);
        let deadline = started + self.inner.grace;

        let outcome = tokio::select! {
            _ = connections_closed => ShutdownOutcome::Clean,
            _ = tokio::time::sleep_until(deadline) => ShutdownOutcome::Forced {
                open: self.inner.connections.active_count(),
            },
        };
        self.finish(outcome, started)
    }

    fn finish(&self, outcome: ShutdownOutcome, started: Instant) -> ShutdownOutcome {
        let outcome = self.inner.outcome.get_or_init(|| outcome).clone();
        self.inner.state.store(LifecycleState::Stopped as u8, Ordering::SeqCst);
        self.inner.changes.send_replace(LifecycleState::Stopped);
        metrics::record_shutdown(outcome.label());

        let elapsed_ms = started.elapsed().as_millis() as u64;
        match &outcome {
            ShutdownOutcome::Clean => {
                tracing::info!(outcome = "clean", elapsed_ms, "Shutdown complete")
            }
            ShutdownOutcome::Forced { open } => tracing::warn!(
                outcome = "forced",
                open_connections = open,
                elapsed_ms,
                "Grace period elapsed, forcing shutdown"
            ),
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_are_distinct() {
        assert_eq!(ShutdownOutcome::Clean.exit_code(), 0);
        assert_eq!(ShutdownOutcome::Forced { open: 1 }.exit_code(), 1);
    }

    #[test]
    fn transitions_move_forward() {
        let supervisor = Supervisor::new(Duration::from_secs(10));
        assert_eq!(supervisor.state(), LifecycleState::Starting);
        assert!(supervisor.mark_listening());
        assert!(!supervisor.mark_listening());
        assert_eq!(supervisor.state(), LifecycleState::Listening);
    }

    #[test]
    fn begin_drain_is_idempotent() {
        let supervisor = Supervisor::new(Duration::from_secs(10));
        supervisor.mark_listening();
        assert!(supervisor.begin_drain());
        let first = supervisor.inner.drain_started.get().copied();
        assert!(!supervisor.begin_drain());
        assert!(!supervisor.clone().begin_drain());
        assert_eq!(supervisor.inner.drain_started.get().copied(), first);
        assert_eq!(supervisor.state(), LifecycleState::Draining);
    }

    #[test]
    fn signal_while_starting_drains() {
        let supervisor = Supervisor::new(Duration::from_secs(10));
        assert!(supervisor.begin_drain());
        assert!(!supervisor.mark_listening());
        assert_eq!(supervisor.state(), LifecycleState::Draining);
    }

    #[tokio::test]
    async fn clean_drain() {
        let supervisor = Supervisor::new(Duration::from_secs(5));
        supervisor.mark_listening();
        supervisor.begin_drain();

        let outcome = supervisor.drain(async {}).await;
        assert_eq!(outcome, ShutdownOutcome::Clean);
        assert_eq!(supervisor.state(), LifecycleState::Stopped);
        assert_eq!(supervisor.outcome(), Some(ShutdownOutcome::Clean));
    }

    #[tokio::test]
    async fn forced_drain_at_grace_boundary() {
        let grace = Duration::from_millis(200);
        let supervisor = Supervisor::new(grace);
        supervisor.mark_listening();
        let _stuck = supervisor.connections().track();
        supervisor.begin_drain();

        let start = Instant::now();
        let outcome = supervisor.drain(std::future::pending()).await;
        let elapsed = start.elapsed();

        assert_eq!(outcome, ShutdownOutcome::Forced { open: 1 });
        assert!(elapsed >= grace - Duration::from_millis(10), "{elapsed:?}");
        assert!(elapsed < grace + Duration::from_millis(500), "{elapsed:?}");
    }

    #[tokio::test]
    async fn draining_future_wakes_on_drain() {
        let supervisor = Supervisor::new(Duration::from_secs(5));
        supervisor.mark_listening();
        let waiter = tokio::spawn({
            let supervisor = supervisor.clone();
            async move { supervisor.draining().await }
        });
        supervisor.begin_drain();
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
    }
}
