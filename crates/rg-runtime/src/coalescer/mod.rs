//! Single-flight validation of advanced group definitions.
//!
//! The coalescer owns one actor task. Callers submit group-list snapshots
//! without waiting; the actor keeps at most one count-service call
//! outstanding, collapses submissions that arrive meanwhile into the latest
//! one, and hands observers only the result for the newest submission.
//!
//! ```text
//!   Idle ──submit──▶ InFlight ──submit──▶ InFlightWithPending
//!    ▲                  │                        │
//!    └──── complete ────┘◀──── complete ─────────┘ (stale result dropped,
//!                                                   latest snapshot issued)
//! ```

mod task;


use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use rg_config::SizeCheckPolicy;
use rg_core::{
    Assessment, CountService, GroupDefinition, QuotaProvider, RolloutGroupsValidation,
    ValidationRequest, ValidityStatus,
};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use task::{Command, CoalescerTask};

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// Observer callback, invoked on the actor task for every delivered result.
pub type UpdateCallback = Arc<dyn Fn(&ValidationUpdate) + Send + Sync>;

/// Result of one validation cycle as handed to observers.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationUpdate {
    pub generation: u64,
    pub validation: RolloutGroupsValidation,
    pub assessment: Assessment,
    /// Set when the count call failed; the update is then `Invalid`.
    pub transport_error: Option<String>,
}

impl ValidationUpdate {
    pub fn status(&self) -> ValidityStatus {
        self.assessment.status
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoalescerState {
    Idle,
    InFlight,
    InFlightWithPending,
}

impl fmt::Display for CoalescerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Idle => "idle",
            Self::InFlight => "in_flight",
            Self::InFlightWithPending => "in_flight_with_pending",
        })
    }
}

/// Snapshot published on every state change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoalescerStatus {
    pub state: CoalescerState,
    /// `Loading` while not idle. `Invalid` before the first submission and
    /// after a cancel.
    pub validity: ValidityStatus,
    /// Latest generation submitted.
    pub generation: u64,
    /// Generation of the last result handed to observers.
    pub delivered: Option<u64>,
}

impl Default for CoalescerStatus {
    fn default() -> Self {
        Self {
            state: CoalescerState::Idle,
            validity: ValidityStatus::Invalid,
            generation: 0,
            delivered: None,
        }
    }
}

/// Lifetime counters of one coalescer.
#[derive(Debug, Default)]
pub struct CoalescerStats {
    submitted: AtomicU64,
    issued: AtomicU64,
    superseded: AtomicU64,
    dropped: AtomicU64,
    delivered: AtomicU64,
    failed: AtomicU64,
}

/// Plain copy of [`CoalescerStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    /// Submissions received, including empty ones.
    pub submitted: u64,
    /// Count-service calls started.
    pub issued: u64,
    /// Submissions or results replaced by a newer submission.
    pub superseded: u64,
    /// Results discarded because their cycle was cancelled.
    pub dropped: u64,
    /// Results handed to observers.
    pub delivered: u64,
    /// Delivered results whose count call failed.
    pub failed: u64,
}

impl CoalescerStats {
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            submitted: self.submitted.load(Ordering::Relaxed),
            issued: self.issued.load(Ordering::Relaxed),
            superseded: self.superseded.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            delivered: self.delivered.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }

    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

// ---------------------------------------------------------------------------
// ValidationCoalescer: handle to the actor
// ---------------------------------------------------------------------------

/// Handle to a running coalescer actor. Dropping every handle, or cancelling
/// the token passed to [`ValidationCoalescer::spawn`], stops the actor.
pub struct ValidationCoalescer {
    cmd_tx: mpsc::UnboundedSender<Command>,
    status_rx: watch::Receiver<CoalescerStatus>,
    stats: Arc<CoalescerStats>,
    next_generation: AtomicU64,
}

impl ValidationCoalescer {
    /// Spawn the actor on the current tokio runtime.
    pub fn spawn(
        service: Arc<dyn CountService>,
        quotas: Arc<dyn QuotaProvider>,
        policy: SizeCheckPolicy,
        cancel: CancellationToken,
    ) -> (Self, JoinHandle<()>) {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (status_tx, status_rx) = watch::channel(CoalescerStatus::default());
        let stats = Arc::new(CoalescerStats::default());

        let task = CoalescerTask::new(
            cmd_rx,
            service,
            quotas,
            policy,
            cancel,
            status_tx,
            Arc::clone(&stats),
        );
        let handle = tokio::spawn(task.run());

        let coalescer = Self {
            cmd_tx,
            status_rx,
            stats,
            next_generation: AtomicU64::new(1),
        };
        (coalescer, handle)
    }

    /// Queue a snapshot for validation and return its generation. Never
    /// waits; an empty list cancels the current cycle.
    pub fn submit(&self, groups: Vec<GroupDefinition>, top_level_filter: impl Into<String>) -> u64 {
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        let request = ValidationRequest {
            groups,
            top_level_filter: top_level_filter.into(),
            generation,
        };
        // a closed channel means the actor is gone; nothing left to notify
        let _ = self.cmd_tx.send(Command::Submit(request));
        generation
    }

    /// Abandon the current cycle and mark the list `Invalid`. An outstanding
    /// call is left to finish and its result is dropped.
    pub fn cancel(&self) {
        let _ = self.cmd_tx.send(Command::Cancel);
    }

    /// Register an observer for delivered results.
    pub fn on_validation_update<F>(&self, callback: F)
    where
        F: Fn(&ValidationUpdate) + Send + Sync + 'static,
    {
        let _ = self.cmd_tx.send(Command::Register(Arc::new(callback)));
    }

    pub fn status(&self) -> CoalescerStatus {
        *self.status_rx.borrow()
    }

    pub fn watch_status(&self) -> watch::Receiver<CoalescerStatus> {
        self.status_rx.clone()
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }
}
