use std::sync::Arc;

use orion_error::prelude::*;
use rg_config::SizeCheckPolicy;
use rg_core::{
    CoreReason, CoreResult, CountService, QuotaProvider, RolloutGroupsValidation,
    ValidationRequest, ValidityStatus, assess,
};
use tokio::sync::{mpsc, watch};
use tokio::task::{JoinError, JoinSet};
use tokio_util::sync::CancellationToken;

use super::{
    CoalescerState, CoalescerStats, CoalescerStatus, UpdateCallback, ValidationUpdate,
};

pub(super) enum Command {
    Submit(ValidationRequest),
    Cancel,
    Register(UpdateCallback),
}

type CallOutcome = (u64, CoreResult<RolloutGroupsValidation>);

// ---------------------------------------------------------------------------
// CoalescerTask: sole owner of all coalescer state
// ---------------------------------------------------------------------------

pub(super) struct CoalescerTask {
    cmd_rx: mpsc::UnboundedReceiver<Command>,
    service: Arc<dyn CountService>,
    quotas: Arc<dyn QuotaProvider>,
    policy: SizeCheckPolicy,
    cancel: CancellationToken,
    status_tx: watch::Sender<CoalescerStatus>,
    stats: Arc<CoalescerStats>,
    observers: Vec<UpdateCallback>,

    /// Holds at most one call.
    calls: JoinSet<CallOutcome>,
    /// Generation of the call in `calls`, stale or not.
    outstanding: Option<u64>,
    /// Request whose result will be delivered; cleared by cancel.
    active: Option<ValidationRequest>,
    /// Latest snapshot submitted while a call was outstanding.
    pending: Option<ValidationRequest>,
    latest_generation: u64,
    delivered: Option<u64>,
    validity: ValidityStatus,
}

impl CoalescerTask {
    pub(super) fn new(
        cmd_rx: mpsc::UnboundedReceiver<Command>,
        service: Arc<dyn CountService>,
        quotas: Arc<dyn QuotaProvider>,
        policy: SizeCheckPolicy,
        cancel: CancellationToken,
        status_tx: watch::Sender<CoalescerStatus>,
        stats: Arc<CoalescerStats>,
    ) -> Self {
        Self {
            cmd_rx,
            service,
            quotas,
            policy,
            cancel,
            status_tx,
            stats,
            observers: Vec::new(),
            calls: JoinSet::new(),
            outstanding: None,
            active: None,
            pending: None,
            latest_generation: 0,
            delivered: None,
            validity: ValidityStatus::Invalid,
        }
    }

    /// Run until the token is cancelled or every handle is dropped.
    ///
    /// Commands are polled before completions so that a burst of submissions
    /// queued behind a finishing call collapses into one follow-up call.
    #[tracing::instrument(name = "coalescer", skip_all)]
    pub(super) async fn run(mut self) {
        rg_debug!(sys, policy = ?self.policy, "coalescer started");
        loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                cmd = self.cmd_rx.recv() => match cmd {
                    Some(cmd) => self.handle_command(cmd),
                    None => break,
                },
                Some(joined) = self.calls.join_next(), if !self.calls.is_empty() => {
                    self.handle_completion(joined);
                }
            }
        }
        // dropping the JoinSet aborts a call still outstanding
        let stats = self.stats.snapshot();
        rg_debug!(
            sys,
            submitted = stats.submitted,
            issued = stats.issued,
            delivered = stats.delivered,
            "coalescer stopped"
        );
    }

    // -- commands -------------------------------------------------------------

    fn handle_command(&mut self, cmd: Command) {
        match cmd {
            Command::Submit(request) => self.handle_submit(request),
            Command::Cancel => {
                self.reset(ValidityStatus::Invalid);
                rg_debug!(val, generation = self.latest_generation, "validation cancelled");
            }
            Command::Register(callback) => self.observers.push(callback),
        }
    }

    fn handle_submit(&mut self, request: ValidationRequest) {
        CoalescerStats::bump(&self.stats.submitted);
        let generation = request.generation;
        if generation <= self.latest_generation {
            // raced past by a newer submission from another thread
            CoalescerStats::bump(&self.stats.superseded);
            return;
        }
        self.latest_generation = generation;

        if request.groups.is_empty() {
            self.reset(ValidityStatus::Invalid);
            rg_debug!(val, generation, "empty group list, validation cancelled");
            return;
        }

        if self.outstanding.is_none() {
            self.issue(request);
        } else {
            if let Some(older) = self.pending.replace(request) {
                rg_debug!(val, generation = older.generation, "pending submission superseded");
                CoalescerStats::bump(&self.stats.superseded);
            }
            rg_debug!(val, generation, "submission queued behind outstanding call");
        }
        self.validity = ValidityStatus::Loading;
        self.publish();
    }

    /// Forget the current cycle. An outstanding call keeps `outstanding` set
    /// so that no second call starts before it returns.
    fn reset(&mut self, validity: ValidityStatus) {
        self.active = None;
        if self.pending.take().is_some() {
            CoalescerStats::bump(&self.stats.superseded);
        }
        self.validity = validity;
        self.publish();
    }

    // -- calls ----------------------------------------------------------------

    fn issue(&mut self, request: ValidationRequest) {
        let service = Arc::clone(&self.service);
        let groups = request.groups.clone();
        let filter = request.top_level_filter.clone();
        let generation = request.generation;

        self.calls.spawn(async move {
            let result = service.count_targets_in_groups(&groups, &filter).await;
            (generation, result)
        });
        self.outstanding = Some(generation);
        self.active = Some(request);
        CoalescerStats::bump(&self.stats.issued);
        rg_debug!(val, generation, "count call issued");
    }

    fn handle_completion(&mut self, joined: Result<CallOutcome, JoinError>) {
        let Some(call_generation) = self.outstanding.take() else {
            return;
        };
        let (generation, result) = match joined {
            Ok(outcome) => outcome,
            Err(e) => {
                let err = StructError::from(CoreReason::CountService)
                    .with_detail(format!("count call aborted: {e}"));
                (call_generation, Err(err))
            }
        };

        if let Some(next) = self.pending.take() {
            if self.active.is_some() {
                CoalescerStats::bump(&self.stats.superseded);
                rg_debug!(val, generation, "stale result superseded");
            } else {
                CoalescerStats::bump(&self.stats.dropped);
            }
            self.issue(next);
            self.publish();
            return;
        }

        match self.active.take() {
            Some(request) if request.generation == generation => self.deliver(request, result),
            _ => {
                CoalescerStats::bump(&self.stats.dropped);
                rg_debug!(val, generation, "result of cancelled cycle dropped");
                self.publish();
            }
        }
    }

    fn deliver(&mut self, request: ValidationRequest, result: CoreResult<RolloutGroupsValidation>) {
        let quotas = self.quotas.quotas();
        let (validation, transport_error) = match result {
            Ok(v) => (v, None),
            Err(e) => {
                CoalescerStats::bump(&self.stats.failed);
                (RolloutGroupsValidation::failed(), Some(e.to_string()))
            }
        };
        let mut assessment = assess(&request.groups, Some(&validation), &quotas, self.policy);
        if transport_error.is_some() {
            assessment.status = ValidityStatus::Invalid;
        }

        let update = ValidationUpdate {
            generation: request.generation,
            validation,
            assessment,
            transport_error,
        };
        for observer in &self.observers {
            observer(&update);
        }
        CoalescerStats::bump(&self.stats.delivered);
        rg_debug!(
            val,
            generation = update.generation,
            status = %update.status(),
            "validation delivered"
        );

        self.delivered = Some(update.generation);
        self.validity = update.status();
        self.publish();
    }

    // -- status ---------------------------------------------------------------

    /// A stale call left over from a cancelled cycle does not count as
    /// in flight.
    fn state(&self) -> CoalescerState {
        match (&self.active, &self.pending) {
            (_, Some(_)) => CoalescerState::InFlightWithPending,
            (Some(_), None) => CoalescerState::InFlight,
            (None, None) => CoalescerState::Idle,
        }
    }

    fn publish(&self) {
        let state = self.state();
        let validity = match state {
            CoalescerState::Idle => self.validity,
            _ => ValidityStatus::Loading,
        };
        self.status_tx.send_replace(CoalescerStatus {
            state,
            validity,
            generation: self.latest_generation,
            delivered: self.delivered,
        });
    }
}
