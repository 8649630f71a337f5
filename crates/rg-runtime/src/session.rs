use std::sync::Arc;

use orion_error::op_context;
use orion_error::prelude::*;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use rg_config::{GroupDefaults, RolloutConfig, SizeCheckPolicy};
use rg_core::{
    CountService, GroupDefinition, QuotaProvider, Quotas, RolloutGroupsValidation, SimplePlan,
    assess,
};

use crate::client::TimeoutCountService;
use crate::coalescer::{CoalescerStatus, StatsSnapshot, ValidationCoalescer, ValidationUpdate};
use crate::error::{RuntimeReason, RuntimeResult};

// ---------------------------------------------------------------------------
// DefinitionSession: one rollout being defined
// ---------------------------------------------------------------------------

/// Everything needed while an operator defines the groups of one rollout:
/// the tenant quotas, the group defaults, and a running validation
/// coalescer whose results are queued for [`next_update`](Self::next_update).
///
/// Dropping the session stops the coalescer; [`shutdown`](Self::shutdown)
/// additionally waits for it.
pub struct DefinitionSession {
    coalescer: ValidationCoalescer,
    updates: mpsc::UnboundedReceiver<ValidationUpdate>,
    quotas: Arc<dyn QuotaProvider>,
    group_defaults: GroupDefaults,
    policy: SizeCheckPolicy,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl DefinitionSession {
    /// Start a session with quotas taken from `config.quotas`.
    pub fn start(config: &RolloutConfig, service: Arc<dyn CountService>) -> RuntimeResult<Self> {
        let quotas: Arc<dyn QuotaProvider> = Arc::new(Quotas::from(config.quotas));
        Self::with_quota_provider(config, service, quotas)
    }

    /// Start a session whose quotas come from `quotas`, read afresh for
    /// every validation cycle.
    #[tracing::instrument(name = "session.start", skip_all)]
    pub fn with_quota_provider(
        config: &RolloutConfig,
        service: Arc<dyn CountService>,
        quotas: Arc<dyn QuotaProvider>,
    ) -> RuntimeResult<Self> {
        let mut op = op_context!("definition-session-start").with_auto_log();
        let timeout = config.validation.count_timeout();
        op.record("count_timeout", format!("{timeout:?}").as_str());
        op.record("size_check", format!("{:?}", config.validation.size_check).as_str());

        tokio::runtime::Handle::try_current().map_err(|e| {
            StructError::from(RuntimeReason::Startup)
                .with_detail(format!("definition session needs a tokio runtime: {e}"))
        })?;

        let policy = config.validation.size_check;
        let service: Arc<dyn CountService> = Arc::new(TimeoutCountService::new(service, timeout));
        let cancel = CancellationToken::new();
        let (coalescer, task) = ValidationCoalescer::spawn(
            service,
            Arc::clone(&quotas),
            policy,
            cancel.child_token(),
        );

        let (update_tx, updates) = mpsc::unbounded_channel();
        coalescer.on_validation_update(move |update| {
            // receiver gone means the session is being dropped
            let _ = update_tx.send(update.clone());
        });

        let limits = quotas.quotas();
        rg_info!(
            sys,
            max_groups = limits.max_groups_per_rollout,
            max_targets_per_group = limits.max_targets_per_group,
            policy = ?policy,
            "definition session started"
        );

        op.mark_suc();
        Ok(Self {
            coalescer,
            updates,
            quotas,
            group_defaults: config.group_defaults.clone(),
            policy,
            cancel,
            task: Some(task),
        })
    }

    // -- advanced mode --------------------------------------------------------

    /// Submit the current group list for validation; returns its generation.
    pub fn submit(&self, groups: Vec<GroupDefinition>, top_level_filter: &str) -> u64 {
        self.coalescer.submit(groups, top_level_filter)
    }

    /// Abandon the current validation cycle.
    pub fn cancel(&self) {
        self.coalescer.cancel();
    }

    /// Wait for the next delivered result. `None` once the session stopped.
    pub async fn next_update(&mut self) -> Option<ValidationUpdate> {
        self.updates.recv().await
    }

    /// Submit `groups` and wait for the result of that submission, skipping
    /// any older result still queued.
    ///
    /// An empty list is assessed locally: it cancels the running cycle and
    /// comes back invalid without a count call.
    pub async fn validate(
        &mut self,
        groups: Vec<GroupDefinition>,
        top_level_filter: &str,
    ) -> RuntimeResult<ValidationUpdate> {
        if groups.is_empty() {
            let generation = self.coalescer.submit(Vec::new(), top_level_filter);
            let assessment = assess(&[], None, &self.quotas.quotas(), self.policy);
            return Ok(ValidationUpdate {
                generation,
                validation: RolloutGroupsValidation::failed(),
                assessment,
                transport_error: None,
            });
        }

        let generation = self.coalescer.submit(groups, top_level_filter);
        while let Some(update) = self.updates.recv().await {
            if update.generation >= generation {
                return Ok(update);
            }
            rg_trace!(val, generation = update.generation, "skipping older result");
        }
        StructError::from(RuntimeReason::Shutdown)
            .with_detail(format!("coalescer stopped before delivering generation {generation}"))
            .err()
    }

    // -- simple mode ----------------------------------------------------------

    /// Evenly split `total_targets` into `group_count` generated groups.
    pub fn simple_plan(&self, total_targets: i64, group_count: i64) -> RuntimeResult<SimplePlan> {
        let plan = SimplePlan::build(total_targets, group_count, &self.group_defaults).err_conv()?;
        rg_debug!(
            val,
            total_targets,
            groups = group_count,
            counts = ?plan.target_counts,
            "simple plan built"
        );
        Ok(plan)
    }

    // -- accessors ------------------------------------------------------------

    pub fn quotas(&self) -> Quotas {
        self.quotas.quotas()
    }

    pub fn group_defaults(&self) -> &GroupDefaults {
        &self.group_defaults
    }

    pub fn policy(&self) -> SizeCheckPolicy {
        self.policy
    }

    pub fn status(&self) -> CoalescerStatus {
        self.coalescer.status()
    }

    pub fn watch_status(&self) -> watch::Receiver<CoalescerStatus> {
        self.coalescer.watch_status()
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.coalescer.stats()
    }

    /// Stop the coalescer and wait for its task to finish.
    pub async fn shutdown(mut self) -> RuntimeResult<()> {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            task.await.map_err(|e| {
                StructError::from(RuntimeReason::Shutdown)
                    .with_detail(format!("coalescer join error: {e}"))
            })?;
        }
        let stats = self.coalescer.stats();
        rg_info!(
            sys,
            submitted = stats.submitted,
            delivered = stats.delivered,
            failed = stats.failed,
            "definition session closed"
        );
        Ok(())
    }
}

impl Drop for DefinitionSession {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use rg_config::ErrorThreshold;
    use rg_core::{CoreResult, ValidityStatus};

    use super::*;
    use crate::tracing_init::init_test_tracing;

    /// Every group gets `per_group` targets; the fleet holds exactly that many.
    struct Flat {
        per_group: u64,
        calls: AtomicU64,
    }

    impl Flat {
        fn new(per_group: u64) -> Arc<Self> {
            Arc::new(Self {
                per_group,
                calls: AtomicU64::new(0),
            })
        }
    }

    #[async_trait]
    impl CountService for Flat {
        async fn count_targets_in_groups(
            &self,
            groups: &[GroupDefinition],
            _top_level_filter: &str,
        ) -> CoreResult<RolloutGroupsValidation> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(RolloutGroupsValidation {
                targets_per_group: vec![self.per_group; groups.len()],
                remaining_targets_valid: true,
                total_targets: self.per_group * groups.len() as u64,
            })
        }
    }

    struct Hanging;

    #[async_trait]
    impl CountService for Hanging {
        async fn count_targets_in_groups(
            &self,
            _groups: &[GroupDefinition],
            _top_level_filter: &str,
        ) -> CoreResult<RolloutGroupsValidation> {
            std::future::pending().await
        }
    }

    /// Quotas that can be changed while the session runs.
    struct Adjustable(AtomicU64);

    impl QuotaProvider for Adjustable {
        fn max_rollout_groups_per_rollout(&self) -> u32 {
            500
        }

        fn max_targets_per_rollout_group(&self) -> u64 {
            self.0.load(Ordering::SeqCst)
        }
    }

    fn config() -> RolloutConfig {
        init_test_tracing("debug");
        RolloutConfig::default()
    }

    #[test]
    fn start_requires_runtime() {
        let err = DefinitionSession::start(&RolloutConfig::default(), Flat::new(1))
            .err()
            .expect("start outside a runtime must fail");
        assert!(err.to_string().contains("startup"), "{err}");
    }

    #[tokio::test]
    async fn validate_returns_assessed_result() {
        let svc = Flat::new(5);
        let mut session = DefinitionSession::start(&config(), svc.clone()).unwrap();

        let groups = vec![
            GroupDefinition::new("canary").with_percentage(50.0),
            GroupDefinition::new("rest"),
        ];
        let update = session.validate(groups, "").await.unwrap();
        assert_eq!(update.status(), ValidityStatus::Valid);
        assert_eq!(update.validation.targets_per_group, vec![5, 5]);
        assert_eq!(svc.calls.load(Ordering::SeqCst), 1);
        assert_eq!(session.status().validity, ValidityStatus::Valid);

        session.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn validate_empty_list_is_local_and_invalid() {
        let svc = Flat::new(5);
        let mut session = DefinitionSession::start(&config(), svc.clone()).unwrap();

        let update = session.validate(Vec::new(), "").await.unwrap();
        assert_eq!(update.status(), ValidityStatus::Invalid);
        assert!(!update.assessment.list_errors.is_empty());
        assert_eq!(svc.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn validate_skips_older_results() {
        let svc = Flat::new(2);
        let mut session = DefinitionSession::start(&config(), svc).unwrap();

        let first = session.submit(vec![GroupDefinition::new("a")], "");
        let update = session.validate(vec![GroupDefinition::new("b")], "").await.unwrap();
        assert!(update.generation > first);
        assert_eq!(update.assessment.groups[0].name, "b");
    }

    #[tokio::test]
    async fn quotas_are_read_per_cycle() {
        let svc = Flat::new(50);
        let quotas = Arc::new(Adjustable(AtomicU64::new(100)));
        let mut session =
            DefinitionSession::with_quota_provider(&config(), svc, quotas.clone()).unwrap();

        let groups = vec![GroupDefinition::new("a")];
        let ok = session.validate(groups.clone(), "").await.unwrap();
        assert_eq!(ok.status(), ValidityStatus::Valid);

        quotas.0.store(10, Ordering::SeqCst);
        let too_big = session.validate(groups, "").await.unwrap();
        assert_eq!(too_big.status(), ValidityStatus::Invalid);
        assert!(too_big.assessment.groups[0].threshold_error.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn count_timeout_is_applied() {
        let mut cfg = config();
        cfg.validation.count_timeout = Duration::from_secs(2).into();
        let mut session = DefinitionSession::start(&cfg, Arc::new(Hanging)).unwrap();

        let update = session.validate(vec![GroupDefinition::new("a")], "").await.unwrap();
        assert_eq!(update.status(), ValidityStatus::Invalid);
        let err = update.transport_error.unwrap();
        assert!(err.contains("timed out"), "{err}");
        assert_eq!(session.stats().failed, 1);
    }

    #[tokio::test]
    async fn simple_plan_uses_group_defaults() {
        let mut cfg = config();
        cfg.group_defaults.name_prefix = "wave".into();
        cfg.group_defaults.error_threshold = ErrorThreshold::Percent(10);
        let session = DefinitionSession::start(&cfg, Flat::new(1)).unwrap();

        let plan = session.simple_plan(100, 3).unwrap();
        assert_eq!(plan.target_counts, vec![33, 34, 33]);
        assert_eq!(plan.groups[2].name, "wave3");
        assert_eq!(plan.groups[0].error_threshold, ErrorThreshold::Percent(10));

        let err = session.simple_plan(10, 0).unwrap_err();
        assert!(err.to_string().contains("group count"), "{err}");
    }

    #[tokio::test]
    async fn next_update_ends_after_shutdown_of_coalescer() {
        let mut session = DefinitionSession::start(&config(), Flat::new(1)).unwrap();
        session.cancel.cancel();
        let next = tokio::time::timeout(Duration::from_secs(5), session.next_update())
            .await
            .unwrap();
        assert!(next.is_none());
        let err = session
            .validate(vec![GroupDefinition::new("a")], "")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("shutdown"), "{err}");
    }
}
