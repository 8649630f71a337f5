use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use orion_error::prelude::*;
use rg_core::{CoreReason, CoreResult, CountService, GroupDefinition, RolloutGroupsValidation};

// ---------------------------------------------------------------------------
// TimeoutCountService: bounds every count call
// ---------------------------------------------------------------------------

/// Wraps a [`CountService`] and fails calls that exceed `timeout`.
///
/// A timed-out call surfaces as a [`CoreReason::CountService`] error, which
/// the coalescer delivers as an invalid result. `None` disables the limit.
pub struct TimeoutCountService {
    inner: Arc<dyn CountService>,
    timeout: Option<Duration>,
}

impl TimeoutCountService {
    pub fn new(inner: Arc<dyn CountService>, timeout: Option<Duration>) -> Self {
        Self { inner, timeout }
    }
}

#[async_trait]
impl CountService for TimeoutCountService {
    async fn count_targets_in_groups(
        &self,
        groups: &[GroupDefinition],
        top_level_filter: &str,
    ) -> CoreResult<RolloutGroupsValidation> {
        let start = Instant::now();
        let call = self.inner.count_targets_in_groups(groups, top_level_filter);
        let result = match self.timeout {
            None => call.await,
            Some(limit) => match tokio::time::timeout(limit, call).await {
                Ok(result) => result,
                Err(_) => StructError::from(CoreReason::CountService)
                    .with_detail(format!("count call timed out after {limit:?}"))
                    .err(),
            },
        };
        match &result {
            Ok(v) => rg_debug!(
                svc,
                groups = groups.len(),
                total = v.total_targets,
                elapsed_ms = start.elapsed().as_millis() as u64,
                "count call complete"
            ),
            Err(e) => rg_warn!(svc, groups = groups.len(), error = %e, "count call failed"),
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Sleepy(Duration);

    #[async_trait]
    impl CountService for Sleepy {
        async fn count_targets_in_groups(
            &self,
            groups: &[GroupDefinition],
            _top_level_filter: &str,
        ) -> CoreResult<RolloutGroupsValidation> {
            tokio::time::sleep(self.0).await;
            Ok(RolloutGroupsValidation {
                targets_per_group: vec![1; groups.len()],
                remaining_targets_valid: true,
                total_targets: groups.len() as u64,
            })
        }
    }

    fn groups() -> Vec<GroupDefinition> {
        vec![GroupDefinition::new("g")]
    }

    #[tokio::test(start_paused = true)]
    async fn passes_through_fast_calls() {
        let svc = TimeoutCountService::new(
            Arc::new(Sleepy(Duration::from_secs(1))),
            Some(Duration::from_secs(10)),
        );
        let v = svc.count_targets_in_groups(&groups(), "").await.unwrap();
        assert_eq!(v.targets_per_group, vec![1]);
    }

    #[tokio::test(start_paused = true)]
    async fn fails_slow_calls() {
        let svc = TimeoutCountService::new(
            Arc::new(Sleepy(Duration::from_secs(3600))),
            Some(Duration::from_secs(10)),
        );
        let err = svc.count_targets_in_groups(&groups(), "").await.unwrap_err();
        assert!(err.to_string().contains("timed out"), "{err}");
    }

    #[tokio::test(start_paused = true)]
    async fn no_limit_waits() {
        let svc = TimeoutCountService::new(Arc::new(Sleepy(Duration::from_secs(3600))), None);
        assert!(svc.count_targets_in_groups(&groups(), "").await.is_ok());
    }
}
