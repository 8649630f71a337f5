use std::sync::Arc;

use async_trait::async_trait;

use crate::error::CoreResult;
use crate::group::GroupDefinition;
use crate::validation::RolloutGroupsValidation;

// ---------------------------------------------------------------------------
// CountService: backend collaborator computing live group sizes
// ---------------------------------------------------------------------------

/// Computes how many targets each group of a definition list would receive.
///
/// Calls are expensive and may complete in any order; callers must not rely
/// on responses arriving in submission order.
#[async_trait]
pub trait CountService: Send + Sync {
    async fn count_targets_in_groups(
        &self,
        groups: &[GroupDefinition],
        top_level_filter: &str,
    ) -> CoreResult<RolloutGroupsValidation>;
}

#[async_trait]
impl<T: CountService + ?Sized> CountService for Arc<T> {
    async fn count_targets_in_groups(
        &self,
        groups: &[GroupDefinition],
        top_level_filter: &str,
    ) -> CoreResult<RolloutGroupsValidation> {
        (**self).count_targets_in_groups(groups, top_level_filter).await
    }
}
