use serde::{Deserialize, Serialize};

/// Default for `quotas.max_groups_per_rollout`.
pub const DEFAULT_MAX_GROUPS_PER_ROLLOUT: u32 = 500;
/// Default for `quotas.max_targets_per_group`.
pub const DEFAULT_MAX_TARGETS_PER_GROUP: u64 = 20_000;

/// `[quotas]`: tenant limits the rollout definition must respect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct QuotaConfig {
    pub max_groups_per_rollout: u32,
    pub max_targets_per_group: u64,
}

impl Default for QuotaConfig {
    fn default() -> Self {
        Self {
            max_groups_per_rollout: DEFAULT_MAX_GROUPS_PER_ROLLOUT,
            max_targets_per_group: DEFAULT_MAX_TARGETS_PER_GROUP,
        }
    }
}
