use serde::{Deserialize, Serialize};

use rg_config::QuotaConfig;

/// Source of the tenant quotas a rollout definition is checked against.
///
/// Implementations may consult a remote tenant configuration; callers read
/// the values once per validation cycle via [`QuotaProvider::quotas`].
pub trait QuotaProvider: Send + Sync {
    fn max_rollout_groups_per_rollout(&self) -> u32;
    fn max_targets_per_rollout_group(&self) -> u64;

    /// Snapshot both limits.
    fn quotas(&self) -> Quotas {
        Quotas {
            max_groups_per_rollout: self.max_rollout_groups_per_rollout(),
            max_targets_per_group: self.max_targets_per_rollout_group(),
        }
    }
}

/// Fixed quota values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quotas {
    pub max_groups_per_rollout: u32,
    pub max_targets_per_group: u64,
}

impl Default for Quotas {
    fn default() -> Self {
        QuotaConfig::default().into()
    }
}

impl From<QuotaConfig> for Quotas {
    fn from(cfg: QuotaConfig) -> Self {
        Self {
            max_groups_per_rollout: cfg.max_groups_per_rollout,
            max_targets_per_group: cfg.max_targets_per_group,
        }
    }
}

impl QuotaProvider for Quotas {
    fn max_rollout_groups_per_rollout(&self) -> u32 {
        self.max_groups_per_rollout
    }

    fn max_targets_per_rollout_group(&self) -> u64 {
        self.max_targets_per_group
    }

    fn quotas(&self) -> Quotas {
        *self
    }
}
