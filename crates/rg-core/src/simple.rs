use serde::Serialize;

use rg_config::{GroupDefaults, SizeCheckPolicy};

use crate::allocate::allocate;
use crate::assess::{Assessment, assess};
use crate::error::CoreResult;
use crate::group::GroupDefinition;
use crate::quota::Quotas;
use crate::validation::RolloutGroupsValidation;

/// Group definitions for a simple-mode rollout: `group_count` generated
/// groups sharing the default conditions, with counts from [`allocate`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimplePlan {
    pub total_targets: u64,
    pub groups: Vec<GroupDefinition>,
    pub target_counts: Vec<u64>,
}

impl SimplePlan {
    /// Group `i` (0-based) is named `<prefix><i + 1>` and takes
    /// `100 / (group_count - i)` percent of what the earlier groups left, so
    /// the last group always takes 100%.
    pub fn build(total_targets: i64, group_count: i64, defaults: &GroupDefaults) -> CoreResult<Self> {
        let counts = allocate(total_targets, group_count)?;

        let groups = (0..group_count)
            .map(|i| GroupDefinition {
                name: format!("{}{}", defaults.name_prefix, i + 1),
                description: None,
                target_filter_query: None,
                target_percentage: 100.0 / (group_count - i) as f64,
                trigger_threshold: defaults.trigger_threshold,
                error_threshold: defaults.error_threshold,
            })
            .collect();

        Ok(Self {
            total_targets: total_targets as u64,
            groups,
            target_counts: counts.into_iter().map(|c| c as u64).collect(),
        })
    }

    /// The computed counts in the shape the count service would return.
    pub fn validation(&self) -> RolloutGroupsValidation {
        RolloutGroupsValidation {
            remaining_targets_valid: self.target_counts.iter().sum::<u64>() == self.total_targets,
            targets_per_group: self.target_counts.clone(),
            total_targets: self.total_targets,
        }
    }

    /// Check the generated groups against `quotas`.
    pub fn assess(&self, quotas: &Quotas, policy: SizeCheckPolicy) -> Assessment {
        assess(&self.groups, Some(&self.validation()), quotas, policy)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
