use serde::{Deserialize, Serialize};

use crate::group::GroupDefinition;

/// One validation request: a snapshot of the group list, the rollout's
/// top-level filter, and the generation assigned at submission.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationRequest {
    pub groups: Vec<GroupDefinition>,
    pub top_level_filter: String,
    pub generation: u64,
}

/// Backend answer for one request: per-group target counts, indexed like the
/// request's groups, and whether the groups cover the whole population.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RolloutGroupsValidation {
    pub targets_per_group: Vec<u64>,
    pub remaining_targets_valid: bool,
    /// Population matched by the top-level filter.
    #[serde(default)]
    pub total_targets: u64,
}

impl RolloutGroupsValidation {
    /// The stand-in result for a failed count call.
    pub fn failed() -> Self {
        Self::default()
    }

    /// Target count of group `index`, if the backend reported one.
    pub fn target_count(&self, index: usize) -> Option<u64> {
        self.targets_per_group.get(index).copied()
    }

    /// Sum of all group counts.
    pub fn assigned_targets(&self) -> u64 {
        self.targets_per_group.iter().sum()
    }
}

/// Aggregate validity of a group list as shown to the operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidityStatus {
    Valid,
    Invalid,
    Loading,
}

impl ValidityStatus {
    pub fn is_valid(self) -> bool {
        self == Self::Valid
    }
}

impl std::fmt::Display for ValidityStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Valid => "valid",
            Self::Invalid => "invalid",
            Self::Loading => "loading",
        })
    }
}
