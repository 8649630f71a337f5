use serde::{Deserialize, Serialize};

use crate::types::ErrorThreshold;

/// `[group_defaults]`: conditions applied to generated (simple mode) groups
/// and to plan entries that leave a threshold unset.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct GroupDefaults {
    /// Prefix for generated group names; the 1-based index is appended.
    pub name_prefix: String,
    /// Percent of a group that must finish before the next group starts.
    pub trigger_threshold: u32,
    /// Failures in a group that abort the rollout.
    pub error_threshold: ErrorThreshold,
}

impl Default for GroupDefaults {
    fn default() -> Self {
        Self {
            name_prefix: "group-".to_string(),
            trigger_threshold: 100,
            error_threshold: ErrorThreshold::Percent(50),
        }
    }
}
