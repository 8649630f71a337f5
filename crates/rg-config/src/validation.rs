use std::time::Duration;

use serde::Deserialize;

use crate::types::{HumanDuration, SizeCheckPolicy};

/// `[validation]`: behaviour of the advanced-mode validation cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    /// Client-side timeout applied to each count-service call. `"0s"` disables it.
    pub count_timeout: HumanDuration,
    /// Whether the last group's size check is masked by its remaining-targets error.
    pub size_check: SizeCheckPolicy,
}

impl ValidationConfig {
    /// The effective count timeout, `None` when disabled.
    pub fn count_timeout(&self) -> Option<Duration> {
        if self.count_timeout.is_zero() {
            None
        } else {
            Some(self.count_timeout.as_duration())
        }
    }
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            count_timeout: HumanDuration::from(Duration::from_secs(10)),
            size_check: SizeCheckPolicy::MaskLastGroup,
        }
    }
}
