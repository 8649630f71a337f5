use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::types::ErrorThreshold;
use crate::validate;

// ---------------------------------------------------------------------------
// Raw TOML structure
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct RolloutPlanRaw {
    #[serde(default)]
    target_filter: String,
    #[serde(default)]
    fleet: Option<PathBuf>,
    #[serde(default)]
    simple: Option<SimpleSection>,
    #[serde(default, rename = "group")]
    groups: Vec<GroupEntry>,
}

#[derive(Debug, Deserialize)]
struct SimpleSection {
    groups: u32,
}

// ---------------------------------------------------------------------------
// Plan types
// ---------------------------------------------------------------------------

/// One `[[group]]` entry of an advanced-mode plan.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct GroupEntry {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Narrows the rollout's top-level filter for this group.
    #[serde(default)]
    pub target_filter: Option<String>,
    #[serde(default = "default_percentage")]
    pub target_percentage: f64,
    /// Falls back to `[group_defaults]` when unset.
    #[serde(default)]
    pub trigger_threshold: Option<u32>,
    /// Falls back to `[group_defaults]` when unset.
    #[serde(default)]
    pub error_threshold: Option<ErrorThreshold>,
}

fn default_percentage() -> f64 {
    100.0
}

/// Group-definition mode of a plan.
#[derive(Debug, Clone, PartialEq)]
pub enum PlanMode {
    /// Even split into `groups` generated groups.
    Simple { groups: u32 },
    /// Operator-defined groups, in rollout order.
    Advanced(Vec<GroupEntry>),
}

/// A rollout definition read from `plan.toml`.
#[derive(Debug, Clone, PartialEq)]
pub struct RolloutPlan {
    /// Top-level target filter; blank selects every target.
    pub target_filter: String,
    /// Fleet data file. Resolved against the plan's directory by [`RolloutPlan::load`].
    pub fleet: Option<PathBuf>,
    pub mode: PlanMode,
}

impl RolloutPlan {
    /// Read and parse a plan file, resolving a relative `fleet` path against
    /// the plan's parent directory.
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("failed to read {}: {e}", path.display()))?;
        let mut plan: RolloutPlan = content.parse()?;
        if let (Some(fleet), Some(base)) = (plan.fleet.as_mut(), path.parent()) {
            if fleet.is_relative() {
                *fleet = base.join(&*fleet);
            }
        }
        Ok(plan)
    }
}

impl FromStr for RolloutPlan {
    type Err = anyhow::Error;

    fn from_str(toml_str: &str) -> anyhow::Result<Self> {
        let raw: RolloutPlanRaw = toml::from_str(toml_str)?;

        let mode = match (raw.simple, raw.groups.is_empty()) {
            (Some(_), false) => {
                anyhow::bail!("plan must use either [simple] or [[group]] entries, not both")
            }
            (Some(simple), true) => PlanMode::Simple {
                groups: simple.groups,
            },
            (None, _) => PlanMode::Advanced(raw.groups),
        };

        let plan = RolloutPlan {
            target_filter: raw.target_filter.trim().to_string(),
            fleet: raw.fleet,
            mode,
        };

        validate::validate_plan(&plan)?;

        Ok(plan)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
