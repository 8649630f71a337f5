use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use orion_error::prelude::*;
use serde::{Deserialize, Serialize};

use crate::count::CountService;
use crate::error::{CoreReason, CoreResult};
use crate::filter::TargetFilter;
use crate::group::{GroupDefinition, is_valid_percentage};
use crate::validation::RolloutGroupsValidation;

// ---------------------------------------------------------------------------
// Target
// ---------------------------------------------------------------------------

/// One device of the fleet, as far as target filters can see it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Target {
    #[serde(alias = "id", alias = "controllerId")]
    pub controller_id: String,
    /// Display name; falls back to the controller id when blank.
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
}

impl Target {
    pub fn new(controller_id: impl Into<String>) -> Self {
        Self {
            controller_id: controller_id.into(),
            name: String::new(),
            tags: Vec::new(),
            attributes: BTreeMap::new(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    pub fn display_name(&self) -> &str {
        if self.name.is_empty() {
            &self.controller_id
        } else {
            &self.name
        }
    }

    /// Attribute value by key, ignoring ASCII case.
    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }
}

// ---------------------------------------------------------------------------
// Fleet
// ---------------------------------------------------------------------------

/// In-memory target population.
#[derive(Debug, Clone, Default)]
pub struct Fleet {
    targets: Vec<Target>,
}

impl Fleet {
    /// Build a fleet, rejecting blank or duplicate controller ids.
    pub fn new(targets: Vec<Target>) -> CoreResult<Self> {
        let mut seen = HashSet::with_capacity(targets.len());
        for t in &targets {
            if t.controller_id.trim().is_empty() {
                return StructError::from(CoreReason::FleetData)
                    .with_detail("target with blank controller id")
                    .err();
            }
            if !seen.insert(t.controller_id.as_str()) {
                return StructError::from(CoreReason::FleetData)
                    .with_detail(format!("duplicate controller id '{}'", t.controller_id))
                    .err();
            }
        }
        Ok(Self { targets })
    }

    /// Parse JSON Lines, one target object per line. Blank lines are skipped.
    pub fn from_jsonl(content: &str) -> CoreResult<Self> {
        let mut targets = Vec::new();
        for (lineno, line) in content.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let target: Target = serde_json::from_str(line).map_err(|e| {
                StructError::from(CoreReason::FleetData)
                    .with_detail(format!("line {}: {e}", lineno + 1))
            })?;
            targets.push(target);
        }
        Self::new(targets)
    }

    pub fn load(path: impl AsRef<Path>) -> CoreResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            StructError::from(CoreReason::FleetData)
                .with_detail(format!("failed to read {}: {e}", path.display()))
        })?;
        Self::from_jsonl(&content)
    }

    pub fn targets(&self) -> &[Target] {
        &self.targets
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    pub fn count(&self, filter: &TargetFilter) -> u64 {
        if filter.is_match_all() {
            return self.targets.len() as u64;
        }
        self.targets.iter().filter(|t| filter.matches(t)).count() as u64
    }
}

// ---------------------------------------------------------------------------
// FleetCountService: CountService over an in-memory fleet
// ---------------------------------------------------------------------------

/// Computes group sizes by evaluating filters against a [`Fleet`].
///
/// Groups consume the population in order. A group's share is its
/// percentage of the targets it matches that no earlier group matched; when
/// its filter overlaps earlier groups, the targets those groups left unused
/// are added back to its candidates.
#[derive(Debug, Clone)]
pub struct FleetCountService {
    fleet: Arc<Fleet>,
}

impl FleetCountService {
    pub fn new(fleet: impl Into<Arc<Fleet>>) -> Self {
        Self {
            fleet: fleet.into(),
        }
    }

    pub fn fleet(&self) -> &Fleet {
        &self.fleet
    }

    /// Synchronous form of [`CountService::count_targets_in_groups`].
    pub fn count_groups(
        &self,
        groups: &[GroupDefinition],
        top_level_filter: &str,
    ) -> CoreResult<RolloutGroupsValidation> {
        for g in groups {
            if !is_valid_percentage(g.target_percentage) {
                return StructError::from(CoreReason::InvalidInput)
                    .with_detail(format!(
                        "group '{}': target percentage must be within (0, 100], got {}",
                        g.name, g.target_percentage
                    ))
                    .err();
            }
        }

        let targets = self.fleet.targets();
        let base = TargetFilter::parse(top_level_filter)?;
        let in_base: Vec<bool> = targets.iter().map(|t| base.matches(t)).collect();
        let total_targets = in_base.iter().filter(|m| **m).count() as u64;

        // match vectors per distinct group query
        let mut own_matches: HashMap<&str, Vec<bool>> = HashMap::new();
        let mut covered = vec![false; targets.len()];
        let mut unused: u64 = 0;
        let mut counts = Vec::with_capacity(groups.len());

        for group in groups {
            let own = match group.filter_query() {
                None => None,
                Some(q) => {
                    if !own_matches.contains_key(q) {
                        let filter = TargetFilter::parse(q)?;
                        own_matches.insert(q, targets.iter().map(|t| filter.matches(t)).collect());
                    }
                    own_matches.get(q)
                }
            };

            let mut in_filter: u64 = 0;
            let mut overlap: u64 = 0;
            for (idx, member) in in_base.iter().enumerate() {
                let effective = *member && own.is_none_or(|m| m[idx]);
                if effective {
                    in_filter += 1;
                    if covered[idx] {
                        overlap += 1;
                    }
                    covered[idx] = true;
                }
            }

            let real = if overlap > 0 {
                in_filter - overlap + unused
            } else {
                in_filter
            };
            let reduced = round_half_up(group.target_percentage / 100.0 * real as f64).min(real);
            unused += real - reduced;
            counts.push(reduced);
        }

        let assigned: u64 = counts.iter().sum();
        Ok(RolloutGroupsValidation {
            targets_per_group: counts,
            remaining_targets_valid: assigned == total_targets,
            total_targets,
        })
    }
}

#[async_trait]
impl CountService for FleetCountService {
    async fn count_targets_in_groups(
        &self,
        groups: &[GroupDefinition],
        top_level_filter: &str,
    ) -> CoreResult<RolloutGroupsValidation> {
        self.count_groups(groups, top_level_filter)
    }
}

fn round_half_up(value: f64) -> u64 {
    (value + 0.5).floor().max(0.0) as u64
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
