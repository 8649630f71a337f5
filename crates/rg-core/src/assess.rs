use serde::Serialize;

use rg_config::{ErrorThreshold, SizeCheckPolicy};

use crate::group::{FieldError, GroupDefinition};
use crate::quota::Quotas;
use crate::threshold::{self, ThresholdError};
use crate::validation::{RolloutGroupsValidation, ValidityStatus};

// ---------------------------------------------------------------------------
// Findings
// ---------------------------------------------------------------------------

/// Errors that concern the group list as a whole.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ListError {
    #[error("at least one group is required")]
    Empty,
    #[error("{count} groups exceed the maximum of {max} groups per rollout")]
    TooManyGroups { max: u32, count: usize },
}

/// Carried by the last group when coverage of the top-level filter's
/// targets is not confirmed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RemainingTargetsError {
    #[error(
        "groups cover {assigned} of {total} targets; the last group must take all remaining targets"
    )]
    Uncovered { assigned: u64, total: u64 },
    /// The count call failed, so coverage is unknown.
    #[error("target counts unavailable; coverage could not be checked")]
    CountsUnavailable,
}

/// Everything found wrong with one group.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupFinding {
    pub index: usize,
    pub name: String,
    /// Backend count for the group; `None` while unknown.
    pub target_count: Option<u64>,
    /// The error threshold as a percentage of `target_count`; `None` while
    /// the count is unknown or zero.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_threshold_percent: Option<u64>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub field_errors: Vec<FieldError>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub threshold_error: Option<ThresholdError>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remaining_targets_error: Option<RemainingTargetsError>,
}

impl GroupFinding {
    pub fn is_ok(&self) -> bool {
        self.field_errors.is_empty()
            && self.threshold_error.is_none()
            && self.remaining_targets_error.is_none()
    }
}

/// Aggregate verdict over a group list and its latest count result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Assessment {
    pub status: ValidityStatus,
    pub groups: Vec<GroupFinding>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub list_errors: Vec<ListError>,
}

impl Assessment {
    pub fn is_valid(&self) -> bool {
        self.status.is_valid()
    }

    /// Human-readable lines for every error, group errors prefixed with the
    /// group name.
    pub fn error_messages(&self) -> Vec<String> {
        let mut out: Vec<String> = self.list_errors.iter().map(|e| e.to_string()).collect();
        for g in &self.groups {
            let label = if g.name.trim().is_empty() {
                format!("group #{}", g.index + 1)
            } else {
                format!("group '{}'", g.name)
            };
            out.extend(g.field_errors.iter().map(|e| format!("{label}: {e}")));
            if let Some(e) = &g.threshold_error {
                out.push(format!("{label}: {e}"));
            }
            if let Some(e) = &g.remaining_targets_error {
                out.push(format!("{label}: {e}"));
            }
        }
        out
    }
}

// ---------------------------------------------------------------------------
// Assessment
// ---------------------------------------------------------------------------

/// Combine field checks, threshold checks and the latest count result into
/// one verdict.
///
/// Without a count result only size-independent checks run; the status is
/// `Invalid` if one of them fails and `Loading` otherwise. With a result the
/// list is `Valid` only when nothing fails and the groups cover the whole
/// population.
///
/// Under [`SizeCheckPolicy::MaskLastGroup`] the last group's quota check is
/// skipped while it carries the remaining-targets error.
pub fn assess(
    groups: &[GroupDefinition],
    validation: Option<&RolloutGroupsValidation>,
    quotas: &Quotas,
    policy: SizeCheckPolicy,
) -> Assessment {
    let mut list_errors = Vec::new();
    if groups.is_empty() {
        list_errors.push(ListError::Empty);
    } else if groups.len() > quotas.max_groups_per_rollout as usize {
        list_errors.push(ListError::TooManyGroups {
            max: quotas.max_groups_per_rollout,
            count: groups.len(),
        });
    }

    let last = groups.len().saturating_sub(1);
    let findings: Vec<GroupFinding> = groups
        .iter()
        .enumerate()
        .map(|(index, def)| {
            let target_count = validation.and_then(|v| v.target_count(index));
            let remaining_targets_error = match validation {
                Some(v) if index == last && !v.remaining_targets_valid => {
                    Some(if v.targets_per_group.is_empty() {
                        RemainingTargetsError::CountsUnavailable
                    } else {
                        RemainingTargetsError::Uncovered {
                            assigned: v.assigned_targets(),
                            total: v.total_targets,
                        }
                    })
                }
                _ => None,
            };
            let masked =
                policy == SizeCheckPolicy::MaskLastGroup && remaining_targets_error.is_some();
            let threshold_error = match validation {
                None => check_without_count(def),
                Some(_) => check_with_count(def, target_count.unwrap_or(0), quotas, masked),
            };
            let error_threshold_percent = target_count
                .and_then(|size| threshold::error_threshold_percent(def.error_threshold, size).ok());
            GroupFinding {
                index,
                name: def.name.clone(),
                target_count,
                error_threshold_percent,
                field_errors: def.field_errors(),
                threshold_error,
                remaining_targets_error,
            }
        })
        .collect();

    let all_ok = list_errors.is_empty() && findings.iter().all(GroupFinding::is_ok);
    let status = match (validation, all_ok) {
        (_, false) => ValidityStatus::Invalid,
        (None, true) => ValidityStatus::Loading,
        (Some(_), true) => ValidityStatus::Valid,
    };

    Assessment {
        status,
        groups: findings,
        list_errors,
    }
}

fn check_without_count(def: &GroupDefinition) -> Option<ThresholdError> {
    match def.error_threshold {
        // count ranges need the group size
        ErrorThreshold::Count(_) => threshold::validate_trigger(def).err(),
        ErrorThreshold::Percent(_) => threshold::validate_conditions(def, 0).err(),
    }
}

fn check_with_count(
    def: &GroupDefinition,
    size: u64,
    quotas: &Quotas,
    masked: bool,
) -> Option<ThresholdError> {
    if masked {
        threshold::validate_conditions(def, size).err()
    } else {
        threshold::validate_threshold(def, size, quotas).err()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
