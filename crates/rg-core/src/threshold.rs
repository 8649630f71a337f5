use std::fmt;

use serde::Serialize;

use rg_config::ErrorThreshold;

use crate::group::GroupDefinition;
use crate::quota::Quotas;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Which threshold of a group a range error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ThresholdField {
    Trigger,
    ErrorPercent,
    ErrorCount,
}

impl fmt::Display for ThresholdField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Trigger => "trigger threshold",
            Self::ErrorPercent => "error threshold (percent)",
            Self::ErrorCount => "error threshold (count)",
        })
    }
}

/// Per-group threshold or quota violation. Recoverable: it marks the group,
/// not the session.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ThresholdError {
    #[error("{field} must be within {min}..={max}, got {value}")]
    OutOfRange {
        field: ThresholdField,
        value: u64,
        min: u64,
        max: u64,
    },
    #[error("group exceeds the maximum of {max} targets per group")]
    GroupTooLarge { max: u64 },
    #[error("group size unknown; define a target filter or group count first")]
    GroupSizeUnknown,
}

// ---------------------------------------------------------------------------
// Conversion
// ---------------------------------------------------------------------------

/// Express a count threshold as a percentage of the group:
/// `ceil(count / group_size * 100)`.
///
/// A `group_size` of 0 means the size is not known yet.
pub fn to_percent(count: u64, group_size: u64) -> Result<u64, ThresholdError> {
    if group_size == 0 {
        return Err(ThresholdError::GroupSizeUnknown);
    }
    let scaled = count as u128 * 100;
    let size = group_size as u128;
    Ok(scaled.div_ceil(size).min(u64::MAX as u128) as u64)
}

/// Express a percentage as a count of the group: `ceil(percent * group_size / 100)`.
pub fn to_count(percent: u64, group_size: u64) -> u64 {
    let scaled = percent as u128 * group_size as u128;
    scaled.div_ceil(100).min(u64::MAX as u128) as u64
}

/// The error threshold of a group as a percentage, converting count
/// thresholds against `group_size`.
pub fn error_threshold_percent(
    threshold: ErrorThreshold,
    group_size: u64,
) -> Result<u64, ThresholdError> {
    match threshold {
        ErrorThreshold::Percent(p) => Ok(p as u64),
        ErrorThreshold::Count(c) => to_percent(c, group_size),
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Check a group's thresholds and computed size.
///
/// - trigger threshold and percent error thresholds must be within `0..=100`;
/// - count error thresholds must be within `0..=group_size`, and fail with
///   [`ThresholdError::GroupSizeUnknown`] while the size is 0 (unknown);
/// - `group_size` must not exceed `quotas.max_targets_per_group`.
///
/// The first violation found is returned.
pub fn validate_threshold(
    def: &GroupDefinition,
    group_size: u64,
    quotas: &Quotas,
) -> Result<(), ThresholdError> {
    validate_conditions(def, group_size)?;
    validate_group_size(group_size, quotas)
}

/// Range checks on the trigger and error thresholds only.
pub fn validate_conditions(def: &GroupDefinition, group_size: u64) -> Result<(), ThresholdError> {
    validate_trigger(def)?;
    match def.error_threshold {
        ErrorThreshold::Percent(p) => check_range(ThresholdField::ErrorPercent, p as u64, 100),
        ErrorThreshold::Count(c) => {
            if group_size == 0 {
                return Err(ThresholdError::GroupSizeUnknown);
            }
            check_range(ThresholdField::ErrorCount, c, group_size)
        }
    }
}

/// Range check on the trigger threshold. Needs no group size.
pub fn validate_trigger(def: &GroupDefinition) -> Result<(), ThresholdError> {
    check_range(ThresholdField::Trigger, def.trigger_threshold as u64, 100)
}

/// Quota check on a group's computed target count.
pub fn validate_group_size(group_size: u64, quotas: &Quotas) -> Result<(), ThresholdError> {
    if group_size > quotas.max_targets_per_group {
        return Err(ThresholdError::GroupTooLarge {
            max: quotas.max_targets_per_group,
        });
    }
    Ok(())
}

fn check_range(field: ThresholdField, value: u64, max: u64) -> Result<(), ThresholdError> {
    if value > max {
        return Err(ThresholdError::OutOfRange {
            field,
            value,
            min: 0,
            max,
        });
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
