use crate::plan::{PlanMode, RolloutPlan};
use crate::rollout::RolloutConfig;
use crate::types::ErrorThreshold;

/// Internal validation, called automatically during `RolloutConfig::from_str` / `load`.
pub(crate) fn validate(config: &RolloutConfig) -> anyhow::Result<()> {
    if config.quotas.max_groups_per_rollout == 0 {
        anyhow::bail!("quotas.max_groups_per_rollout must be > 0");
    }
    if config.quotas.max_targets_per_group == 0 {
        anyhow::bail!("quotas.max_targets_per_group must be > 0");
    }

    let defaults = &config.group_defaults;
    if defaults.name_prefix.is_empty() {
        anyhow::bail!("group_defaults.name_prefix must not be blank");
    }
    if defaults.trigger_threshold > 100 {
        anyhow::bail!(
            "group_defaults.trigger_threshold must be within 0..=100, got {}",
            defaults.trigger_threshold,
        );
    }
    if let ErrorThreshold::Percent(p) = defaults.error_threshold {
        if p > 100 {
            anyhow::bail!("group_defaults.error_threshold must be within 0%..=100%, got {p}%");
        }
    }

    Ok(())
}

/// Structural checks on a plan file. Per-group values are deliberately not
/// range-checked here: out-of-range groups are reported by the validation
/// engine alongside the live target counts.
pub(crate) fn validate_plan(plan: &RolloutPlan) -> anyhow::Result<()> {
    match &plan.mode {
        PlanMode::Simple { groups } => {
            if *groups == 0 {
                anyhow::bail!("simple.groups must be > 0");
            }
        }
        PlanMode::Advanced(entries) => {
            if entries.is_empty() {
                anyhow::bail!("plan must define at least one [[group]]");
            }
            for (i, entry) in entries.iter().enumerate() {
                if !entry.target_percentage.is_finite() {
                    anyhow::bail!("group[{i}]: target_percentage must be a finite number");
                }
            }
        }
    }
    Ok(())
}
