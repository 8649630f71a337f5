use serde::{Deserialize, Serialize};

use rg_config::{ErrorThreshold, GroupDefaults, GroupEntry};

/// Maximum length of a group name, in characters.
pub const NAME_MAX_LEN: usize = 128;
/// Maximum length of a group description, in characters.
pub const DESCRIPTION_MAX_LEN: usize = 512;

// ---------------------------------------------------------------------------
// GroupDefinition
// ---------------------------------------------------------------------------

/// Parameters of one rollout group as edited by the operator.
///
/// Values are kept as entered; [`GroupDefinition::field_errors`] and the
/// threshold validator report anything out of range instead of the type
/// rejecting it up front.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupDefinition {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Narrows the rollout's top-level filter. `None` or blank inherits it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_filter_query: Option<String>,
    /// Share of the *remaining* population taken by this group, in (0, 100].
    pub target_percentage: f64,
    /// Percent of the group that must succeed before the next group starts.
    pub trigger_threshold: u32,
    pub error_threshold: ErrorThreshold,
}

impl GroupDefinition {
    /// A group taking everything that is left, with the stock conditions
    /// (trigger at 100%, abort at 50% errors).
    pub fn new(name: impl Into<String>) -> Self {
        let defaults = GroupDefaults::default();
        Self {
            name: name.into(),
            description: None,
            target_filter_query: None,
            target_percentage: 100.0,
            trigger_threshold: defaults.trigger_threshold,
            error_threshold: defaults.error_threshold,
        }
    }

    /// Build a definition from a plan entry, filling unset thresholds from
    /// `defaults`.
    pub fn from_entry(entry: &GroupEntry, defaults: &GroupDefaults) -> Self {
        Self {
            name: entry.name.clone(),
            description: entry.description.clone(),
            target_filter_query: entry.target_filter.clone(),
            target_percentage: entry.target_percentage,
            trigger_threshold: entry.trigger_threshold.unwrap_or(defaults.trigger_threshold),
            error_threshold: entry.error_threshold.unwrap_or(defaults.error_threshold),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_filter(mut self, query: impl Into<String>) -> Self {
        self.target_filter_query = Some(query.into());
        self
    }

    pub fn with_percentage(mut self, percentage: f64) -> Self {
        self.target_percentage = percentage;
        self
    }

    pub fn with_trigger_threshold(mut self, percent: u32) -> Self {
        self.trigger_threshold = percent;
        self
    }

    pub fn with_error_threshold(mut self, threshold: ErrorThreshold) -> Self {
        self.error_threshold = threshold;
        self
    }

    /// The group's own filter, if it has a non-blank one.
    pub fn filter_query(&self) -> Option<&str> {
        self.target_filter_query
            .as_deref()
            .map(str::trim)
            .filter(|q| !q.is_empty())
    }

    /// The filter that selects this group's candidates: the top-level filter
    /// narrowed by the group's own query.
    pub fn effective_filter(&self, top_level_filter: &str) -> String {
        let base = top_level_filter.trim();
        match self.filter_query() {
            None => base.to_string(),
            Some(own) if base.is_empty() => own.to_string(),
            Some(own) => format!("({base});({own})"),
        }
    }

    /// Field-level problems that make the definition unusable regardless of
    /// live target counts.
    pub fn field_errors(&self) -> Vec<FieldError> {
        let mut errors = Vec::new();

        let name = self.name.trim();
        if name.is_empty() {
            errors.push(FieldError::NameMissing);
        } else if name.chars().count() > NAME_MAX_LEN {
            errors.push(FieldError::NameTooLong { max: NAME_MAX_LEN });
        }

        if let Some(desc) = &self.description {
            if desc.chars().count() > DESCRIPTION_MAX_LEN {
                errors.push(FieldError::DescriptionTooLong {
                    max: DESCRIPTION_MAX_LEN,
                });
            }
        }

        if !is_valid_percentage(self.target_percentage) {
            errors.push(FieldError::PercentageOutOfRange {
                value: self.target_percentage,
            });
        }

        errors
    }
}

/// `true` when `value` lies in (0, 100].
pub fn is_valid_percentage(value: f64) -> bool {
    value.is_finite() && value > 0.0 && value <= 100.0
}

// ---------------------------------------------------------------------------
// FieldError
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, thiserror::Error, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FieldError {
    #[error("group name is required")]
    NameMissing,
    #[error("group name exceeds {max} characters")]
    NameTooLong { max: usize },
    #[error("group description exceeds {max} characters")]
    DescriptionTooLong { max: usize },
    #[error("target percentage must be within (0, 100], got {value}")]
    PercentageOutOfRange { value: f64 },
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
