use std::path::Path;
use std::str::FromStr;

use serde::Deserialize;

use crate::defaults::GroupDefaults;
use crate::logging::LoggingConfig;
use crate::quotas::QuotaConfig;
use crate::validate;
use crate::validation::ValidationConfig;

// ---------------------------------------------------------------------------
// Raw TOML structure (intermediate representation)
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RolloutConfigRaw {
    quotas: QuotaConfig,
    group_defaults: GroupDefaults,
    validation: ValidationConfig,
    logging: LoggingConfig,
}

// ---------------------------------------------------------------------------
// RolloutConfig (resolved, validated)
// ---------------------------------------------------------------------------

/// Settings of a rollout-definition session, read from `rollout.toml`.
///
/// Every section is optional; an empty file yields [`RolloutConfig::default`].
#[derive(Debug, Clone, Default)]
pub struct RolloutConfig {
    pub quotas: QuotaConfig,
    pub group_defaults: GroupDefaults,
    pub validation: ValidationConfig,
    pub logging: LoggingConfig,
}

impl RolloutConfig {
    /// Read and parse a `rollout.toml` file.
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| anyhow::anyhow!("failed to read {}: {e}", path.as_ref().display()))?;
        content.parse()
    }
}

impl FromStr for RolloutConfig {
    type Err = anyhow::Error;

    /// Parse a TOML string into a validated [`RolloutConfig`].
    fn from_str(toml_str: &str) -> anyhow::Result<Self> {
        let raw: RolloutConfigRaw = toml::from_str(toml_str)?;

        let mut group_defaults = raw.group_defaults;
        group_defaults.name_prefix = group_defaults.name_prefix.trim().to_string();

        let config = RolloutConfig {
            quotas: raw.quotas,
            group_defaults,
            validation: raw.validation,
            logging: raw.logging,
        };

        validate::validate(&config)?;

        Ok(config)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
