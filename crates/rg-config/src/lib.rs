pub mod defaults;
pub mod logging;
pub mod plan;
pub mod quotas;
pub mod rollout;
pub mod types;
mod validate;
pub mod validation;

pub use defaults::GroupDefaults;
pub use logging::{LogFormat, LoggingConfig};
pub use plan::{GroupEntry, PlanMode, RolloutPlan};
pub use quotas::QuotaConfig;
pub use rollout::RolloutConfig;
pub use types::{ErrorThreshold, HumanDuration, SizeCheckPolicy};
pub use validation::ValidationConfig;
