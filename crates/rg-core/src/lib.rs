pub mod allocate;
pub mod assess;
pub mod count;
pub mod error;
pub mod filter;
pub mod fleet;
pub mod group;
pub mod quota;
pub mod simple;
pub mod threshold;
pub mod validation;

pub use allocate::allocate;
pub use assess::{Assessment, GroupFinding, ListError, RemainingTargetsError, assess};
pub use count::CountService;
pub use error::{CoreError, CoreReason, CoreResult};
pub use filter::{FilterExpr, TargetFilter};
pub use fleet::{Fleet, FleetCountService, Target};
pub use group::{FieldError, GroupDefinition};
pub use quota::{QuotaProvider, Quotas};
pub use simple::SimplePlan;
pub use threshold::{ThresholdError, ThresholdField, to_count, to_percent, validate_threshold};
pub use validation::{RolloutGroupsValidation, ValidationRequest, ValidityStatus};
