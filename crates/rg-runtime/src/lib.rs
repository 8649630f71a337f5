#[macro_use]
mod log_macros;

pub mod client;
pub mod coalescer;
pub mod error;
pub mod session;
pub mod tracing_init;

pub use coalescer::{
    CoalescerState, CoalescerStats, CoalescerStatus, StatsSnapshot, ValidationCoalescer,
    ValidationUpdate,
};
pub use error::{RuntimeError, RuntimeReason, RuntimeResult};
pub use session::DefinitionSession;
