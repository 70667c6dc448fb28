//! Execution engine: the per-run context, the node state machine, output
//! validation, the pipeline controller and its async driver.

mod context;
mod controller;
#[cfg(test)]
mod controller_test;
mod driver;
mod node_machine;
#[cfg(test)]
mod node_machine_test;
mod validation;

pub use context::{ExecutionContext, ScheduledStart, TimerRegistry};
pub use controller::Pipeline;
pub use driver::{PipelineDriver, run_simulated};
pub use node_machine::{FailureReason, NodeMachine, StartOutcome, TickOutcome};
pub use validation::{is_truthy, validate_output};
