//! The capability planner and linear executor: turns "run step X" into a
//! deterministic, observable sequence of tool calls.

pub mod capability;
pub mod executor;
pub mod plan;

pub use executor::PlanExecutor;
pub use plan::{plan, ToolInvocationPlan, ToolPlan};
