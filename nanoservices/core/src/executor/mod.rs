pub mod runner;
pub mod state;

pub use runner::run;
pub use state::{BranchCount, DatasetRegistry, Execution, ExecutionStatus, RunPhase, RunState, StageMetric};
