use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use etlflow_utils::error::Error;
use etlflow_utils::Dataset;
use crate::dag::node::{DatasetId, DatasetTable};

/// Phase of a single run. Phases only move forward; any non-terminal phase
/// may jump to `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum RunPhase {
    Pending,
    Loading,
    Transforming,
    Writing,
    Succeeded,
    Failed,
}

impl RunPhase {
    pub fn is_terminal(self) -> bool {
        matches!(self, RunPhase::Succeeded | RunPhase::Failed)
    }

    pub fn can_enter(self, next: RunPhase) -> bool {
        use RunPhase::*;
        matches!(
            (self, next),
            (Pending, Loading) | (Loading, Transforming) | (Transforming, Writing) | (Writing, Succeeded)
        ) || (!self.is_terminal() && next == Failed)
    }
}

/// Status reported for an execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionStatus {
    Running,
    Succeeded,
    Failed,
}

impl ExecutionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ExecutionStatus::Running => "running",
            ExecutionStatus::Succeeded => "succeeded",
            ExecutionStatus::Failed => "failed",
        }
    }
}

/// One run of a dataflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Execution {
    pub id: String,
    pub dataflow: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub status: ExecutionStatus,
    /// Records written by sinks, counted once per sink.
    pub records_processed: u64,
    pub error: Option<String>,
    /// Stage or sink where the run stopped.
    pub failed_stage: Option<String>,
}

impl Execution {
    pub fn start(dataflow: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            dataflow: dataflow.into(),
            started_at: Utc::now(),
            finished_at: None,
            status: ExecutionStatus::Running,
            records_processed: 0,
            error: None,
            failed_stage: None,
        }
    }

    pub fn duration_secs(&self) -> f64 {
        let end = self.finished_at.unwrap_or_else(Utc::now);
        (end - self.started_at).num_milliseconds().max(0) as f64 / 1000.0
    }
}

/// Record count of one dataset bound by a stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchCount {
    pub dataset: String,
    pub records: usize,
}

/// Measurements for one executed transformation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageMetric {
    pub execution_id: String,
    pub stage: String,
    pub kind: String,
    pub input_records: usize,
    pub outputs: Vec<BranchCount>,
    pub duration_ms: u64,
}

impl StageMetric {
    pub fn output_records(&self, dataset: &str) -> Option<usize> {
        self.outputs.iter().find(|b| b.dataset == dataset).map(|b| b.records)
    }
}

/// Datasets bound during one run, indexed by interned id. A slot is filled
/// at most once.
#[derive(Debug)]
pub struct DatasetRegistry {
    slots: Vec<Option<Dataset>>,
}

impl DatasetRegistry {
    pub fn new(datasets: &DatasetTable) -> Self {
        Self { slots: vec![None; datasets.len()] }
    }

    pub fn bind(&mut self, id: DatasetId, data: Dataset, datasets: &DatasetTable) -> Result<(), Error> {
        let slot = self
            .slots
            .get_mut(id.0)
            .ok_or_else(|| Error::Graph(format!("dataset id {} is not declared", id.0)))?;
        if slot.is_some() {
            return Err(Error::Graph(format!(
                "dataset '{}' is already bound in this run",
                datasets.name(id)
            )));
        }
        *slot = Some(data);
        Ok(())
    }

    pub fn get(&self, id: DatasetId) -> Option<&Dataset> {
        self.slots.get(id.0).and_then(Option::as_ref)
    }
}

/// In-memory state of a single run. Owned by the runner; never shared
/// between runs.
#[derive(Debug)]
pub struct RunState {
    pub execution: Execution,
    pub phase: RunPhase,
    pub registry: DatasetRegistry,
}

impl RunState {
    pub fn new(dataflow: &str, datasets: &DatasetTable) -> Self {
        Self {
            execution: Execution::start(dataflow),
            phase: RunPhase::Pending,
            registry: DatasetRegistry::new(datasets),
        }
    }

    /// Move to `next`. Returns false and stays put if the move is not
    /// allowed from the current phase.
    pub fn enter(&mut self, next: RunPhase) -> bool {
        if !self.phase.can_enter(next) {
            return false;
        }
        self.phase = next;
        true
    }

    pub fn succeed(&mut self) {
        if self.enter(RunPhase::Succeeded) {
            self.execution.status = ExecutionStatus::Succeeded;
            self.execution.finished_at = Some(Utc::now());
        }
    }

    pub fn fail(&mut self, stage: Option<String>, error: &Error) {
        if self.enter(RunPhase::Failed) {
            self.execution.status = ExecutionStatus::Failed;
            self.execution.error = Some(error.to_string());
            self.execution.failed_stage = stage;
            self.execution.finished_at = Some(Utc::now());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> (DatasetTable, DatasetId, DatasetId) {
        let mut t = DatasetTable::new();
        let raw = t.intern("raw");
        let ok = t.intern("validation_ok");
        (t, raw, ok)
    }

    #[test]
    fn phases_move_forward_only() {
        let (t, _, _) = table();
        let mut state = RunState::new("people", &t);
        assert_eq!(state.phase, RunPhase::Pending);
        assert!(!state.enter(RunPhase::Writing));
        assert!(state.enter(RunPhase::Loading));
        assert!(state.enter(RunPhase::Transforming));
        assert!(!state.enter(RunPhase::Loading));
        assert!(state.enter(RunPhase::Writing));
        state.succeed();
        assert_eq!(state.phase, RunPhase::Succeeded);
        assert_eq!(state.execution.status, ExecutionStatus::Succeeded);
        assert!(state.execution.finished_at.is_some());
    }

    #[test]
    fn failure_records_message_and_stage() {
        let (t, _, _) = table();
        let mut state = RunState::new("people", &t);
        state.enter(RunPhase::Loading);
        state.fail(Some("person_inputs".into()), &Error::source_failed("person_inputs", "no files"));

        assert_eq!(state.phase, RunPhase::Failed);
        assert_eq!(state.execution.status, ExecutionStatus::Failed);
        assert_eq!(state.execution.failed_stage.as_deref(), Some("person_inputs"));
        assert!(state.execution.error.as_deref().unwrap().contains("no files"));

        // terminal phases stay terminal
        state.succeed();
        assert_eq!(state.execution.status, ExecutionStatus::Failed);
    }

    #[test]
    fn registry_is_write_once() {
        let (t, raw, ok) = table();
        let mut reg = DatasetRegistry::new(&t);
        assert!(reg.get(raw).is_none());

        reg.bind(raw, Dataset::default(), &t).unwrap();
        assert!(reg.get(raw).is_some());
        assert!(reg.get(ok).is_none());

        let err = reg.bind(raw, Dataset::default(), &t).unwrap_err();
        assert!(err.to_string().contains("'raw' is already bound"));
    }

    #[test]
    fn execution_serializes_status_lowercase() {
        let exec = Execution::start("people");
        let v = serde_json::to_value(&exec).unwrap();
        assert_eq!(v["status"], "running");
        assert_eq!(v["dataflow"], "people");
    }
}
