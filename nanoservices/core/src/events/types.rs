use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use etlflow_utils::Record;
use crate::executor::state::{Execution, StageMetric};
use crate::transforms::rules::Rule;

/// Structured facts emitted while a dataflow runs. Every event carries the
/// id of the execution that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum LineageEvent {
    ExecutionStarted(Execution),
    StageCompleted(StageMetric),
    ValidationFailed(ValidationErrorFact),
    RecordWritten(LineageEntry),
    ExecutionFinished(Execution),
}

impl LineageEvent {
    pub fn execution_id(&self) -> &str {
        match self {
            LineageEvent::ExecutionStarted(e) | LineageEvent::ExecutionFinished(e) => &e.id,
            LineageEvent::StageCompleted(m) => &m.execution_id,
            LineageEvent::ValidationFailed(f) => &f.execution_id,
            LineageEvent::RecordWritten(l) => &l.execution_id,
        }
    }

    /// Short name used in logs, e.g. `record_written`.
    pub fn kind(&self) -> &'static str {
        match self {
            LineageEvent::ExecutionStarted(_) => "execution_started",
            LineageEvent::StageCompleted(_) => "stage_completed",
            LineageEvent::ValidationFailed(_) => "validation_failed",
            LineageEvent::RecordWritten(_) => "record_written",
            LineageEvent::ExecutionFinished(_) => "execution_finished",
        }
    }
}

/// One failing (record, field, rule) triple from a validation stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationErrorFact {
    pub execution_id: String,
    pub stage: String,
    pub record_id: String,
    pub field: String,
    pub rule: String,
    pub error_code: String,
    pub message: String,
    /// `{"actual_value": <value or null>}`
    pub detail: Value,
}

impl ValidationErrorFact {
    pub fn new(
        execution_id: &str,
        stage: &str,
        record: &Record,
        field: &str,
        rule: Rule,
    ) -> Self {
        let actual = record.get(field).cloned().unwrap_or(Value::Null);
        Self {
            execution_id: execution_id.to_string(),
            stage: stage.to_string(),
            record_id: record.id().to_string(),
            field: field.to_string(),
            rule: rule.name().to_string(),
            error_code: rule.error_code().to_string(),
            message: rule.message().to_string(),
            detail: json!({ "actual_value": actual }),
        }
    }
}

/// Where a record ended up: one entry per record per written sink path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineageEntry {
    pub lineage_id: String,
    pub execution_id: String,
    pub record_id: String,
    pub source_file: String,
    /// Stages traversed, e.g. `people->validate_fields->validation_ok`.
    pub transformation_path: String,
    pub output_path: String,
    pub passed: bool,
}

impl LineageEntry {
    pub fn written(execution_id: &str, record: &Record, output_path: &str) -> Self {
        Self {
            lineage_id: uuid::Uuid::new_v4().to_string(),
            execution_id: execution_id.to_string(),
            record_id: record.id().to_string(),
            source_file: record.source_file().to_string(),
            transformation_path: record.trail_path(),
            output_path: output_path.to_string(),
            passed: record.is_valid(),
        }
    }
}
