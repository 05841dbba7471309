use rusqlite::{Connection, params};
use std::path::Path;

use crate::events::types::{LineageEntry, LineageEvent, ValidationErrorFact};
use crate::executor::state::{Execution, StageMetric};

/// SQLite-backed store for execution history and per-record lineage.
pub struct Store {
    conn: Connection,
}

impl Store {
    /// Open or create a SQLite database at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, rusqlite::Error> {
        let conn = Connection::open(path)?;
        let store = Self { conn };
        store.migrate()?;
        Ok(store)
    }

    /// Create an in-memory database (for testing).
    pub fn in_memory() -> Result<Self, rusqlite::Error> {
        let conn = Connection::open_in_memory()?;
        let store = Self { conn };
        store.migrate()?;
        Ok(store)
    }

    fn migrate(&self) -> Result<(), rusqlite::Error> {
        self.conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS executions (
                id TEXT PRIMARY KEY,
                dataflow TEXT NOT NULL,
                status TEXT NOT NULL,
                started_at TEXT NOT NULL,
                finished_at TEXT,
                records_processed INTEGER NOT NULL DEFAULT 0,
                error TEXT,
                failed_stage TEXT
            );
            CREATE TABLE IF NOT EXISTS stage_metrics (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                execution_id TEXT NOT NULL REFERENCES executions(id),
                stage TEXT NOT NULL,
                kind TEXT NOT NULL,
                input_records INTEGER NOT NULL,
                outputs TEXT NOT NULL,
                duration_ms INTEGER NOT NULL
            );
            CREATE TABLE IF NOT EXISTS record_lineage (
                lineage_id TEXT PRIMARY KEY,
                execution_id TEXT NOT NULL REFERENCES executions(id),
                record_id TEXT NOT NULL,
                source_file TEXT NOT NULL,
                transformation_path TEXT NOT NULL,
                output_path TEXT NOT NULL,
                passed INTEGER NOT NULL
            );
            CREATE TABLE IF NOT EXISTS validation_errors (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                execution_id TEXT NOT NULL REFERENCES executions(id),
                stage TEXT NOT NULL,
                record_id TEXT NOT NULL,
                field TEXT NOT NULL,
                rule TEXT NOT NULL,
                error_code TEXT NOT NULL,
                message TEXT NOT NULL,
                detail TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_executions_dataflow ON executions(dataflow);
            CREATE INDEX IF NOT EXISTS idx_executions_status ON executions(status);
            CREATE INDEX IF NOT EXISTS idx_stage_metrics_execution ON stage_metrics(execution_id);
            CREATE INDEX IF NOT EXISTS idx_record_lineage_execution ON record_lineage(execution_id);
            CREATE INDEX IF NOT EXISTS idx_validation_errors_execution ON validation_errors(execution_id);"
        )?;
        Ok(())
    }

    /// Persist one lineage event.
    pub fn record(&self, event: &LineageEvent) -> Result<(), rusqlite::Error> {
        match event {
            LineageEvent::ExecutionStarted(e) => self.insert_execution(e),
            LineageEvent::ExecutionFinished(e) => self.complete_execution(e),
            LineageEvent::StageCompleted(m) => self.insert_stage_metric(m),
            LineageEvent::ValidationFailed(f) => self.insert_validation_error(f),
            LineageEvent::RecordWritten(l) => self.insert_lineage(l),
        }
    }

    /// Record a new execution as running.
    pub fn insert_execution(&self, execution: &Execution) -> Result<(), rusqlite::Error> {
        self.conn.execute(
            "INSERT INTO executions (id, dataflow, status, started_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                execution.id,
                execution.dataflow,
                execution.status.as_str(),
                execution.started_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Write the terminal state of an execution.
    pub fn complete_execution(&self, execution: &Execution) -> Result<(), rusqlite::Error> {
        self.conn.execute(
            "UPDATE executions
             SET status = ?2, finished_at = ?3, records_processed = ?4, error = ?5, failed_stage = ?6
             WHERE id = ?1",
            params![
                execution.id,
                execution.status.as_str(),
                execution.finished_at.map(|t| t.to_rfc3339()),
                execution.records_processed as i64,
                execution.error,
                execution.failed_stage,
            ],
        )?;
        Ok(())
    }

    pub fn insert_stage_metric(&self, metric: &StageMetric) -> Result<(), rusqlite::Error> {
        let outputs = serde_json::to_string(&metric.outputs)
            .map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))?;
        self.conn.execute(
            "INSERT INTO stage_metrics (execution_id, stage, kind, input_records, outputs, duration_ms)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                metric.execution_id,
                metric.stage,
                metric.kind,
                metric.input_records as i64,
                outputs,
                metric.duration_ms as i64,
            ],
        )?;
        Ok(())
    }

    pub fn insert_lineage(&self, entry: &LineageEntry) -> Result<(), rusqlite::Error> {
        self.conn.execute(
            "INSERT INTO record_lineage
                (lineage_id, execution_id, record_id, source_file, transformation_path, output_path, passed)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                entry.lineage_id,
                entry.execution_id,
                entry.record_id,
                entry.source_file,
                entry.transformation_path,
                entry.output_path,
                entry.passed,
            ],
        )?;
        Ok(())
    }

    pub fn insert_validation_error(&self, fact: &ValidationErrorFact) -> Result<(), rusqlite::Error> {
        self.conn.execute(
            "INSERT INTO validation_errors
                (execution_id, stage, record_id, field, rule, error_code, message, detail)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                fact.execution_id,
                fact.stage,
                fact.record_id,
                fact.field,
                fact.rule,
                fact.error_code,
                fact.message,
                fact.detail.to_string(),
            ],
        )?;
        Ok(())
    }

    /// Mark executions left running by a previous process as failed (crash
    /// recovery on startup).
    pub fn mark_inflight_as_failed(&self) -> Result<usize, rusqlite::Error> {
        let count = self.conn.execute(
            "UPDATE executions SET status = 'failed', error = 'interrupted before completion'
             WHERE status = 'running'",
            [],
        )?;
        Ok(count)
    }

    /// Most recent executions first.
    pub fn recent_executions(&self, limit: usize) -> Result<Vec<ExecutionRow>, rusqlite::Error> {
        let mut stmt = self.conn.prepare(
            "SELECT id, dataflow, status, started_at, finished_at, records_processed, error, failed_stage
             FROM executions ORDER BY started_at DESC, rowid DESC LIMIT ?1"
        )?;
        let rows = stmt.query_map(params![limit as i64], |row| {
            Ok(ExecutionRow {
                id: row.get(0)?,
                dataflow: row.get(1)?,
                status: row.get(2)?,
                started_at: row.get(3)?,
                finished_at: row.get(4)?,
                records_processed: row.get(5)?,
                error: row.get(6)?,
                failed_stage: row.get(7)?,
            })
        })?;
        rows.collect()
    }

    /// Stage metrics of one execution, in the order they ran.
    pub fn stage_metrics_for(&self, execution_id: &str) -> Result<Vec<StageMetricRow>, rusqlite::Error> {
        let mut stmt = self.conn.prepare(
            "SELECT stage, kind, input_records, outputs, duration_ms
             FROM stage_metrics WHERE execution_id = ?1 ORDER BY id"
        )?;
        let rows = stmt.query_map(params![execution_id], |row| {
            Ok(StageMetricRow {
                stage: row.get(0)?,
                kind: row.get(1)?,
                input_records: row.get(2)?,
                outputs: row.get(3)?,
                duration_ms: row.get(4)?,
            })
        })?;
        rows.collect()
    }

    pub fn lineage_for(&self, execution_id: &str) -> Result<Vec<LineageRow>, rusqlite::Error> {
        let mut stmt = self.conn.prepare(
            "SELECT record_id, source_file, transformation_path, output_path, passed
             FROM record_lineage WHERE execution_id = ?1 ORDER BY rowid"
        )?;
        let rows = stmt.query_map(params![execution_id], |row| {
            Ok(LineageRow {
                record_id: row.get(0)?,
                source_file: row.get(1)?,
                transformation_path: row.get(2)?,
                output_path: row.get(3)?,
                passed: row.get(4)?,
            })
        })?;
        rows.collect()
    }

    pub fn validation_errors_for(&self, execution_id: &str) -> Result<Vec<ValidationErrorRow>, rusqlite::Error> {
        let mut stmt = self.conn.prepare(
            "SELECT stage, record_id, field, rule, error_code, detail
             FROM validation_errors WHERE execution_id = ?1 ORDER BY id"
        )?;
        let rows = stmt.query_map(params![execution_id], |row| {
            Ok(ValidationErrorRow {
                stage: row.get(0)?,
                record_id: row.get(1)?,
                field: row.get(2)?,
                rule: row.get(3)?,
                error_code: row.get(4)?,
                detail: row.get(5)?,
            })
        })?;
        rows.collect()
    }
}

#[derive(Debug)]
pub struct ExecutionRow {
    pub id: String,
    pub dataflow: String,
    pub status: String,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub records_processed: i64,
    pub error: Option<String>,
    pub failed_stage: Option<String>,
}

#[derive(Debug)]
pub struct StageMetricRow {
    pub stage: String,
    pub kind: String,
    pub input_records: i64,
    /// JSON list of `{dataset, records}`.
    pub outputs: String,
    pub duration_ms: i64,
}

#[derive(Debug)]
pub struct LineageRow {
    pub record_id: String,
    pub source_file: String,
    pub transformation_path: String,
    pub output_path: String,
    pub passed: bool,
}

#[derive(Debug)]
pub struct ValidationErrorRow {
    pub stage: String,
    pub record_id: String,
    pub field: String,
    pub rule: String,
    pub error_code: String,
    pub detail: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::state::{BranchCount, ExecutionStatus};
    use chrono::{Duration, Utc};
    use serde_json::json;

    fn finished(mut e: Execution, status: ExecutionStatus, processed: u64) -> Execution {
        e.status = status;
        e.records_processed = processed;
        e.finished_at = Some(Utc::now());
        e
    }

    #[test]
    fn create_and_complete_execution() {
        let store = Store::in_memory().unwrap();
        let exec = Execution::start("people");

        store.insert_execution(&exec).unwrap();
        let rows = store.recent_executions(10).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].status, "running");

        store.complete_execution(&finished(exec, ExecutionStatus::Succeeded, 5)).unwrap();
        let rows = store.recent_executions(10).unwrap();
        assert_eq!(rows[0].status, "succeeded");
        assert_eq!(rows[0].records_processed, 5);
        assert!(rows[0].finished_at.is_some());
    }

    #[test]
    fn events_land_in_their_tables() {
        let store = Store::in_memory().unwrap();
        let exec = Execution::start("people");
        store.record(&LineageEvent::ExecutionStarted(exec.clone())).unwrap();

        store.record(&LineageEvent::StageCompleted(StageMetric {
            execution_id: exec.id.clone(),
            stage: "validation".into(),
            kind: "validate_fields".into(),
            input_records: 2,
            outputs: vec![
                BranchCount { dataset: "validation_ok".into(), records: 1 },
                BranchCount { dataset: "validation_ko".into(), records: 1 },
            ],
            duration_ms: 3,
        })).unwrap();

        store.record(&LineageEvent::ValidationFailed(ValidationErrorFact {
            execution_id: exec.id.clone(),
            stage: "validation".into(),
            record_id: "r-2".into(),
            field: "age".into(),
            rule: "notNull".into(),
            error_code: "NOT_NULL".into(),
            message: "Field cannot be null".into(),
            detail: json!({"actual_value": null}),
        })).unwrap();

        store.record(&LineageEvent::RecordWritten(LineageEntry {
            lineage_id: "l-1".into(),
            execution_id: exec.id.clone(),
            record_id: "r-2".into(),
            source_file: "/in/a.json".into(),
            transformation_path: "people->validate_fields->validation_ko".into(),
            output_path: "/out/ko/output.json".into(),
            passed: false,
        })).unwrap();

        let metrics = store.stage_metrics_for(&exec.id).unwrap();
        assert_eq!(metrics.len(), 1);
        assert_eq!(metrics[0].input_records, 2);
        assert!(metrics[0].outputs.contains("validation_ko"));

        let errors = store.validation_errors_for(&exec.id).unwrap();
        assert_eq!(errors[0].error_code, "NOT_NULL");
        assert_eq!(errors[0].detail, r#"{"actual_value":null}"#);

        let lineage = store.lineage_for(&exec.id).unwrap();
        assert_eq!(lineage.len(), 1);
        assert!(!lineage[0].passed);

        assert!(store.lineage_for("other").unwrap().is_empty());
    }

    #[test]
    fn mark_inflight_as_failed() {
        let store = Store::in_memory().unwrap();
        let a = Execution::start("a");
        let b = Execution::start("b");
        store.insert_execution(&a).unwrap();
        store.insert_execution(&b).unwrap();
        store.complete_execution(&finished(b.clone(), ExecutionStatus::Succeeded, 0)).unwrap();

        let failed = store.mark_inflight_as_failed().unwrap();
        assert_eq!(failed, 1); // only a was still running

        let rows = store.recent_executions(10).unwrap();
        let row_a = rows.iter().find(|r| r.id == a.id).unwrap();
        assert_eq!(row_a.status, "failed");
        assert!(row_a.error.is_some());
        let row_b = rows.iter().find(|r| r.id == b.id).unwrap();
        assert_eq!(row_b.status, "succeeded");
    }

    #[test]
    fn recent_executions_respects_limit() {
        let store = Store::in_memory().unwrap();
        let base = Utc::now();
        let mut ids = Vec::new();
        for i in 0..5 {
            let mut e = Execution::start("test");
            e.started_at = base + Duration::seconds(i);
            store.insert_execution(&e).unwrap();
            ids.push(e.id);
        }

        let rows = store.recent_executions(3).unwrap();
        assert_eq!(rows.len(), 3);
        // Most recent first
        assert_eq!(rows[0].id, ids[4]);
    }
}
