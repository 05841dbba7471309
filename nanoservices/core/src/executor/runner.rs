use std::future::Future;
use std::time::Instant;
use tokio::sync::watch;
use tracing::Instrument;

use etlflow_utils::error::Error;
use etlflow_utils::{Dataset, EtlResult};
use crate::builder::{DataflowPlan, Stage};
use crate::config::model::VALIDATE_FIELDS;
use crate::dag::node::TaskRole;
use crate::events::sink::LineageSink;
use crate::events::types::{LineageEntry, LineageEvent};
use crate::executor::state::{BranchCount, Execution, RunPhase, RunState, StageMetric};
use crate::transforms::traits::StageContext;

/// A fatal run error and the stage it came from.
struct StageFailure {
    stage: Option<String>,
    error: Error,
}

impl StageFailure {
    fn at(stage: &str, error: Error) -> Self {
        Self { stage: Some(stage.to_string()), error }
    }
}

/// Execute one run of `plan` and return its terminal execution.
///
/// Stages run one at a time in resolved order: all sources, then every
/// transformation, then every sink. The first fatal error fails the run;
/// sink writes already committed stay in place. Flipping `cancel` to true
/// fails the run with [`Error::Cancelled`] at the next stage boundary, or
/// while a source or transformation is in progress. A sink that has started
/// writing is allowed to finish.
pub async fn run(
    plan: &DataflowPlan,
    lineage: &dyn LineageSink,
    mut cancel: watch::Receiver<bool>,
) -> Execution {
    let mut state = RunState::new(&plan.name, &plan.datasets);
    let span = tracing::info_span!("execution", execution = %state.execution.id, dataflow = %plan.name);

    async {
        tracing::info!("execution started");
        crate::metrics::execution_started(&plan.name);
        emit(lineage, LineageEvent::ExecutionStarted(state.execution.clone())).await;

        match drive(plan, &mut state, lineage, &mut cancel).await {
            Ok(()) => state.succeed(),
            Err(failure) => {
                tracing::error!(
                    stage = failure.stage.as_deref().unwrap_or("-"),
                    error = %failure.error,
                    "execution failed"
                );
                state.fail(failure.stage, &failure.error);
            }
        }

        let execution = state.execution.clone();
        crate::metrics::execution_finished(
            &plan.name,
            execution.status.as_str(),
            execution.duration_secs(),
            execution.records_processed,
        );
        emit(lineage, LineageEvent::ExecutionFinished(execution.clone())).await;
        tracing::info!(
            status = execution.status.as_str(),
            records = execution.records_processed,
            "execution finished"
        );
        execution
    }
    .instrument(span)
    .await
}

async fn drive(
    plan: &DataflowPlan,
    state: &mut RunState,
    lineage: &dyn LineageSink,
    cancel: &mut watch::Receiver<bool>,
) -> Result<(), StageFailure> {
    let ctx = StageContext {
        execution_id: state.execution.id.clone(),
        dataflow: plan.name.clone(),
    };

    state.enter(RunPhase::Loading);
    for idx in plan.ordered(TaskRole::Source) {
        let node = &plan.nodes[idx];
        let Stage::Source(source) = &plan.stages[idx] else { continue };
        check_cancelled(cancel, &node.name)?;

        let data = until_cancelled(cancel, source.extract())
            .await
            .map_err(|e| StageFailure::at(&node.name, e))?;
        tracing::debug!(stage = %node.name, records = data.len(), "source loaded");
        state
            .registry
            .bind(node.produces[0], data, &plan.datasets)
            .map_err(|e| StageFailure::at(&node.name, e))?;
    }

    state.enter(RunPhase::Transforming);
    for idx in plan.ordered(TaskRole::Transform) {
        let node = &plan.nodes[idx];
        let Stage::Transform(transform) = &plan.stages[idx] else { continue };
        check_cancelled(cancel, &node.name)?;

        let input_id = node.consumes[0];
        let input = state.registry.get(input_id).cloned().ok_or_else(|| {
            StageFailure::at(
                &node.name,
                Error::Graph(format!("input '{}' is not bound", plan.datasets.name(input_id))),
            )
        })?;
        let input_records = input.len();

        let started = Instant::now();
        let output = until_cancelled(cancel, transform.transform(&ctx, input))
            .await
            .map_err(|e| StageFailure::at(&node.name, e))?;
        let elapsed = started.elapsed();

        let mut outputs = Vec::with_capacity(output.datasets.len());
        for (name, data) in output.datasets {
            let id = plan
                .datasets
                .get(&name)
                .filter(|id| node.produces.contains(id))
                .ok_or_else(|| {
                    StageFailure::at(&node.name, Error::Graph(format!("stage bound undeclared dataset '{name}'")))
                })?;
            outputs.push(BranchCount { dataset: name, records: data.len() });
            state
                .registry
                .bind(id, data, &plan.datasets)
                .map_err(|e| StageFailure::at(&node.name, e))?;
        }

        if transform.kind() == VALIDATE_FIELDS {
            if let [ok, ko] = outputs.as_slice() {
                crate::metrics::record_validation(&plan.name, ok.records, ko.records);
            }
        }
        crate::metrics::observe_transformation(&plan.name, transform.kind(), elapsed.as_secs_f64());
        tracing::info!(
            stage = %node.name,
            kind = transform.kind(),
            input = input_records,
            outputs = ?outputs,
            duration_ms = elapsed.as_millis() as u64,
            "stage completed"
        );

        let metric = StageMetric {
            execution_id: ctx.execution_id.clone(),
            stage: node.name.clone(),
            kind: transform.kind().to_string(),
            input_records,
            outputs,
            duration_ms: elapsed.as_millis() as u64,
        };
        emit(lineage, LineageEvent::StageCompleted(metric)).await;
        for fact in output.errors {
            emit(lineage, LineageEvent::ValidationFailed(fact)).await;
        }
    }

    state.enter(RunPhase::Writing);
    for idx in plan.ordered(TaskRole::Sink) {
        let node = &plan.nodes[idx];
        let Stage::Sink(destination) = &plan.stages[idx] else { continue };
        check_cancelled(cancel, &node.name)?;

        let input_id = node.consumes[0];
        let Some(data) = state.registry.get(input_id).cloned() else {
            return Err(StageFailure::at(
                &node.name,
                Error::UnboundSinkInput {
                    sink: node.name.clone(),
                    input: plan.datasets.name(input_id).to_string(),
                },
            ));
        };

        let written = destination
            .load(&data)
            .await
            .map_err(|e| StageFailure::at(&node.name, e))?;
        state.execution.records_processed += data.len() as u64;
        emit_written(lineage, &ctx.execution_id, &data, &written).await;
    }

    Ok(())
}

fn check_cancelled(cancel: &watch::Receiver<bool>, stage: &str) -> Result<(), StageFailure> {
    let flagged = *cancel.borrow();
    if flagged {
        return Err(StageFailure::at(stage, Error::Cancelled));
    }
    Ok(())
}

/// Resolves once the flag turns true. Never resolves if the sender is gone.
async fn cancelled(cancel: &mut watch::Receiver<bool>) {
    loop {
        let flagged = *cancel.borrow_and_update();
        if flagged {
            return;
        }
        if cancel.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

async fn until_cancelled<T>(
    cancel: &mut watch::Receiver<bool>,
    work: impl Future<Output = EtlResult<T>>,
) -> EtlResult<T> {
    tokio::select! {
        result = work => result,
        _ = cancelled(cancel) => Err(Error::Cancelled),
    }
}

async fn emit_written(lineage: &dyn LineageSink, execution_id: &str, data: &Dataset, written: &[std::path::PathBuf]) {
    for path in written {
        let output_path = path.display().to_string();
        for record in data.iter() {
            emit(lineage, LineageEvent::RecordWritten(LineageEntry::written(execution_id, record, &output_path))).await;
        }
    }
}

async fn emit(lineage: &dyn LineageSink, event: LineageEvent) {
    if let Err(e) = lineage.emit(&event).await {
        tracing::warn!(event = event.kind(), error = %e, "lineage emit failed");
    }
}
