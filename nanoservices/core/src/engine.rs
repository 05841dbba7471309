use std::path::Path;
use std::sync::Arc;
use tokio::sync::watch;

use etlflow_utils::error::Error;
use etlflow_utils::EtlResult;
use crate::builder::DataflowPlan;
use crate::config::loader::{load_metadata, ConfigError};
use crate::config::model::validate_metadata;
use crate::config::types::MetadataConfig;
use crate::events::sink::{FanOut, LineageSink};
use crate::executor::runner;
use crate::executor::state::Execution;

/// Top-level entry point. Holds the validated plans of a metadata document
/// and runs them on demand; cadence is up to the caller.
///
/// Runs share nothing but the lineage sinks, so one engine may serve
/// several concurrent runs.
#[derive(Clone)]
pub struct EtlEngine {
    plans: Arc<Vec<DataflowPlan>>,
    lineage: FanOut,
}

impl EtlEngine {
    /// Validate every dataflow of a document and resolve its plan.
    pub fn from_metadata(config: &MetadataConfig) -> Result<Self, ConfigError> {
        let plans = validate_metadata(config)?
            .iter()
            .map(DataflowPlan::from_dataflow)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::from_plans(plans))
    }

    /// Load a YAML or JSON metadata file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let config = load_metadata(path)?;
        Self::from_metadata(&config)
    }

    /// Engine over hand-built plans (custom sources, transforms, sinks).
    pub fn from_plans(plans: Vec<DataflowPlan>) -> Self {
        Self { plans: Arc::new(plans), lineage: FanOut::new() }
    }

    /// Attach a lineage sink. Every run emits to all attached sinks.
    pub fn lineage(mut self, sink: impl LineageSink + 'static) -> Self {
        self.lineage.push(Arc::new(sink));
        self
    }

    /// Dataflow names in declaration order.
    pub fn dataflows(&self) -> Vec<&str> {
        self.plans.iter().map(|p| p.name.as_str()).collect()
    }

    pub fn plan(&self, name: &str) -> Option<&DataflowPlan> {
        self.plans.iter().find(|p| p.name == name)
    }

    /// Run a dataflow now. Only an unknown name is an `Err`; failed runs come
    /// back as an [`Execution`] with status `failed`.
    pub async fn run_dataflow(&self, name: &str) -> EtlResult<Execution> {
        let (_keep, cancel) = watch::channel(false);
        self.run_dataflow_with_cancel(name, cancel).await
    }

    /// Run a dataflow, failing it with a cancellation error once `cancel`
    /// turns true.
    pub async fn run_dataflow_with_cancel(
        &self,
        name: &str,
        cancel: watch::Receiver<bool>,
    ) -> EtlResult<Execution> {
        let plan = self.plan(name).ok_or_else(|| Error::UnknownDataflow(name.to_string()))?;
        Ok(runner::run(plan, &self.lineage, cancel).await)
    }

    /// Run every dataflow once, one after another, in declaration order.
    pub async fn run_all(&self) -> Vec<Execution> {
        let (_keep, cancel) = watch::channel(false);
        self.run_all_with_cancel(cancel).await
    }

    /// Like [`run_all`](Self::run_all); once cancelled, the current run fails
    /// and the remaining ones fail without loading anything.
    pub async fn run_all_with_cancel(&self, cancel: watch::Receiver<bool>) -> Vec<Execution> {
        let mut executions = Vec::with_capacity(self.plans.len());
        for plan in self.plans.iter() {
            executions.push(runner::run(plan, &self.lineage, cancel.clone()).await);
        }
        executions
    }
}
