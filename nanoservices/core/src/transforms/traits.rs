use async_trait::async_trait;
use etlflow_utils::{Dataset, EtlResult};

use crate::events::types::ValidationErrorFact;

/// Run-level facts a stage may need to tag what it emits.
#[derive(Debug, Clone)]
pub struct StageContext {
    pub execution_id: String,
    pub dataflow: String,
}

/// What a transform hands back: the datasets it binds and any validation
/// facts it produced along the way.
#[derive(Debug, Default)]
pub struct StageOutput {
    pub datasets: Vec<(String, Dataset)>,
    pub errors: Vec<ValidationErrorFact>,
}

impl StageOutput {
    pub fn single(name: impl Into<String>, data: Dataset) -> Self {
        Self { datasets: vec![(name.into(), data)], errors: Vec::new() }
    }
}

/// A data transform that consumes one named dataset and binds one or more
/// named outputs.
#[async_trait]
pub trait Transform: Send + Sync {
    fn name(&self) -> &str;

    /// Transformation type, e.g. `validate_fields`
    fn kind(&self) -> &str;

    /// Named input this transform requires
    fn consumes(&self) -> &str;

    /// Named outputs this transform binds
    fn produces(&self) -> Vec<String>;

    /// Transform the input dataset. The input is never modified.
    async fn transform(&self, ctx: &StageContext, input: Dataset) -> EtlResult<StageOutput>;
}
