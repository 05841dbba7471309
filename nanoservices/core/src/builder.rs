use std::sync::Arc;

use crate::config::loader::ConfigError;
use crate::config::model::{Dataflow, TransformationKind};
use crate::dag::node::{DatasetTable, TaskNode, TaskRole};
use crate::dag::resolver::{self, DagError, ResolvedDag};
use crate::destinations::file::JsonFileDestination;
use crate::destinations::traits::Destination;
use crate::sources::json_file::JsonFileSource;
use crate::sources::traits::Source;
use crate::transforms::add_fields::AddFields;
use crate::transforms::traits::Transform;
use crate::transforms::validate::ValidateFields;

/// Implementation behind one DAG node.
#[derive(Clone)]
pub enum Stage {
    Source(Arc<dyn Source>),
    Transform(Arc<dyn Transform>),
    Sink(Arc<dyn Destination>),
}

/// A dataflow ready to run: dataset names interned, stages resolved into
/// execution order once. Shared read-only between runs.
pub struct DataflowPlan {
    pub name: String,
    pub datasets: DatasetTable,
    pub nodes: Vec<TaskNode>,
    /// Parallel to `nodes`.
    pub stages: Vec<Stage>,
    pub dag: ResolvedDag,
}

impl DataflowPlan {
    /// Build the plan for a validated dataflow using the built-in JSON
    /// source, the two operators and the JSON file sink.
    pub fn from_dataflow(flow: &Dataflow) -> Result<Self, ConfigError> {
        let mut builder = DataflowBuilder::new(&flow.name);
        for source in &flow.sources {
            builder = builder.source(JsonFileSource::new(&source.name, &source.pattern));
        }
        for t in &flow.transformations {
            builder = match &t.kind {
                TransformationKind::ValidateFields(fields) => {
                    builder.transform(ValidateFields::new(&t.name, &t.input, fields.clone()))
                }
                TransformationKind::AddFields(additions) => {
                    builder.transform(AddFields::new(&t.name, &t.input, additions.clone()))
                }
            };
        }
        for sink in &flow.sinks {
            builder = builder.destination(JsonFileDestination::new(
                &sink.name,
                &sink.input,
                sink.paths.clone(),
                sink.mode,
            ));
        }
        Ok(builder.build()?)
    }

    /// Node indices with the given role, in execution order.
    pub fn ordered(&self, role: TaskRole) -> impl Iterator<Item = usize> + '_ {
        self.dag.order.iter().copied().filter(move |i| self.nodes[*i].role == role)
    }

    /// Stage names in execution order.
    pub fn execution_order(&self) -> Vec<&str> {
        self.dag.order.iter().map(|i| self.nodes[*i].name.as_str()).collect()
    }
}

/// Assembles a [`DataflowPlan`] from stage implementations. Custom sources,
/// transforms and destinations plug in here.
pub struct DataflowBuilder {
    name: String,
    sources: Vec<Arc<dyn Source>>,
    transforms: Vec<Arc<dyn Transform>>,
    destinations: Vec<Arc<dyn Destination>>,
}

impl DataflowBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sources: Vec::new(),
            transforms: Vec::new(),
            destinations: Vec::new(),
        }
    }

    pub fn source(mut self, source: impl Source + 'static) -> Self {
        self.sources.push(Arc::new(source));
        self
    }

    pub fn transform(mut self, transform: impl Transform + 'static) -> Self {
        self.transforms.push(Arc::new(transform));
        self
    }

    pub fn destination(mut self, destination: impl Destination + 'static) -> Self {
        self.destinations.push(Arc::new(destination));
        self
    }

    pub fn build(self) -> Result<DataflowPlan, DagError> {
        let mut datasets = DatasetTable::new();
        let mut nodes = Vec::new();
        let mut stages = Vec::new();

        for src in self.sources {
            let id = datasets.intern(src.produces());
            nodes.push(TaskNode::source(src.name(), id));
            stages.push(Stage::Source(src));
        }

        for t in self.transforms {
            let consumes = vec![datasets.intern(t.consumes())];
            let produces: Vec<_> = t.produces().iter().map(|name| datasets.intern(name)).collect();
            nodes.push(TaskNode::transform(t.name(), consumes, produces));
            stages.push(Stage::Transform(t));
        }

        for dest in self.destinations {
            let id = datasets.intern(dest.consumes());
            nodes.push(TaskNode::sink(dest.name(), id));
            stages.push(Stage::Sink(dest));
        }

        let dag = resolver::resolve(&nodes, &datasets)?;

        Ok(DataflowPlan { name: self.name, datasets, nodes, stages, dag })
    }
}
